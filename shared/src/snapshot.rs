use crate::SyncError;

/// A value mirrored from the remote collection.
///
/// Ordering and lookup only ever look at [`Snapshot::key`]; the payload is
/// opaque to the engine.
pub trait Snapshot: Clone + Send + Sync + 'static {
    fn key(&self) -> &str;
}

/// Plain key/value snapshot, good enough for most sources.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DataSnapshot<V> {
    key: String,
    value: V,
}

impl<V> DataSnapshot<V> {
    pub fn new(key: impl Into<String>, value: V) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn into_value(self) -> V {
        self.value
    }
}

impl<V: Clone + Send + Sync + 'static> Snapshot for DataSnapshot<V> {
    fn key(&self) -> &str {
        &self.key
    }
}

/// First-match linear scan for `key`.
pub fn index_for_key<S: Snapshot>(snapshots: &[S], key: &str) -> Result<usize, SyncError> {
    snapshots
        .iter()
        .position(|snapshot| snapshot.key() == key)
        .ok_or_else(|| SyncError::KeyNotFound {
            key: key.to_string(),
        })
}

/// Index an Added or Moved snapshot lands on: the head when there is no
/// predecessor, otherwise right after it.
pub fn insertion_index<S: Snapshot>(
    snapshots: &[S],
    previous_key: Option<&str>,
) -> Result<usize, SyncError> {
    match previous_key {
        None => Ok(0),
        Some(key) => index_for_key(snapshots, key).map(|index| index + 1),
    }
}
