use std::{fmt::Display, marker::PhantomData};

use ordo_shared::{DataSnapshot, ParseError, Snapshot};

/// Converts a mirrored snapshot into a domain object.
pub trait SnapshotParser<S, T>: Send + Sync {
    fn parse_snapshot(&self, snapshot: &S) -> Result<T, ParseError>;
}

impl<S, T, F> SnapshotParser<S, T> for F
where
    F: Fn(&S) -> Result<T, ParseError> + Send + Sync,
{
    fn parse_snapshot(&self, snapshot: &S) -> Result<T, ParseError> {
        self(snapshot)
    }
}

/// Parses a [`DataSnapshot`] by converting its value with `TryFrom`.
pub struct ValueParser<T> {
    phantom_t: PhantomData<fn() -> T>,
}

impl<T> ValueParser<T> {
    pub fn new() -> Self {
        Self {
            phantom_t: PhantomData,
        }
    }
}

impl<T> Default for ValueParser<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, T> SnapshotParser<DataSnapshot<V>, T> for ValueParser<T>
where
    V: Clone + Send + Sync + 'static,
    T: TryFrom<V>,
    T::Error: Display,
{
    fn parse_snapshot(&self, snapshot: &DataSnapshot<V>) -> Result<T, ParseError> {
        T::try_from(snapshot.value().clone())
            .map_err(|error| ParseError::new(snapshot.key(), error.to_string()))
    }
}
