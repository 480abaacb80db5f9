use std::sync::Arc;

use crate::{ChildEventListener, ValueEventListener};

/// A remote ordered collection that can be observed.
///
/// Implementations own the protocol. For one registered listener they must
/// deliver events in order and never concurrently. A source may replay its
/// current children synchronously from inside `add_child_event_listener`.
///
/// Listeners are identified by `Arc` pointer identity, see
/// [`crate::same_listener`].
pub trait OrderedSource<S>: Send + Sync {
    fn add_child_event_listener(&self, listener: Arc<dyn ChildEventListener<S>>);

    fn remove_child_event_listener(&self, listener: &Arc<dyn ChildEventListener<S>>);

    fn add_value_event_listener(&self, listener: Arc<dyn ValueEventListener>);

    fn remove_value_event_listener(&self, listener: &Arc<dyn ValueEventListener>);
}
