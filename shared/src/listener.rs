use std::sync::Arc;

use crate::{Cancellation, ChangeEvent, ChildEvent, SyncError, ValueEvent};

/// Receives normalized changes from a sync engine or a derived view.
pub trait ChangeEventListener: Send + Sync {
    fn on_child_changed(&self, event: ChangeEvent);

    /// A consistency checkpoint: the list now matches the remote side.
    fn on_data_changed(&self);

    /// Terminal. Nothing else is delivered for this subscription.
    fn on_cancelled(&self, cancellation: &Cancellation);
}

/// Told every time a change listener is registered or unregistered.
pub trait SubscriptionEventListener: Send + Sync {
    fn on_subscription_added(&self);
    fn on_subscription_removed(&self);
}

/// Sink for the structural stream of an [`crate::OrderedSource`].
///
/// Returning an error means the event broke the source's ordering contract
/// and was not applied.
pub trait ChildEventListener<S>: Send + Sync {
    fn on_child_event(&self, event: ChildEvent<S>) -> Result<(), SyncError>;
}

/// Sink for the whole-collection stream of an [`crate::OrderedSource`].
pub trait ValueEventListener: Send + Sync {
    fn on_value_event(&self, event: ValueEvent);
}

/// Registrations are keyed by allocation, never by value. Only the data
/// pointer is compared; vtable pointers of the same type may differ between
/// codegen units.
pub fn same_listener<L: ?Sized>(a: &Arc<L>, b: &Arc<L>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}
