/// Contains settings for a [`crate::SyncArray`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncArrayConfig {
    /// Whether change listeners are notified as events are applied. Turning
    /// this off lets an owner rebuild the list in bulk and announce the
    /// result once; the list itself is still mutated.
    pub notify_listeners: bool,
    /// Capacity reserved for the mirrored list up front
    pub capacity_hint: usize,
}

impl SyncArrayConfig {
    pub fn with_notify_listeners(mut self, notify_listeners: bool) -> Self {
        self.notify_listeners = notify_listeners;
        self
    }

    pub fn with_capacity_hint(mut self, capacity_hint: usize) -> Self {
        self.capacity_hint = capacity_hint;
        self
    }
}

impl Default for SyncArrayConfig {
    fn default() -> Self {
        Self {
            notify_listeners: true,
            capacity_hint: 0,
        }
    }
}
