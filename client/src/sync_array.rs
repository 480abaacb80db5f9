//! # `SyncArray`: ordered mirror of a remote collection
//!
//! The engine keeps a local `Vec` of snapshots consistent with an
//! [`OrderedSource`] by applying its structural events one at a time, and
//! republishes each applied event as an index-level [`ChangeEvent`].
//!
//! | Field | Purpose |
//! |-------|---------|
//! | `snapshots`   | The mirrored list. Write-locked only while an event is applied. |
//! | `listeners`   | Change listeners, in registration order. |
//! | `subscribers` | Told about every change-listener registration. |
//! | `lifecycle`   | `Idle` or `Listening`; serializes registration and owns the source subscription. |
//!
//! ## Lifecycle
//! The source is subscribed lazily: the first change listener moves the
//! engine from `Idle` to `Listening`, the last one moves it back, which
//! unsubscribes and drops the whole list. Resubscribing always starts from
//! an empty list.
//!
//! ## Ordering
//! An Added or Moved child lands right after its `previous_key`, or at the
//! head when there is none. A Moved child leaves its old slot before its new
//! slot is computed. Keys are looked up by a first-match linear scan.
//!
//! Any event that names a key the list does not hold is a protocol violation
//! by the source; it is reported as [`SyncError::KeyNotFound`] and the list is
//! left untouched.
//!
//! ## Subscriptions
//! Each `Idle -> Listening` transition opens a numbered subscription. The
//! number is only read or changed under the `snapshots` write lock, so an
//! event still in flight from a subscription that has since been closed is
//! dropped instead of landing in a cleared list.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak,
    },
};

use log::{debug, info, trace, warn};

use ordo_shared::{
    index_for_key, insertion_index, same_listener, Cancellation, ChangeEvent,
    ChangeEventListener, ChildEvent, ChildEventListener, OrderedSource, ReadOnlyList, Snapshot,
    SubscriptionEvent, SubscriptionEventListener, SyncError, ValueEvent, ValueEventListener,
};

use crate::{ParsedArray, SnapshotParser, SyncArrayConfig};

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T: ?Sized>(rw_lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    rw_lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T: ?Sized>(rw_lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    rw_lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to an ordered mirror. Clones share the same engine.
pub struct SyncArray<S: Snapshot> {
    inner: Arc<SyncArrayInner<S>>,
}

impl<S: Snapshot> Clone for SyncArray<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: Snapshot> SyncArray<S> {
    pub fn new(source: Arc<dyn OrderedSource<S>>) -> Self {
        Self::with_config(source, SyncArrayConfig::default())
    }

    pub fn with_config(source: Arc<dyn OrderedSource<S>>, config: SyncArrayConfig) -> Self {
        Self {
            inner: Arc::new(SyncArrayInner {
                source,
                snapshots: RwLock::new(Vec::with_capacity(config.capacity_hint)),
                listeners: Mutex::new(Vec::new()),
                subscribers: Mutex::new(Vec::new()),
                notify_listeners: AtomicBool::new(config.notify_listeners),
                lifecycle: Mutex::new(Lifecycle::Idle),
                subscription: AtomicU64::new(IDLE),
                subscriptions_opened: AtomicU64::new(0),
            }),
        }
    }

    // Listeners

    /// Registers `listener` for change events and returns it for later
    /// removal. The first registration subscribes to the source, which may
    /// replay its current children before this returns.
    pub fn add_change_listener(
        &self,
        listener: Arc<dyn ChangeEventListener>,
    ) -> Arc<dyn ChangeEventListener> {
        self.register(listener.clone(), |_| ());
        listener
    }

    /// Registers `listener` and returns the list as it stood at that moment.
    /// `listener` is told about exactly the changes applied after the copy.
    pub(crate) fn add_change_listener_with_contents(
        &self,
        listener: Arc<dyn ChangeEventListener>,
    ) -> Vec<S> {
        self.register(listener, |snapshots| snapshots.to_vec())
    }

    fn register<R>(
        &self,
        listener: Arc<dyn ChangeEventListener>,
        read_contents: impl FnOnce(&[S]) -> R,
    ) -> R {
        let mut lifecycle = lock(&self.inner.lifecycle);

        // the store read lock orders this push against the listener copy
        // every applied event takes under the write lock
        let contents = {
            let snapshots = read(&self.inner.snapshots);
            lock(&self.inner.listeners).push(listener);
            read_contents(&snapshots)
        };
        self.inner
            .notify_subscription_listeners(SubscriptionEvent::ListenerAdded);

        if let Lifecycle::Idle = *lifecycle {
            let subscription = self
                .inner
                .subscriptions_opened
                .fetch_add(1, Ordering::AcqRel)
                + 1;
            {
                let _snapshots = write(&self.inner.snapshots);
                self.inner
                    .subscription
                    .store(subscription, Ordering::Release);
            }
            let sink = Arc::new(SourceSink {
                array: Arc::downgrade(&self.inner),
                subscription,
            });
            *lifecycle = Lifecycle::Listening(sink.clone());

            info!(
                "SyncArray: first change listener added, opening subscription {}",
                subscription
            );
            self.inner.source.add_child_event_listener(sink.clone());
            self.inner.source.add_value_event_listener(sink);
        }

        contents
    }

    /// Unregisters one registration of `listener`. Removing the last one
    /// unsubscribes from the source and empties the list.
    ///
    /// Subscription listeners hear about every call. A `listener` that is not
    /// registered changes nothing else and is reported as
    /// [`SyncError::InvalidArgument`].
    pub fn remove_change_listener(
        &self,
        listener: &Arc<dyn ChangeEventListener>,
    ) -> Result<(), SyncError> {
        let mut lifecycle = lock(&self.inner.lifecycle);

        let removed = {
            let mut listeners = lock(&self.inner.listeners);
            listeners
                .iter()
                .position(|registered| same_listener(registered, listener))
                .map(|position| {
                    listeners.remove(position);
                    listeners.is_empty()
                })
        };
        self.inner
            .notify_subscription_listeners(SubscriptionEvent::ListenerRemoved);

        let now_empty = removed.ok_or(SyncError::InvalidArgument {
            reason: "change listener is not registered",
        })?;

        if now_empty {
            if let Lifecycle::Listening(sink) = std::mem::replace(&mut *lifecycle, Lifecycle::Idle)
            {
                {
                    let mut snapshots = write(&self.inner.snapshots);
                    self.inner.subscription.store(IDLE, Ordering::Release);
                    snapshots.clear();
                }
                let value_sink: Arc<dyn ValueEventListener> = sink.clone();
                let child_sink: Arc<dyn ChildEventListener<S>> = sink;
                self.inner.source.remove_value_event_listener(&value_sink);
                self.inner.source.remove_child_event_listener(&child_sink);
                info!("SyncArray: last change listener removed, unsubscribed from source");
            }
        }

        Ok(())
    }

    pub fn add_subscription_listener(
        &self,
        listener: Arc<dyn SubscriptionEventListener>,
    ) -> Arc<dyn SubscriptionEventListener> {
        lock(&self.inner.subscribers).push(listener.clone());
        listener
    }

    pub fn remove_subscription_listener(
        &self,
        listener: &Arc<dyn SubscriptionEventListener>,
    ) -> Result<(), SyncError> {
        let mut subscribers = lock(&self.inner.subscribers);
        let position = subscribers
            .iter()
            .position(|registered| same_listener(registered, listener))
            .ok_or(SyncError::InvalidArgument {
                reason: "subscription listener is not registered",
            })?;
        subscribers.remove(position);
        Ok(())
    }

    /// True while at least one change listener is registered.
    pub fn is_listening(&self) -> bool {
        !lock(&self.inner.listeners).is_empty()
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.inner.listeners).len()
    }

    pub fn set_notify_listeners(&self, notify_listeners: bool) {
        self.inner
            .notify_listeners
            .store(notify_listeners, Ordering::Release);
    }

    pub fn notifies_listeners(&self) -> bool {
        self.inner.notify_listeners.load(Ordering::Acquire)
    }

    // Events

    /// Applies one structural event and notifies change listeners, for
    /// callers that deliver the source's events themselves.
    ///
    /// The list only exists while someone listens: an idle engine rejects
    /// the event with [`SyncError::NotListening`].
    pub fn apply(&self, event: ChildEvent<S>) -> Result<ChangeEvent, SyncError> {
        match self.inner.apply(None, event)? {
            Some(change) => Ok(change),
            None => Err(SyncError::NotListening),
        }
    }

    /// Forwards a value event to change listeners. Ignored while idle.
    pub fn apply_value_event(&self, event: ValueEvent) {
        self.inner.on_value_event(None, event);
    }

    // Reads

    pub fn len(&self) -> usize {
        read(&self.inner.snapshots).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.inner.snapshots).is_empty()
    }

    pub fn get(&self, index: usize) -> Option<S> {
        read(&self.inner.snapshots).get(index).cloned()
    }

    pub fn index_of_key(&self, key: &str) -> Option<usize> {
        index_for_key(&read(&self.inner.snapshots), key).ok()
    }

    pub fn keys(&self) -> Vec<String> {
        read(&self.inner.snapshots)
            .iter()
            .map(|snapshot| snapshot.key().to_string())
            .collect()
    }

    pub fn to_vec(&self) -> Vec<S> {
        read(&self.inner.snapshots).clone()
    }

    /// Read-only view of the live list. The list cannot change while the
    /// view is held, so keep it short-lived.
    pub fn snapshots(&self) -> ReadOnlyList<RwLockReadGuard<'_, Vec<S>>> {
        ReadOnlyList::new(read(&self.inner.snapshots))
    }

    /// Continually updated list of the snapshots mapped through `parser`.
    pub fn to_parsed<T, P>(&self, parser: P) -> ParsedArray<S, T>
    where
        T: Clone + Send + Sync + 'static,
        P: SnapshotParser<S, T> + 'static,
    {
        ParsedArray::new(self.clone(), parser)
    }
}

impl<S: Snapshot + fmt::Debug> fmt::Debug for SyncArray<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncArray")
            .field("is_listening", &self.is_listening())
            .field("snapshots", &*read(&self.inner.snapshots))
            .finish()
    }
}

enum Lifecycle<S: Snapshot> {
    Idle,
    Listening(Arc<SourceSink<S>>),
}

struct SyncArrayInner<S: Snapshot> {
    source: Arc<dyn OrderedSource<S>>,
    snapshots: RwLock<Vec<S>>,
    listeners: Mutex<Vec<Arc<dyn ChangeEventListener>>>,
    subscribers: Mutex<Vec<Arc<dyn SubscriptionEventListener>>>,
    notify_listeners: AtomicBool,
    lifecycle: Mutex<Lifecycle<S>>,
    /// Number of the open subscription, [`IDLE`] when there is none. Only
    /// changed under the `snapshots` write lock.
    subscription: AtomicU64,
    subscriptions_opened: AtomicU64,
}

const IDLE: u64 = 0;

impl<S: Snapshot> SyncArrayInner<S> {
    fn is_current(&self, from: Option<u64>) -> bool {
        let current = self.subscription.load(Ordering::Acquire);
        current != IDLE && from.map_or(true, |subscription| subscription == current)
    }

    /// Applies `event` if it belongs to the open subscription (any open
    /// subscription when `from` is `None`). `Ok(None)` means it was dropped.
    fn apply(
        &self,
        from: Option<u64>,
        event: ChildEvent<S>,
    ) -> Result<Option<ChangeEvent>, SyncError> {
        let kind = event.kind();
        let key = event.key().to_string();

        // the write lock must be released before listeners run
        let (result, listeners) = {
            let mut snapshots = write(&self.snapshots);
            if !self.is_current(from) {
                debug!("SyncArray: dropped {:?} for key {}, subscription closed", kind, key);
                return Ok(None);
            }
            let result = apply_child_event(&mut snapshots, event);
            // copied under the write lock so a listener registered at the
            // same time either sees this change in its contents or is told
            let listeners = match result {
                Ok(_) => self.listeners_to_notify(),
                Err(_) => None,
            };
            (result, listeners)
        };

        match result {
            Ok(change) => {
                debug!("SyncArray: applied {:?} for key {} -> {:?}", kind, key, change);
                if let Some(listeners) = listeners {
                    trace!("SyncArray: notifying {} listeners of {:?}", listeners.len(), change);
                    for listener in listeners {
                        listener.on_child_changed(change);
                    }
                }
                Ok(Some(change))
            }
            Err(error) => {
                warn!("SyncArray: rejected {:?} for key {}: {}", kind, key, error);
                Err(error)
            }
        }
    }

    fn on_value_event(&self, from: Option<u64>, event: ValueEvent) {
        if !self.is_current(from) {
            return;
        }
        match event {
            ValueEvent::DataChange => self.notify_data_changed(),
            ValueEvent::Cancelled(error) => {
                warn!("SyncArray: source cancelled: {}", error);
                self.notify_cancelled(&Cancellation::Remote(error));
            }
        }
    }

    fn listeners_to_notify(&self) -> Option<Vec<Arc<dyn ChangeEventListener>>> {
        if !self.notify_listeners.load(Ordering::Acquire) {
            return None;
        }
        Some(lock(&self.listeners).clone())
    }

    fn notify_data_changed(&self) {
        let Some(listeners) = self.listeners_to_notify() else {
            return;
        };
        for listener in listeners {
            listener.on_data_changed();
        }
    }

    fn notify_cancelled(&self, cancellation: &Cancellation) {
        let Some(listeners) = self.listeners_to_notify() else {
            return;
        };
        for listener in listeners {
            listener.on_cancelled(cancellation);
        }
    }

    fn notify_subscription_listeners(&self, event: SubscriptionEvent) {
        let subscribers = lock(&self.subscribers).clone();
        for subscriber in subscribers {
            match event {
                SubscriptionEvent::ListenerAdded => subscriber.on_subscription_added(),
                SubscriptionEvent::ListenerRemoved => subscriber.on_subscription_removed(),
            }
        }
    }
}

/// What the engine registers with its source for one subscription. Holds
/// the engine weakly so a source outliving every handle does not keep the
/// list alive.
struct SourceSink<S: Snapshot> {
    array: Weak<SyncArrayInner<S>>,
    subscription: u64,
}

impl<S: Snapshot> ChildEventListener<S> for SourceSink<S> {
    fn on_child_event(&self, event: ChildEvent<S>) -> Result<(), SyncError> {
        match self.array.upgrade() {
            Some(array) => array.apply(Some(self.subscription), event).map(|_| ()),
            None => Ok(()),
        }
    }
}

impl<S: Snapshot> ValueEventListener for SourceSink<S> {
    fn on_value_event(&self, event: ValueEvent) {
        if let Some(array) = self.array.upgrade() {
            array.on_value_event(Some(self.subscription), event);
        }
    }
}

/// Applies `event` to `snapshots`. On error `snapshots` is unchanged.
///
/// A Moved child leaves its slot before `previous_key` is looked up, so a
/// Moved naming itself as `previous_key` is [`SyncError::KeyNotFound`] and
/// changes nothing. Moving a child behind its current predecessor keeps the
/// order.
pub fn apply_child_event<S: Snapshot>(
    snapshots: &mut Vec<S>,
    event: ChildEvent<S>,
) -> Result<ChangeEvent, SyncError> {
    match event {
        ChildEvent::Added {
            snapshot,
            previous_key,
        } => {
            if snapshots.iter().any(|held| held.key() == snapshot.key()) {
                return Err(SyncError::DuplicateKey {
                    key: snapshot.key().to_string(),
                });
            }
            let index = insertion_index(snapshots, previous_key.as_deref())?;
            snapshots.insert(index, snapshot);
            Ok(ChangeEvent::Added { index })
        }
        ChildEvent::Changed { snapshot } => {
            let index = index_for_key(snapshots, snapshot.key())?;
            snapshots[index] = snapshot;
            Ok(ChangeEvent::Changed { index })
        }
        ChildEvent::Removed { snapshot } => {
            let index = index_for_key(snapshots, snapshot.key())?;
            snapshots.remove(index);
            Ok(ChangeEvent::Removed { index })
        }
        ChildEvent::Moved {
            snapshot,
            previous_key,
        } => {
            let old_index = index_for_key(snapshots, snapshot.key())?;
            let displaced = snapshots.remove(old_index);
            match insertion_index(snapshots, previous_key.as_deref()) {
                Ok(index) => {
                    snapshots.insert(index, snapshot);
                    Ok(ChangeEvent::Moved { index, old_index })
                }
                Err(error) => {
                    snapshots.insert(old_index, displaced);
                    Err(error)
                }
            }
        }
    }
}
