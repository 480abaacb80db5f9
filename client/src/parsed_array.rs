//! Parsed projection of a [`SyncArray`].
//!
//! A `ParsedArray` is an ordinary change listener on its engine. For every
//! change it reads the affected snapshot back from the engine by index,
//! parses it, applies the same index operation to its own list and then
//! republishes the change to its own listeners.
//!
//! Parse failures stay inside the view: the view empties itself, reports
//! [`Cancellation::Parse`] to its listeners and ignores everything after.
//!
//! The view rebuilds itself from the engine on every checkpoint, and whenever
//! its length shows it missed a change (e.g. while the engine's
//! notifications were off).

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, warn};

use ordo_shared::{
    same_listener, Cancellation, ChangeEvent, ChangeEventListener, ParseError, ReadOnlyList,
    Snapshot, SyncError,
};

use crate::{SnapshotParser, SyncArray};

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T: ?Sized>(rw_lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    rw_lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T: ?Sized>(rw_lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    rw_lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Continually updated list of parsed snapshots. Dropping it unregisters it
/// from its engine.
pub struct ParsedArray<S: Snapshot, T: Clone + Send + Sync + 'static> {
    inner: Arc<ParsedArrayInner<S, T>>,
    registration: Arc<dyn ChangeEventListener>,
}

impl<S: Snapshot, T: Clone + Send + Sync + 'static> ParsedArray<S, T> {
    /// Registers the view as a change listener (which subscribes the engine
    /// if it was idle) and seeds it from the engine's list at that moment.
    /// Changes arriving before the seed is in place are queued behind it.
    pub fn new<P: SnapshotParser<S, T> + 'static>(array: SyncArray<S>, parser: P) -> Self {
        let inner = Arc::new(ParsedArrayInner {
            array: array.clone(),
            parser: Box::new(parser),
            elements: RwLock::new(Vec::new()),
            failure: Mutex::new(None),
            listeners: Mutex::new(Vec::new()),
            queued: Mutex::new(Some(Vec::new())),
        });

        let registration: Arc<dyn ChangeEventListener> = inner.clone();
        let contents = array.add_change_listener_with_contents(registration.clone());
        inner.seed(&contents);

        Self {
            inner,
            registration,
        }
    }

    pub fn add_change_listener(
        &self,
        listener: Arc<dyn ChangeEventListener>,
    ) -> Arc<dyn ChangeEventListener> {
        lock(&self.inner.listeners).push(listener.clone());
        listener
    }

    pub fn remove_change_listener(
        &self,
        listener: &Arc<dyn ChangeEventListener>,
    ) -> Result<(), SyncError> {
        let mut listeners = lock(&self.inner.listeners);
        let position = listeners
            .iter()
            .position(|registered| same_listener(registered, listener))
            .ok_or(SyncError::InvalidArgument {
                reason: "change listener is not registered",
            })?;
        listeners.remove(position);
        Ok(())
    }

    /// The parse failure that stopped this view, if any.
    pub fn error(&self) -> Option<ParseError> {
        lock(&self.inner.failure).clone()
    }

    pub fn len(&self) -> usize {
        read(&self.inner.elements).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.inner.elements).is_empty()
    }

    pub fn get(&self, index: usize) -> Option<T> {
        read(&self.inner.elements).get(index).cloned()
    }

    pub fn to_vec(&self) -> Vec<T> {
        read(&self.inner.elements).clone()
    }

    pub fn elements(&self) -> ReadOnlyList<RwLockReadGuard<'_, Vec<T>>> {
        ReadOnlyList::new(read(&self.inner.elements))
    }

    /// Unregisters from the engine. Same as dropping the view.
    pub fn detach(self) {}
}

impl<S: Snapshot, T: Clone + Send + Sync + 'static> Drop for ParsedArray<S, T> {
    fn drop(&mut self) {
        if let Err(error) = self.inner.array.remove_change_listener(&self.registration) {
            debug!("ParsedArray: detach failed: {}", error);
        }
    }
}

/// A change received before the seed was installed, parsed on arrival.
type Queued<T> = (ChangeEvent, Option<T>);

struct ParsedArrayInner<S: Snapshot, T> {
    array: SyncArray<S>,
    parser: Box<dyn SnapshotParser<S, T>>,
    elements: RwLock<Vec<T>>,
    failure: Mutex<Option<ParseError>>,
    listeners: Mutex<Vec<Arc<dyn ChangeEventListener>>>,
    /// `Some` until the seed is installed.
    queued: Mutex<Option<Vec<Queued<T>>>>,
}

impl<S: Snapshot, T: Send + Sync> ParsedArrayInner<S, T> {
    fn is_failed(&self) -> bool {
        lock(&self.failure).is_some()
    }

    /// Rebuilds the whole view from the engine's current list.
    fn reseed(&self) -> Result<(), ParseError> {
        let parsed = self
            .array
            .to_vec()
            .iter()
            .map(|snapshot| self.parser.parse_snapshot(snapshot))
            .collect::<Result<Vec<T>, ParseError>>()?;
        debug!("ParsedArray: seeded {} elements", parsed.len());
        *write(&self.elements) = parsed;
        Ok(())
    }

    /// Installs the seed, then replays whatever arrived while it was taken.
    fn seed(&self, contents: &[S]) {
        let mut queued = lock(&self.queued);
        let parsed = contents
            .iter()
            .map(|snapshot| self.parser.parse_snapshot(snapshot))
            .collect::<Result<Vec<T>, ParseError>>();
        let pending = queued.take().unwrap_or_default();
        if self.is_failed() {
            return;
        }
        match parsed {
            Ok(parsed) => {
                debug!(
                    "ParsedArray: seeded {} elements, {} queued changes",
                    parsed.len(),
                    pending.len()
                );
                let mut elements = write(&self.elements);
                *elements = parsed;
                for (event, item) in pending {
                    if !apply_to(&mut elements, event, item) {
                        drop(elements);
                        if let Err(error) = self.reseed() {
                            self.fail(error);
                        }
                        return;
                    }
                }
            }
            Err(error) => self.fail(error),
        }
    }

    /// Parses the snapshot `event` points at, as it stands right now.
    fn parse_for(&self, event: ChangeEvent) -> Result<Option<T>, ParseError> {
        match event {
            ChangeEvent::Removed { .. } => Ok(None),
            _ => match self.array.get(event.index()) {
                Some(snapshot) => self.parser.parse_snapshot(&snapshot).map(Some),
                None => Ok(None),
            },
        }
    }

    fn apply(&self, event: ChangeEvent, parsed: Option<T>) -> Result<(), ParseError> {
        // the engine has already applied `event`
        let engine_len = self.array.len();
        let expected_len = match event {
            ChangeEvent::Added { .. } => engine_len.checked_sub(1),
            ChangeEvent::Removed { .. } => Some(engine_len + 1),
            _ => Some(engine_len),
        };

        let mut elements = write(&self.elements);
        if Some(elements.len()) == expected_len && apply_to(&mut elements, event, parsed) {
            return Ok(());
        }
        // out of step with the engine, e.g. after suppressed notifications
        drop(elements);
        debug!("ParsedArray: out of step at {:?}, reseeding", event);
        self.reseed()
    }

    fn fail(&self, error: ParseError) {
        warn!("ParsedArray: {}; view stopped", error);
        write(&self.elements).clear();
        *lock(&self.failure) = Some(error.clone());
        self.notify_cancelled(&Cancellation::Parse(error));
    }

    fn listeners(&self) -> Vec<Arc<dyn ChangeEventListener>> {
        lock(&self.listeners).clone()
    }

    fn notify_cancelled(&self, cancellation: &Cancellation) {
        for listener in self.listeners() {
            listener.on_cancelled(cancellation);
        }
    }
}

/// Applies one index operation. `false` when it does not fit `elements`.
fn apply_to<T>(elements: &mut Vec<T>, event: ChangeEvent, parsed: Option<T>) -> bool {
    let len = elements.len();
    match (event, parsed) {
        (ChangeEvent::Added { index }, Some(item)) if index <= len => {
            elements.insert(index, item);
        }
        (ChangeEvent::Changed { index }, Some(item)) if index < len => {
            elements[index] = item;
        }
        (ChangeEvent::Removed { index }, None) if index < len => {
            elements.remove(index);
        }
        (ChangeEvent::Moved { index, old_index }, Some(item))
            if old_index < len && index < len =>
        {
            elements.remove(old_index);
            elements.insert(index, item);
        }
        _ => return false,
    }
    true
}

impl<S: Snapshot, T: Send + Sync> ChangeEventListener for ParsedArrayInner<S, T> {
    fn on_child_changed(&self, event: ChangeEvent) {
        if self.is_failed() {
            return;
        }
        // parse before locking, the parser is caller code
        let parsed = match self.parse_for(event) {
            Ok(parsed) => parsed,
            Err(error) => {
                self.fail(error);
                return;
            }
        };
        {
            let mut queued = lock(&self.queued);
            if let Some(queue) = queued.as_mut() {
                queue.push((event, parsed));
                return;
            }
        }
        if let Err(error) = self.apply(event, parsed) {
            self.fail(error);
            return;
        }
        for listener in self.listeners() {
            listener.on_child_changed(event);
        }
    }

    fn on_data_changed(&self) {
        if self.is_failed() || lock(&self.queued).is_some() {
            return;
        }
        if let Err(error) = self.reseed() {
            self.fail(error);
            return;
        }
        for listener in self.listeners() {
            listener.on_data_changed();
        }
    }

    fn on_cancelled(&self, cancellation: &Cancellation) {
        if self.is_failed() {
            return;
        }
        self.notify_cancelled(cancellation);
    }
}
