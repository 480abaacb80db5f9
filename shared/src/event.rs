//! Event definitions flowing through the sync engine.
//!
//! Three families:
//! * [`ChildEvent`] – structural events delivered by the remote source, one
//!   per inserted/updated/removed/reordered child.
//! * [`ValueEvent`] – whole-collection events: consistency checkpoints and
//!   the terminal cancellation.
//! * [`ChangeEvent`] – what the engine publishes after applying a
//!   [`ChildEvent`], expressed purely as list indices.

use crate::{RemoteError, Snapshot};

/// Structural event for one child of the remote collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChildEvent<S> {
    /// `previous_key` is the key of the new predecessor, `None` for the head.
    Added {
        snapshot: S,
        previous_key: Option<String>,
    },
    Changed {
        snapshot: S,
    },
    Removed {
        snapshot: S,
    },
    /// `previous_key` is resolved after the child left its old position.
    Moved {
        snapshot: S,
        previous_key: Option<String>,
    },
}

impl<S: Snapshot> ChildEvent<S> {
    pub fn added(snapshot: S, previous_key: Option<&str>) -> Self {
        Self::Added {
            snapshot,
            previous_key: previous_key.map(str::to_string),
        }
    }

    pub fn changed(snapshot: S) -> Self {
        Self::Changed { snapshot }
    }

    pub fn removed(snapshot: S) -> Self {
        Self::Removed { snapshot }
    }

    pub fn moved(snapshot: S, previous_key: Option<&str>) -> Self {
        Self::Moved {
            snapshot,
            previous_key: previous_key.map(str::to_string),
        }
    }

    pub fn snapshot(&self) -> &S {
        match self {
            Self::Added { snapshot, .. }
            | Self::Changed { snapshot }
            | Self::Removed { snapshot }
            | Self::Moved { snapshot, .. } => snapshot,
        }
    }

    pub fn key(&self) -> &str {
        self.snapshot().key()
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Added { .. } => ChangeKind::Added,
            Self::Changed { .. } => ChangeKind::Changed,
            Self::Removed { .. } => ChangeKind::Removed,
            Self::Moved { .. } => ChangeKind::Moved,
        }
    }
}

/// Whole-collection event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValueEvent {
    /// Everything delivered so far is a consistent view of the remote side.
    DataChange,
    /// The subscription is over; no further events follow.
    Cancelled(RemoteError),
}

/// Tag shared by [`ChildEvent`] and [`ChangeEvent`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ChangeKind {
    Added,
    Changed,
    Removed,
    Moved,
}

/// Normalized change published to listeners.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ChangeEvent {
    Added { index: usize },
    Changed { index: usize },
    Removed { index: usize },
    Moved { index: usize, old_index: usize },
}

impl ChangeEvent {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Added { .. } => ChangeKind::Added,
            Self::Changed { .. } => ChangeKind::Changed,
            Self::Removed { .. } => ChangeKind::Removed,
            Self::Moved { .. } => ChangeKind::Moved,
        }
    }

    /// Index the change applies to (the new index for a move).
    pub fn index(&self) -> usize {
        match self {
            Self::Added { index }
            | Self::Changed { index }
            | Self::Removed { index }
            | Self::Moved { index, .. } => *index,
        }
    }

    pub fn old_index(&self) -> Option<usize> {
        match self {
            Self::Moved { old_index, .. } => Some(*old_index),
            _ => None,
        }
    }
}

/// Registration change reported to subscription listeners.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum SubscriptionEvent {
    ListenerAdded,
    ListenerRemoved,
}
