//! # Ordo Shared
//! Common types shared between the ordo engine, derived views and sources.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod error;
mod event;
mod listener;
mod read_only_list;
mod snapshot;
mod source;

pub use error::{Cancellation, ParseError, RemoteError, SyncError};
pub use event::{ChangeEvent, ChangeKind, ChildEvent, SubscriptionEvent, ValueEvent};
pub use listener::{
    same_listener, ChangeEventListener, ChildEventListener, SubscriptionEventListener,
    ValueEventListener,
};
pub use read_only_list::{Iter, ListIter, ReadOnlyList};
pub use snapshot::{index_for_key, insertion_index, DataSnapshot, Snapshot};
pub use source::OrderedSource;
