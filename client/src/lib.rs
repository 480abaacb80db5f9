//! # Ordo Client
//! Keeps an ordered local mirror of a remote collection in sync by applying
//! incremental child events, and notifies listeners with index-level changes.
//!
//! ```text
//!  OrderedSource ──ChildEvent──▶ SyncArray ──ChangeEvent──▶ listeners
//!                ──ValueEvent──▶     │
//!                                    └──ChangeEvent──▶ ParsedArray ──▶ listeners
//! ```

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

pub use ordo_shared::{
    Cancellation, ChangeEvent, ChangeEventListener, ChangeKind, ChildEvent, ChildEventListener,
    DataSnapshot, OrderedSource, ParseError, ReadOnlyList, RemoteError, Snapshot,
    SubscriptionEvent, SubscriptionEventListener, SyncError, ValueEvent, ValueEventListener,
};

mod config;
mod parsed_array;
mod parser;
mod sync_array;

pub use config::SyncArrayConfig;
pub use parsed_array::ParsedArray;
pub use parser::{SnapshotParser, ValueParser};
pub use sync_array::{apply_child_event, SyncArray};
