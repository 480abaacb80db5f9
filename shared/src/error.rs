use thiserror::Error;

/// Errors raised by the sync engine and the read-only list contract
///
/// A `KeyNotFound` or `DuplicateKey` means the remote source broke its
/// ordering/consistency contract. The engine surfaces these instead of
/// resyncing, and the store is left exactly as it was before the event.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    /// A registration request that can never succeed
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: &'static str },

    /// A structural event referenced a key that is not mirrored
    #[error("Key not found: {key}")]
    KeyNotFound { key: String },

    /// An Added event carried a key that is already mirrored
    #[error("Key {key} is already present in the mirrored list")]
    DuplicateKey { key: String },

    /// An event was applied to an engine with no change listeners
    #[error("Engine is not listening; the event was not applied")]
    NotListening,

    /// A mutation was attempted through a read-only view
    #[error("Unsupported mutation '{operation}' on a read-only list")]
    UnsupportedMutation { operation: &'static str },

    /// A cursor was requested past the end of the list
    #[error("Index {index} out of bounds for list of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
}

/// Terminal error reported by the remote source on its value stream
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Remote source cancelled ({code}): {message}")]
pub struct RemoteError {
    pub code: i32,
    pub message: String,
    pub details: String,
}

impl RemoteError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: String::new(),
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }
}

/// Failure converting one snapshot into a domain object
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Failed to parse snapshot {key}: {reason}")]
pub struct ParseError {
    pub key: String,
    pub reason: String,
}

impl ParseError {
    pub fn new(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Why a change listener will receive no further events
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Cancellation {
    /// The remote source terminated the subscription
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// A derived view could not parse one of its snapshots
    #[error(transparent)]
    Parse(#[from] ParseError),
}
