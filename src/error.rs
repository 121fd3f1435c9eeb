//! Error types for storage and reservation operations.
//!
//! Two layers:
//! - [`StoreError`]: failures of the key-value backends
//! - [`Error`]: what restaurant and reservation operations return to callers

use thiserror::Error;

/// Errors that can occur inside a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Key is empty or longer than the collection allows.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Encoded value exceeds the collection's size bound.
    #[error("value of {size} bytes exceeds the {max} byte limit of collection {collection}")]
    ValueTooLarge {
        collection: &'static str,
        size: usize,
        max: u32,
    },

    /// Store was opened with bounds that differ from the ones it was created with.
    #[error("configuration mismatch: {0}")]
    ConfigMismatch(String),

    /// Store configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Cannot connect to or communicate with storage backend.
    #[error("connection error: {0}")]
    ConnectionError(String),

    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Database error from SQLx.
    #[error("database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// I/O error.
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] ::config::ConfigError),
}

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::SerializationError(err.to_string())
    }
}

/// Errors returned by restaurant and reservation operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed input field.
    #[error("validation error: {0}")]
    Validation(String),

    /// Referenced record does not exist.
    #[error("{entity} with ID={id} not found")]
    NotFound { entity: &'static str, id: String },

    /// Slot already held, illegal status transition, or a mutation that
    /// would orphan active reservations.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The backing store failed.
    #[error(transparent)]
    Store(StoreError),
}

/// A record too large for its collection is bad input, not a store failure.
impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ValueTooLarge { .. } => Error::Validation(err.to_string()),
            other => Error::Store(other),
        }
    }
}

/// Result type alias for restaurant and reservation operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub(crate) fn conflict(msg: impl Into<String>) -> Self {
        Error::Conflict(msg.into())
    }

    pub(crate) fn restaurant_not_found(id: impl Into<String>) -> Self {
        Error::NotFound {
            entity: "Restaurant",
            id: id.into(),
        }
    }

    pub(crate) fn reservation_not_found(id: impl Into<String>) -> Self {
        Error::NotFound {
            entity: "Reservation",
            id: id.into(),
        }
    }

    /// Returns true if repeating the call might succeed.
    ///
    /// Nothing is retried internally; this is for callers.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Store(StoreError::ConnectionError(_)) | Error::Store(StoreError::DatabaseError(_))
        )
    }
}
