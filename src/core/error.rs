//! Error types for the save-data store.
//!
//! Provides a unified error type for all store operations. Low-level I/O and
//! JSON failures are wrapped here at the store boundary so callers never see
//! raw filesystem error codes.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for save-data store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Campaign, entity, or encounter id not present in the expected index
    /// or location.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Campaign creation collision.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Manifest or entity JSON failed to parse.
    #[error("Corrupt data at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Malformed id, role, or payload.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Filesystem failure outside the NotFound/AlreadyExists cases.
    #[error("IO error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

impl StoreError {
    /// Create a not-found error with the given message.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an already-exists error with the given message.
    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    /// Create an invalid-argument error with the given message.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Wrap a parse failure with the offending path.
    pub fn corrupt(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Corrupt {
            path: path.into(),
            source,
        }
    }

    /// Wrap an I/O failure with the offending path.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap an I/O failure, mapping `NotFound` to the store's own kind.
    ///
    /// Used on read paths where a missing file means a missing campaign or
    /// record rather than a filesystem fault.
    pub fn io_or_not_found(path: impl Into<PathBuf>, source: io::Error, what: &str) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound(what.to_string())
        } else {
            Self::io(path, source)
        }
    }
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
