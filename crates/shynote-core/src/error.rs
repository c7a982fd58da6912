//! Error types for shynote.

use std::fmt;

use thiserror::Error;

/// Result type alias using shynote's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// The kind of record an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Note,
    Folder,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Note => write!(f, "note"),
            Self::Folder => write!(f, "folder"),
        }
    }
}

/// Core error type for shynote operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Record store transport or transaction failure (wraps sqlx::Error).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The record id already exists under a different owner.
    ///
    /// Not retriable without a new id.
    #[error("Identity conflict: {kind} {id} belongs to another owner")]
    IdentityConflict { kind: RecordKind, id: String },

    /// A stale write was attempted; the caller must re-fetch and retry.
    #[error("Version conflict on note {id}: expected {expected}, current {current}")]
    VersionConflict {
        id: String,
        expected: i64,
        current: i64,
    },

    /// Resource not found for the given owner
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed input or reference (e.g. a folder owned by someone else)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a missing note.
    pub fn note_not_found(id: &str) -> Self {
        Error::NotFound(format!("note {}", id))
    }

    /// Shorthand for a missing folder.
    pub fn folder_not_found(id: &str) -> Self {
        Error::NotFound(format!("folder {}", id))
    }

    /// True for identity and version conflicts.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Error::IdentityConflict { .. } | Error::VersionConflict { .. }
        )
    }

    /// True when the same request may succeed if retried (after a re-fetch
    /// for version conflicts).
    pub fn is_retriable(&self) -> bool {
        matches!(self, Error::VersionConflict { .. } | Error::Database(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
