//! Error types for the chat history subsystem.

use thiserror::Error;

/// Chat history error type.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Malformed collection or document path.
    #[error("invalid path: {0}")]
    InvalidPath(String),
    /// Malformed user or document identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(String),
    /// An exchange must carry at least one message pair.
    #[error("exchange contains no message pairs")]
    EmptyExchange,
    /// A stored document does not have the expected shape.
    #[error("schema mismatch at {path}: {reason}")]
    SchemaMismatch {
        /// Path of the offending document.
        path: String,
        /// What failed to decode.
        reason: String,
    },
    /// `SQLite` storage error (sync).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// `SQLite` storage error (async).
    #[error("tokio-rusqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Opaque failure reported by a document store backend.
    #[error("backend error: {0}")]
    Backend(String),
}

impl HistoryError {
    /// Build a schema mismatch error for a document path.
    #[must_use]
    pub fn schema_mismatch(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience result alias for chat history operations.
pub type HistoryResult<T> = Result<T, HistoryError>;
