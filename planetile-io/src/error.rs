//! I/O error types.

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record line could not be parsed.
    #[error("invalid record at line {line}: {source}")]
    InvalidRecord {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// A CSV tile row could not be parsed.
    #[error("invalid tile row at line {line}: {reason}")]
    InvalidTileRow { line: usize, reason: String },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unknown output format.
    #[error("unsupported output format: {0:?}")]
    UnsupportedFormat(String),

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] planetile_core::Error),
}
