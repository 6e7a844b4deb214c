//! Error types for filemap.

use thiserror::Error;

/// The main error type for filemap operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O failure while touching the backing file
    #[error("I/O error during {}{}: {}", .op, key_suffix(.key), .source)]
    Io {
        /// Operation that was attempted (`"append"`, `"read"`, ...)
        op: &'static str,
        /// Encoded key token involved in the operation, if any
        key: Option<String>,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The log contains a record that cannot be parsed
    #[error("corrupt log at offset {offset}: {reason}")]
    CorruptLog {
        /// Byte offset where the offending line starts
        offset: u64,
        /// What is wrong with the line
        reason: String,
    },

    /// The codec rejected a token
    #[error("decode error: {0}")]
    Decode(String),

    /// The codec could not produce a valid token
    #[error("encode error: {0}")]
    Encode(String),

    /// Operation is a capability gap of the offset-indexed store
    #[error("{0} is unsupported for offset-indexed store")]
    NotSupported(&'static str),

    /// The store was closed
    #[error("store is closed")]
    Closed,

    /// A lock was poisoned (internal error)
    #[error("lock poisoned")]
    LockPoisoned,

    /// Rejected configuration value
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

fn key_suffix(key: &Option<String>) -> String {
    match key {
        Some(k) => format!(" (key {})", k),
        None => String::new(),
    }
}

impl Error {
    /// Builds an [`Error::Io`] for an operation that involves no key.
    pub fn io(op: &'static str, source: std::io::Error) -> Self {
        Error::Io {
            op,
            key: None,
            source,
        }
    }

    /// Builds an [`Error::Io`] carrying the encoded key token.
    pub fn io_with_key(op: &'static str, key: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            op,
            key: Some(key.into()),
            source,
        }
    }

    /// Whether retrying the operation could succeed.
    ///
    /// Only I/O failures qualify; everything else is structural.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Io { .. })
    }
}

/// A specialized `Result` type for filemap operations.
pub type Result<T> = std::result::Result<T, Error>;
