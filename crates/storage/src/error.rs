//! Storage error type.

use chainloom_types::CodecError;
use thiserror::Error;

/// Errors from the key-value layer.
///
/// `NotFound` is a distinct variant so callers can default (e.g. issuance
/// queries return zero) without conflating absence with I/O failure.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The key does not exist.
    #[error("key not found")]
    NotFound,

    /// A record existed but failed to decode.
    #[error("corrupt record")]
    Corrupt(#[from] CodecError),

    /// The backing engine reported a failure.
    #[error("storage backend: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether this error is the not-found sentinel.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}
