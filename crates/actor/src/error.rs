//! Actor runtime errors.

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced to callers of the actor runtime.
#[derive(Debug, Clone, Error)]
pub enum ActorError {
    /// A future's reply did not arrive within its timeout.
    #[error("request timed out after {timeout:?}")]
    Timeout {
        /// How long the caller waited.
        timeout: Duration,
    },

    /// A reply arrived but was not the expected type.
    #[error("unexpected response type, expected {expected}")]
    UnexpectedResponse {
        /// The type the caller asked for.
        expected: &'static str,
    },

    /// The dispatcher thread pool could not be built.
    #[error("failed to build dispatcher pool: {0}")]
    DispatcherBuild(String),
}
