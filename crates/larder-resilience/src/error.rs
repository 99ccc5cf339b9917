//! Error types for larder-resilience.

use std::time::Duration;
use thiserror::Error;

/// Outcome of a call routed through a circuit breaker.
#[derive(Debug, Error)]
pub enum CircuitError<E> {
    /// The breaker for `key` rejected the call without running it.
    #[error("circuit '{key}' is open, retry after {retry_after:?}")]
    Open {
        /// Dependency key of the breaker.
        key: String,
        /// Time until the breaker will admit a trial call.
        retry_after: Duration,
    },

    /// The wrapped operation ran and failed.
    #[error("{0}")]
    Inner(E),
}

impl<E> CircuitError<E> {
    /// Returns `true` if the call was rejected by an open breaker.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// Retry hint for rejected calls.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Open { retry_after, .. } => Some(*retry_after),
            Self::Inner(_) => None,
        }
    }

    /// The operation's own error, if it ran.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            Self::Open { .. } => None,
        }
    }
}
