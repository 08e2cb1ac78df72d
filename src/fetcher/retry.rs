//! Retry classification and backoff for feed fetches.

use std::time::Duration;

use super::{FetchError, FetchFailure};

/// Why a single attempt did not produce a feed body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    /// HTTP 403, usually a soft bot block.
    Forbidden,
    /// HTTP 429.
    RateLimited,
    /// HTTP 5xx.
    ServerError(u16),
    /// Connection, reset or body read failure.
    Network(String),
    /// Connect or total timeout.
    Timeout(String),
}

impl AttemptFailure {
    /// Delay before the next attempt, for 0-based attempt index `attempt`.
    ///
    /// 429 waits `60 * (n + 1)` seconds; everything else waits `2^n` seconds.
    pub fn backoff(&self, attempt: u32) -> Duration {
        match self {
            AttemptFailure::RateLimited => Duration::from_secs(60 * (u64::from(attempt) + 1)),
            _ => Duration::from_secs(1u64 << attempt.min(16)),
        }
    }

    /// Final error once all attempts are used up.
    pub fn into_exhausted(self, attempts: u32) -> FetchError {
        match self {
            AttemptFailure::Forbidden => FetchError::new(
                FetchFailure::Blocked,
                format!("HTTP 403 after {attempts} attempts"),
            ),
            AttemptFailure::RateLimited => FetchError::new(
                FetchFailure::Blocked,
                format!("HTTP 429 after {attempts} attempts"),
            ),
            AttemptFailure::ServerError(status) => FetchError::new(
                FetchFailure::Network,
                format!("HTTP {status} after {attempts} attempts"),
            ),
            AttemptFailure::Network(msg) => FetchError::new(
                FetchFailure::Network,
                format!("{msg} (after {attempts} attempts)"),
            ),
            AttemptFailure::Timeout(msg) => FetchError::new(
                FetchFailure::Timeout,
                format!("{msg} (after {attempts} attempts)"),
            ),
        }
    }
}

impl std::fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptFailure::Forbidden => write!(f, "HTTP 403"),
            AttemptFailure::RateLimited => write!(f, "HTTP 429"),
            AttemptFailure::ServerError(status) => write!(f, "HTTP {status}"),
            AttemptFailure::Network(msg) => write!(f, "network error: {msg}"),
            AttemptFailure::Timeout(msg) => write!(f, "timeout: {msg}"),
        }
    }
}
