//! Error types for feedrelay.

use thiserror::Error;

use crate::fetcher::FetchError;
use crate::publish::PublishError;
use crate::transform::ProviderError;

/// Common error type for feedrelay.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Database error.
    ///
    /// Errors from sqlx are converted into this variant, except unique
    /// constraint violations on processed entries (see `DuplicateEntry`).
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Validation error for input or configuration values.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// The feed exists but is disabled.
    #[error("feed {0} is disabled")]
    Disabled(String),

    /// A run for the feed is already in flight.
    #[error("feed {0} already has a run in progress")]
    AlreadyRunning(String),

    /// The (feed, fingerprint) pair has already been recorded.
    #[error("entry {fingerprint} already recorded for feed {feed_id}")]
    DuplicateEntry {
        /// Feed ID.
        feed_id: i64,
        /// Entry fingerprint.
        fingerprint: String,
    },

    /// Feed fetch failed after all retries.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// AI provider call failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// CMS publish call failed.
    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl From<sqlx::Error> for RelayError {
    fn from(e: sqlx::Error) -> Self {
        RelayError::Database(e.to_string())
    }
}

impl RelayError {
    /// Whether this error means "the entry was already handled".
    pub fn is_duplicate(&self) -> bool {
        matches!(self, RelayError::DuplicateEntry { .. })
    }
}

/// Result type alias for feedrelay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
