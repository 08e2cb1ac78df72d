//! Run, usage and failure records.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Final or in-flight status of a processing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run started, not finalized yet.
    InProgress,
    /// Every new entry was handled.
    Success,
    /// Some entries failed or the run was cancelled.
    Partial,
    /// Run-level failure (fetch exhausted, storage failure).
    Error,
}

impl RunStatus {
    /// Database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::InProgress => "in_progress",
            RunStatus::Success => "success",
            RunStatus::Partial => "partial",
            RunStatus::Error => "error",
        }
    }

    /// Parse the database representation.
    pub fn from_db(s: &str) -> Self {
        match s {
            "success" => RunStatus::Success,
            "partial" => RunStatus::Partial,
            "error" => RunStatus::Error,
            _ => RunStatus::InProgress,
        }
    }
}

/// A stored processing run.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingRun {
    /// Run ID.
    pub id: i64,
    /// Feed ID.
    pub feed_id: i64,
    /// Status.
    pub status: RunStatus,
    /// Entries in the fetched document.
    pub entries_found: i64,
    /// Entries not seen before.
    pub entries_new: i64,
    /// Posts created in the CMS.
    pub posts_created: i64,
    /// Entries that failed.
    pub entries_failed: i64,
    /// Run-level error or cancellation note.
    pub error: Option<String>,
    /// Wall time in milliseconds.
    pub duration_ms: Option<i64>,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// Finalization time.
    pub finished_at: Option<DateTime<Utc>>,
}

/// Outcome of one `process` call, as finalized in storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Run ID.
    pub run_id: i64,
    /// Feed ID.
    pub feed_id: i64,
    /// Final status.
    pub status: RunStatus,
    /// Entries in the fetched document.
    pub entries_found: i64,
    /// Entries not seen before.
    pub entries_new: i64,
    /// Posts created in the CMS.
    pub posts_created: i64,
    /// Entries that failed.
    pub entries_failed: i64,
    /// Run-level error or cancellation note.
    pub error: Option<String>,
    /// Wall time in milliseconds.
    pub duration_ms: i64,
}

impl RunSummary {
    /// Empty in-progress summary.
    pub fn new(run_id: i64, feed_id: i64) -> Self {
        Self {
            run_id,
            feed_id,
            status: RunStatus::InProgress,
            entries_found: 0,
            entries_new: 0,
            posts_created: 0,
            entries_failed: 0,
            error: None,
            duration_ms: 0,
        }
    }
}

/// AI usage of one successful transform call.
#[derive(Debug, Clone, Serialize)]
pub struct UsageRecord {
    /// Record ID.
    pub id: i64,
    /// Run ID.
    pub run_id: i64,
    /// Feed ID.
    pub feed_id: i64,
    /// Provider key.
    pub provider: String,
    /// Model name.
    pub model: String,
    /// Input tokens.
    pub input_tokens: i64,
    /// Output tokens.
    pub output_tokens: i64,
    /// Estimated cost in USD.
    pub cost_usd: f64,
    /// Call duration in milliseconds.
    pub duration_ms: i64,
    /// When the record was written.
    pub created_at: DateTime<Utc>,
}

/// Usage record to insert.
#[derive(Debug, Clone)]
pub struct NewUsageRecord {
    /// Run ID.
    pub run_id: i64,
    /// Feed ID.
    pub feed_id: i64,
    /// Provider key.
    pub provider: String,
    /// Model name.
    pub model: String,
    /// Input tokens.
    pub input_tokens: i64,
    /// Output tokens.
    pub output_tokens: i64,
    /// Estimated cost in USD.
    pub cost_usd: f64,
    /// Call duration in milliseconds.
    pub duration_ms: i64,
}

/// Stage at which an entry failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    /// AI transform.
    Transform,
    /// CMS publish.
    Publish,
    /// Dedup record write.
    Record,
}

impl FailureStage {
    /// Database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::Transform => "transform",
            FailureStage::Publish => "publish",
            FailureStage::Record => "record",
        }
    }

    /// Parse the database representation.
    pub fn from_db(s: &str) -> Self {
        match s {
            "publish" => FailureStage::Publish,
            "record" => FailureStage::Record,
            _ => FailureStage::Transform,
        }
    }
}

/// A stored per-entry failure.
#[derive(Debug, Clone, Serialize)]
pub struct EntryFailure {
    /// Record ID.
    pub id: i64,
    /// Run ID.
    pub run_id: i64,
    /// Feed ID.
    pub feed_id: i64,
    /// Entry fingerprint.
    pub fingerprint: String,
    /// Entry URL.
    pub url: String,
    /// Entry title.
    pub title: String,
    /// Failing stage.
    pub stage: FailureStage,
    /// Error message.
    pub error: String,
    /// When the failure was recorded.
    pub created_at: DateTime<Utc>,
}

/// Entry failure to insert.
#[derive(Debug, Clone)]
pub struct NewEntryFailure {
    /// Run ID.
    pub run_id: i64,
    /// Feed ID.
    pub feed_id: i64,
    /// Entry fingerprint.
    pub fingerprint: String,
    /// Entry URL.
    pub url: String,
    /// Entry title.
    pub title: String,
    /// Failing stage.
    pub stage: FailureStage,
    /// Error message.
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_db_roundtrip() {
        for status in [
            RunStatus::InProgress,
            RunStatus::Success,
            RunStatus::Partial,
            RunStatus::Error,
        ] {
            assert_eq!(RunStatus::from_db(status.as_str()), status);
        }
    }

    #[test]
    fn test_run_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&RunStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
    }

    #[test]
    fn test_failure_stage_db_roundtrip() {
        for stage in [
            FailureStage::Transform,
            FailureStage::Publish,
            FailureStage::Record,
        ] {
            assert_eq!(FailureStage::from_db(stage.as_str()), stage);
        }
    }
}
