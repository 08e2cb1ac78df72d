//! Request and response DTOs for the web API.

use serde::{Deserialize, Serialize};

use crate::feed::FeedSource;
use crate::pipeline::{EntryFailure, ProcessingRun, UsageRecord};

/// Default number of runs returned by the run history endpoint.
pub const DEFAULT_RUN_LIMIT: i64 = 20;

/// Maximum number of runs returned by the run history endpoint.
pub const MAX_RUN_LIMIT: i64 = 100;

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Query for `GET /api/feeds/:id/runs`.
#[derive(Debug, Default, Deserialize)]
pub struct RunsQuery {
    /// Maximum number of runs.
    pub limit: Option<i64>,
}

impl RunsQuery {
    /// Limit clamped to `1..=MAX_RUN_LIMIT`.
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_RUN_LIMIT)
            .clamp(1, MAX_RUN_LIMIT)
    }
}

/// Feed as returned by the API.
#[derive(Debug, Serialize)]
pub struct FeedResponse {
    /// Feed ID.
    pub id: i64,
    /// Unique name.
    pub name: String,
    /// Feed URL.
    pub url: String,
    /// Provider key.
    pub provider: String,
    /// Template name.
    pub template: String,
    /// `manual` or `periodic`.
    pub schedule: &'static str,
    /// Interval for periodic feeds.
    pub interval_secs: i64,
    /// Enabled flag.
    pub enabled: bool,
    /// Last completed run (RFC 3339).
    pub last_processed_at: Option<String>,
    /// Whether a run is in progress.
    pub running: bool,
    /// Estimated AI cost across all runs, in USD.
    pub total_cost_usd: f64,
}

impl FeedResponse {
    /// Build a response from a feed and its live state.
    pub fn new(feed: FeedSource, running: bool, total_cost_usd: f64) -> Self {
        Self {
            id: feed.id,
            name: feed.name,
            url: feed.url,
            provider: feed.provider,
            template: feed.template,
            schedule: feed.schedule.as_str(),
            interval_secs: feed.interval_secs,
            enabled: feed.enabled,
            last_processed_at: feed.last_processed_at.map(|dt| dt.to_rfc3339()),
            running,
            total_cost_usd,
        }
    }
}

/// A run with its usage and failure records.
#[derive(Debug, Serialize)]
pub struct RunDetailResponse {
    /// The run.
    #[serde(flatten)]
    pub run: ProcessingRun,
    /// AI usage records.
    pub usage: Vec<UsageRecord>,
    /// Per-entry failures.
    pub failures: Vec<EntryFailure>,
    /// Total estimated cost of the run in USD.
    pub cost_usd: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_query_limit() {
        assert_eq!(RunsQuery::default().limit(), DEFAULT_RUN_LIMIT);
        assert_eq!(RunsQuery { limit: Some(0) }.limit(), 1);
        assert_eq!(RunsQuery { limit: Some(5) }.limit(), 5);
        assert_eq!(RunsQuery { limit: Some(10_000) }.limit(), MAX_RUN_LIMIT);
    }
}
