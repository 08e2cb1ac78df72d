//! Repositories for run history, AI usage and entry failures.

use chrono::Utc;

use super::types::{
    EntryFailure, FailureStage, NewEntryFailure, NewUsageRecord, ProcessingRun, RunStatus,
    RunSummary, UsageRecord,
};
use crate::datetime::parse_datetime;
use crate::db::DbPool;
use crate::{RelayError, Result};

/// Row type for a processing run.
#[derive(Debug, Clone, sqlx::FromRow)]
struct RunRow {
    id: i64,
    feed_id: i64,
    status: String,
    entries_found: i64,
    entries_new: i64,
    posts_created: i64,
    entries_failed: i64,
    error: Option<String>,
    duration_ms: Option<i64>,
    started_at: String,
    finished_at: Option<String>,
}

impl From<RunRow> for ProcessingRun {
    fn from(row: RunRow) -> Self {
        ProcessingRun {
            id: row.id,
            feed_id: row.feed_id,
            status: RunStatus::from_db(&row.status),
            entries_found: row.entries_found,
            entries_new: row.entries_new,
            posts_created: row.posts_created,
            entries_failed: row.entries_failed,
            error: row.error,
            duration_ms: row.duration_ms,
            started_at: parse_datetime(&row.started_at).unwrap_or_else(Utc::now),
            finished_at: row.finished_at.and_then(|s| parse_datetime(&s)),
        }
    }
}

/// Repository for processing runs.
pub struct RunRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> RunRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Insert an in-progress run and return its id.
    pub async fn start(&self, feed_id: i64) -> Result<i64> {
        sqlx::query_scalar(
            "INSERT INTO processing_runs (feed_id, status) VALUES ($1, 'in_progress') RETURNING id",
        )
        .bind(feed_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RelayError::Database(e.to_string()))
    }

    /// Write the final counters and status of a run.
    pub async fn finalize(&self, summary: &RunSummary) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE processing_runs
            SET status = $1, entries_found = $2, entries_new = $3, posts_created = $4,
                entries_failed = $5, error = $6, duration_ms = $7, finished_at = datetime('now')
            WHERE id = $8
            "#,
        )
        .bind(summary.status.as_str())
        .bind(summary.entries_found)
        .bind(summary.entries_new)
        .bind(summary.posts_created)
        .bind(summary.entries_failed)
        .bind(&summary.error)
        .bind(summary.duration_ms)
        .bind(summary.run_id)
        .execute(self.pool)
        .await
        .map_err(|e| RelayError::Database(e.to_string()))?;

        Ok(())
    }

    /// Get a run by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<ProcessingRun>> {
        let row = sqlx::query_as::<_, RunRow>(
            r#"
            SELECT id, feed_id, status, entries_found, entries_new, posts_created,
                   entries_failed, error, duration_ms, started_at, finished_at
            FROM processing_runs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RelayError::Database(e.to_string()))?;

        Ok(row.map(ProcessingRun::from))
    }

    /// List the most recent runs of a feed, newest first.
    pub async fn list_by_feed(&self, feed_id: i64, limit: i64) -> Result<Vec<ProcessingRun>> {
        let rows = sqlx::query_as::<_, RunRow>(
            r#"
            SELECT id, feed_id, status, entries_found, entries_new, posts_created,
                   entries_failed, error, duration_ms, started_at, finished_at
            FROM processing_runs
            WHERE feed_id = $1
            ORDER BY id DESC
            LIMIT $2
            "#,
        )
        .bind(feed_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await
        .map_err(|e| RelayError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(ProcessingRun::from).collect())
    }
}

/// Row type for a usage record.
#[derive(Debug, Clone, sqlx::FromRow)]
struct UsageRow {
    id: i64,
    run_id: i64,
    feed_id: i64,
    provider: String,
    model: String,
    input_tokens: i64,
    output_tokens: i64,
    cost_usd: f64,
    duration_ms: i64,
    created_at: String,
}

impl From<UsageRow> for UsageRecord {
    fn from(row: UsageRow) -> Self {
        UsageRecord {
            id: row.id,
            run_id: row.run_id,
            feed_id: row.feed_id,
            provider: row.provider,
            model: row.model,
            input_tokens: row.input_tokens,
            output_tokens: row.output_tokens,
            cost_usd: row.cost_usd,
            duration_ms: row.duration_ms,
            created_at: parse_datetime(&row.created_at).unwrap_or_else(Utc::now),
        }
    }
}

/// Repository for AI usage records. Append-only.
pub struct UsageRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> UsageRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Insert a usage record.
    pub async fn record(&self, usage: &NewUsageRecord) -> Result<i64> {
        sqlx::query_scalar(
            r#"
            INSERT INTO usage_records
                (run_id, feed_id, provider, model, input_tokens, output_tokens, cost_usd, duration_ms)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(usage.run_id)
        .bind(usage.feed_id)
        .bind(&usage.provider)
        .bind(&usage.model)
        .bind(usage.input_tokens)
        .bind(usage.output_tokens)
        .bind(usage.cost_usd)
        .bind(usage.duration_ms)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RelayError::Database(e.to_string()))
    }

    /// List usage records of a run.
    pub async fn list_by_run(&self, run_id: i64) -> Result<Vec<UsageRecord>> {
        let rows = sqlx::query_as::<_, UsageRow>(
            r#"
            SELECT id, run_id, feed_id, provider, model, input_tokens, output_tokens,
                   cost_usd, duration_ms, created_at
            FROM usage_records
            WHERE run_id = $1
            ORDER BY id
            "#,
        )
        .bind(run_id)
        .fetch_all(self.pool)
        .await
        .map_err(|e| RelayError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(UsageRecord::from).collect())
    }

    /// Total estimated cost of a feed, in USD.
    pub async fn total_cost_by_feed(&self, feed_id: i64) -> Result<f64> {
        sqlx::query_scalar("SELECT COALESCE(SUM(cost_usd), 0.0) FROM usage_records WHERE feed_id = $1")
            .bind(feed_id)
            .fetch_one(self.pool)
            .await
            .map_err(|e| RelayError::Database(e.to_string()))
    }
}

/// Row type for an entry failure.
#[derive(Debug, Clone, sqlx::FromRow)]
struct EntryFailureRow {
    id: i64,
    run_id: i64,
    feed_id: i64,
    fingerprint: String,
    url: String,
    title: String,
    stage: String,
    error: String,
    created_at: String,
}

impl From<EntryFailureRow> for EntryFailure {
    fn from(row: EntryFailureRow) -> Self {
        EntryFailure {
            id: row.id,
            run_id: row.run_id,
            feed_id: row.feed_id,
            fingerprint: row.fingerprint,
            url: row.url,
            title: row.title,
            stage: FailureStage::from_db(&row.stage),
            error: row.error,
            created_at: parse_datetime(&row.created_at).unwrap_or_else(Utc::now),
        }
    }
}

/// Repository for per-entry failures. Append-only.
pub struct EntryFailureRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> EntryFailureRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Insert a failure.
    pub async fn record(&self, failure: &NewEntryFailure) -> Result<i64> {
        sqlx::query_scalar(
            r#"
            INSERT INTO entry_failures (run_id, feed_id, fingerprint, url, title, stage, error)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(failure.run_id)
        .bind(failure.feed_id)
        .bind(&failure.fingerprint)
        .bind(&failure.url)
        .bind(&failure.title)
        .bind(failure.stage.as_str())
        .bind(&failure.error)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RelayError::Database(e.to_string()))
    }

    /// List failures of a run.
    pub async fn list_by_run(&self, run_id: i64) -> Result<Vec<EntryFailure>> {
        let rows = sqlx::query_as::<_, EntryFailureRow>(
            r#"
            SELECT id, run_id, feed_id, fingerprint, url, title, stage, error, created_at
            FROM entry_failures
            WHERE run_id = $1
            ORDER BY id
            "#,
        )
        .bind(run_id)
        .fetch_all(self.pool)
        .await
        .map_err(|e| RelayError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(EntryFailure::from).collect())
    }
}
