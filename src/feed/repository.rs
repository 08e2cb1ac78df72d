//! Feed source repository (the configuration store).

use chrono::{DateTime, Utc};

use super::types::{FeedSource, NewFeedSource, ScheduleMode};
use crate::datetime::{parse_datetime, to_db_string};
use crate::db::DbPool;
use crate::{RelayError, Result};

const FEED_COLUMNS: &str = "id, name, url, provider, template, schedule_mode, interval_secs, \
     is_enabled, last_processed_at, created_at, updated_at";

/// Row type for a feed from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct FeedRow {
    id: i64,
    name: String,
    url: String,
    provider: String,
    template: String,
    schedule_mode: String,
    interval_secs: i64,
    is_enabled: bool,
    last_processed_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl From<FeedRow> for FeedSource {
    fn from(row: FeedRow) -> Self {
        FeedSource {
            id: row.id,
            name: row.name,
            url: row.url,
            provider: row.provider,
            template: row.template,
            schedule: ScheduleMode::from_db(&row.schedule_mode),
            interval_secs: row.interval_secs,
            enabled: row.is_enabled,
            last_processed_at: row.last_processed_at.and_then(|s| parse_datetime(&s)),
            created_at: parse_datetime(&row.created_at).unwrap_or_else(Utc::now),
            updated_at: parse_datetime(&row.updated_at).unwrap_or_else(Utc::now),
        }
    }
}

/// Repository for feed sources.
pub struct FeedRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> FeedRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Create a new feed.
    pub async fn create(&self, feed: &NewFeedSource) -> Result<FeedSource> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO feeds (name, url, provider, template, schedule_mode, interval_secs, is_enabled)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&feed.name)
        .bind(&feed.url)
        .bind(&feed.provider)
        .bind(&feed.template)
        .bind(feed.schedule.as_str())
        .bind(feed.interval_secs)
        .bind(feed.enabled)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RelayError::Database(e.to_string()))?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| RelayError::NotFound(format!("feed {id}")))
    }

    /// Insert a feed or update the existing feed with the same name.
    ///
    /// `last_processed_at` and `created_at` of an existing feed are kept.
    pub async fn upsert(&self, feed: &NewFeedSource) -> Result<FeedSource> {
        sqlx::query(
            r#"
            INSERT INTO feeds (name, url, provider, template, schedule_mode, interval_secs, is_enabled)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT(name) DO UPDATE SET
                url = excluded.url,
                provider = excluded.provider,
                template = excluded.template,
                schedule_mode = excluded.schedule_mode,
                interval_secs = excluded.interval_secs,
                is_enabled = excluded.is_enabled,
                updated_at = datetime('now')
            "#,
        )
        .bind(&feed.name)
        .bind(&feed.url)
        .bind(&feed.provider)
        .bind(&feed.template)
        .bind(feed.schedule.as_str())
        .bind(feed.interval_secs)
        .bind(feed.enabled)
        .execute(self.pool)
        .await
        .map_err(|e| RelayError::Database(e.to_string()))?;

        self.get_by_name(&feed.name)
            .await?
            .ok_or_else(|| RelayError::NotFound(format!("feed {}", feed.name)))
    }

    /// Get a feed by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<FeedSource>> {
        let query = format!("SELECT {FEED_COLUMNS} FROM feeds WHERE id = $1");
        let row = sqlx::query_as::<_, FeedRow>(&query)
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| RelayError::Database(e.to_string()))?;

        Ok(row.map(FeedSource::from))
    }

    /// Get a feed by its unique name.
    pub async fn get_by_name(&self, name: &str) -> Result<Option<FeedSource>> {
        let query = format!("SELECT {FEED_COLUMNS} FROM feeds WHERE name = $1");
        let row = sqlx::query_as::<_, FeedRow>(&query)
            .bind(name)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| RelayError::Database(e.to_string()))?;

        Ok(row.map(FeedSource::from))
    }

    /// List all enabled feeds.
    pub async fn list_enabled(&self) -> Result<Vec<FeedSource>> {
        let query = format!("SELECT {FEED_COLUMNS} FROM feeds WHERE is_enabled = 1 ORDER BY id");
        let rows = sqlx::query_as::<_, FeedRow>(&query)
            .fetch_all(self.pool)
            .await
            .map_err(|e| RelayError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(FeedSource::from).collect())
    }

    /// List enabled periodic feeds whose interval has elapsed.
    ///
    /// Feeds never processed come first.
    pub async fn list_due_for_processing(&self) -> Result<Vec<FeedSource>> {
        let query = format!(
            r#"
            SELECT {FEED_COLUMNS}
            FROM feeds
            WHERE is_enabled = 1
              AND schedule_mode = 'periodic'
              AND (last_processed_at IS NULL
                   OR datetime(last_processed_at, '+' || interval_secs || ' seconds') <= datetime('now'))
            ORDER BY last_processed_at ASC NULLS FIRST
            "#
        );
        let rows = sqlx::query_as::<_, FeedRow>(&query)
            .fetch_all(self.pool)
            .await
            .map_err(|e| RelayError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(FeedSource::from).collect())
    }

    /// Record that a run of the feed reached finalization at `at`.
    pub async fn mark_processed(&self, id: i64, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE feeds SET last_processed_at = $1, updated_at = datetime('now') WHERE id = $2",
        )
        .bind(to_db_string(&at))
        .bind(id)
        .execute(self.pool)
        .await
        .map_err(|e| RelayError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// Enable or disable a feed.
    pub async fn set_enabled(&self, id: i64, enabled: bool) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE feeds SET is_enabled = $1, updated_at = datetime('now') WHERE id = $2",
        )
        .bind(enabled)
        .bind(id)
        .execute(self.pool)
        .await
        .map_err(|e| RelayError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}
