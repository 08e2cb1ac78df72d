//! Deduplication store for processed entries.
//!
//! One row per (feed, fingerprint), enforced by a UNIQUE constraint so that
//! concurrent processes cannot publish the same entry twice.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::datetime::parse_datetime;
use crate::db::DbPool;
use crate::{RelayError, Result};

/// A processed entry. Never updated, never deleted.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedEntryRecord {
    /// Record ID.
    pub id: i64,
    /// Feed ID.
    pub feed_id: i64,
    /// Entry fingerprint.
    pub fingerprint: String,
    /// Originating entry URL.
    pub url: String,
    /// Entry title.
    pub title: String,
    /// External CMS post id, if a post was created.
    pub post_id: Option<String>,
    /// When the entry was recorded.
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct ProcessedEntryRow {
    id: i64,
    feed_id: i64,
    fingerprint: String,
    url: String,
    title: String,
    post_id: Option<String>,
    processed_at: String,
}

impl From<ProcessedEntryRow> for ProcessedEntryRecord {
    fn from(row: ProcessedEntryRow) -> Self {
        ProcessedEntryRecord {
            id: row.id,
            feed_id: row.feed_id,
            fingerprint: row.fingerprint,
            url: row.url,
            title: row.title,
            post_id: row.post_id,
            processed_at: parse_datetime(&row.processed_at).unwrap_or_else(Utc::now),
        }
    }
}

/// Repository for processed entries.
pub struct ProcessedEntryRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> ProcessedEntryRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Whether `fingerprint` has not been recorded for the feed yet.
    pub async fn is_new(&self, feed_id: i64, fingerprint: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM processed_entries WHERE feed_id = $1 AND fingerprint = $2)",
        )
        .bind(feed_id)
        .bind(fingerprint)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RelayError::Database(e.to_string()))?;

        Ok(!exists)
    }

    /// Record a processed entry.
    ///
    /// Fails with [`RelayError::DuplicateEntry`] if the pair was already
    /// recorded.
    pub async fn record(
        &self,
        feed_id: i64,
        fingerprint: &str,
        url: &str,
        title: &str,
        post_id: Option<&str>,
    ) -> Result<i64> {
        sqlx::query_scalar(
            r#"
            INSERT INTO processed_entries (feed_id, fingerprint, url, title, post_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(feed_id)
        .bind(fingerprint)
        .bind(url)
        .bind(title)
        .bind(post_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                RelayError::DuplicateEntry {
                    feed_id,
                    fingerprint: fingerprint.to_string(),
                }
            }
            other => RelayError::Database(other.to_string()),
        })
    }

    /// List records of a feed, oldest first.
    pub async fn list_by_feed(&self, feed_id: i64) -> Result<Vec<ProcessedEntryRecord>> {
        let rows = sqlx::query_as::<_, ProcessedEntryRow>(
            r#"
            SELECT id, feed_id, fingerprint, url, title, post_id, processed_at
            FROM processed_entries
            WHERE feed_id = $1
            ORDER BY id
            "#,
        )
        .bind(feed_id)
        .fetch_all(self.pool)
        .await
        .map_err(|e| RelayError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(ProcessedEntryRecord::from).collect())
    }

    /// Count records of a feed.
    pub async fn count_by_feed(&self, feed_id: i64) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM processed_entries WHERE feed_id = $1")
            .bind(feed_id)
            .fetch_one(self.pool)
            .await
            .map_err(|e| RelayError::Database(e.to_string()))
    }
}
