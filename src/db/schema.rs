//! Database schema and migrations for feedrelay.
//!
//! Migrations are applied sequentially when the database is first opened or
//! upgraded.

/// Database migrations.
///
/// Each migration is a SQL script executed in order. The schema_version
/// table tracks which migrations have been applied.
pub const MIGRATIONS: &[&str] = &[
    // v1: Feed sources
    r#"
CREATE TABLE feeds (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    name                TEXT NOT NULL UNIQUE,
    url                 TEXT NOT NULL,
    provider            TEXT NOT NULL DEFAULT 'openai',
    template            TEXT NOT NULL DEFAULT 'blog_post',
    schedule_mode       TEXT NOT NULL DEFAULT 'manual',   -- 'manual' or 'periodic'
    interval_secs       INTEGER NOT NULL DEFAULT 3600,
    is_enabled          INTEGER NOT NULL DEFAULT 1,
    last_processed_at   TEXT,
    created_at          TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at          TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_feeds_enabled ON feeds(is_enabled);
"#,
    // v2: Processed entries, one row per (feed, fingerprint)
    r#"
CREATE TABLE processed_entries (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    feed_id         INTEGER NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
    fingerprint     TEXT NOT NULL,
    url             TEXT NOT NULL,
    title           TEXT NOT NULL,
    post_id         TEXT,                              -- external CMS post id
    processed_at    TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(feed_id, fingerprint)
);

CREATE INDEX idx_processed_entries_feed_id ON processed_entries(feed_id);
"#,
    // v3: Processing runs and AI usage
    r#"
CREATE TABLE processing_runs (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    feed_id         INTEGER NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
    status          TEXT NOT NULL DEFAULT 'in_progress', -- 'in_progress', 'success', 'partial', 'error'
    entries_found   INTEGER NOT NULL DEFAULT 0,
    entries_new     INTEGER NOT NULL DEFAULT 0,
    posts_created   INTEGER NOT NULL DEFAULT 0,
    entries_failed  INTEGER NOT NULL DEFAULT 0,
    error           TEXT,
    duration_ms     INTEGER,
    started_at      TEXT NOT NULL DEFAULT (datetime('now')),
    finished_at     TEXT
);

CREATE INDEX idx_processing_runs_feed_id ON processing_runs(feed_id);

CREATE TABLE usage_records (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id          INTEGER NOT NULL REFERENCES processing_runs(id) ON DELETE CASCADE,
    feed_id         INTEGER NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
    provider        TEXT NOT NULL,
    model           TEXT NOT NULL,
    input_tokens    INTEGER NOT NULL DEFAULT 0,
    output_tokens   INTEGER NOT NULL DEFAULT 0,
    cost_usd        REAL NOT NULL DEFAULT 0,
    duration_ms     INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_usage_records_run_id ON usage_records(run_id);
"#,
    // v4: Per-entry failures
    r#"
CREATE TABLE entry_failures (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id          INTEGER NOT NULL REFERENCES processing_runs(id) ON DELETE CASCADE,
    feed_id         INTEGER NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
    fingerprint     TEXT NOT NULL,
    url             TEXT NOT NULL,
    title           TEXT NOT NULL,
    stage           TEXT NOT NULL,                     -- 'transform', 'publish', 'record'
    error           TEXT NOT NULL,
    created_at      TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_entry_failures_run_id ON entry_failures(run_id);
"#,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_not_empty() {
        assert!(!MIGRATIONS.is_empty());
    }

    #[test]
    fn test_first_migration_contains_feeds_table() {
        let first = MIGRATIONS[0];
        assert!(first.contains("CREATE TABLE feeds"));
        assert!(first.contains("name                TEXT NOT NULL UNIQUE"));
    }

    #[test]
    fn test_processed_entries_unique_per_feed() {
        assert!(MIGRATIONS[1].contains("UNIQUE(feed_id, fingerprint)"));
    }
}
