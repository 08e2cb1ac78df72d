//! Processing of one feed: fetch, filter, transform, publish, record.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::cancel::CancelToken;
use super::locks::FeedLocks;
use super::repository::{EntryFailureRepository, RunRepository, UsageRepository};
use super::types::{FailureStage, NewEntryFailure, NewUsageRecord, RunStatus, RunSummary};
use crate::config::PipelineConfig;
use crate::db::Database;
use crate::dedup::ProcessedEntryRepository;
use crate::feed::{parse_entries, Entry, FeedRepository, FeedSource};
use crate::fetcher::{Clock, FeedFetcher, SystemClock};
use crate::publish::Publisher;
use crate::transform::{templates, ProviderError, Template, TransformResult, Transformer};
use crate::{RelayError, Result};

/// Title used when an entry has none.
const UNTITLED: &str = "Untitled";

enum EntryOutcome {
    Published,
    AlreadyRecorded,
}

/// Runs the ingest, transform and publish pipeline for a feed.
pub struct Orchestrator {
    db: Database,
    fetcher: Arc<dyn FeedFetcher>,
    transformer: Transformer,
    publisher: Arc<dyn Publisher>,
    clock: Arc<dyn Clock>,
    locks: FeedLocks,
    config: PipelineConfig,
}

impl Orchestrator {
    /// Create an orchestrator using the system clock.
    pub fn new(
        db: Database,
        fetcher: Arc<dyn FeedFetcher>,
        transformer: Transformer,
        publisher: Arc<dyn Publisher>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            db,
            fetcher,
            transformer,
            publisher,
            clock: Arc::new(SystemClock),
            locks: FeedLocks::new(),
            config,
        }
    }

    /// Use `clock` for transform retry delays.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The per-feed lock registry.
    pub fn locks(&self) -> &FeedLocks {
        &self.locks
    }

    /// Process a feed once.
    pub async fn process(&self, feed_id: i64) -> Result<RunSummary> {
        self.process_with_cancel(feed_id, &CancelToken::never())
            .await
    }

    /// Process a feed once, stopping between entries when `cancel` fires.
    ///
    /// Fails without creating a run if the feed is unknown, disabled or
    /// already being processed. Once a run exists it is always finalized;
    /// a run-level failure yields a summary with status `error`.
    pub async fn process_with_cancel(
        &self,
        feed_id: i64,
        cancel: &CancelToken,
    ) -> Result<RunSummary> {
        let feeds = FeedRepository::new(self.db.pool());
        let feed = feeds
            .get_by_id(feed_id)
            .await?
            .ok_or_else(|| RelayError::NotFound(format!("feed {feed_id}")))?;

        if !feed.enabled {
            return Err(RelayError::Disabled(feed.name));
        }

        let _guard = self
            .locks
            .try_acquire(feed_id)
            .ok_or_else(|| RelayError::AlreadyRunning(feed.name.clone()))?;

        let template = templates::find(&feed.template).ok_or_else(|| {
            RelayError::Validation(format!(
                "feed {} uses unknown template {}",
                feed.name, feed.template
            ))
        })?;

        let runs = RunRepository::new(self.db.pool());
        let run_id = runs.start(feed_id).await?;
        let started = Instant::now();
        info!(feed_id, run_id, "Processing feed {} ({})", feed.name, feed.url);

        let mut summary = RunSummary::new(run_id, feed_id);
        if let Err(e) = self
            .run_stages(&feed, template, &mut summary, cancel)
            .await
        {
            warn!(feed_id, run_id, "Run failed: {}", e);
            summary.status = RunStatus::Error;
            summary.error = Some(e.to_string());
        }
        summary.duration_ms = started.elapsed().as_millis() as i64;

        runs.finalize(&summary).await?;

        if summary.status != RunStatus::Error {
            if let Err(e) = feeds.mark_processed(feed_id, Utc::now()).await {
                error!(feed_id, "Failed to update last processed time: {}", e);
            }
        }

        info!(
            feed_id,
            run_id,
            "Run finished: {} ({} found, {} new, {} published, {} failed, {} ms)",
            summary.status.as_str(),
            summary.entries_found,
            summary.entries_new,
            summary.posts_created,
            summary.entries_failed,
            summary.duration_ms
        );

        Ok(summary)
    }

    /// Fetch through per-entry handling. Errors here are run-level.
    async fn run_stages(
        &self,
        feed: &FeedSource,
        template: &Template,
        summary: &mut RunSummary,
        cancel: &CancelToken,
    ) -> Result<()> {
        let response = self.fetcher.fetch(&feed.url).await?;

        let entries = parse_entries(&response.body);
        summary.entries_found = entries.len() as i64;

        let fresh = self.select_new(feed.id, entries).await?;
        summary.entries_new = fresh.len() as i64;
        debug!(feed_id = feed.id, "{} new entries", fresh.len());

        let failures = EntryFailureRepository::new(self.db.pool());
        let mut cancelled = false;

        for entry in &fresh {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            match self
                .process_entry(feed, template, summary.run_id, entry)
                .await
            {
                Ok(EntryOutcome::Published) => summary.posts_created += 1,
                Ok(EntryOutcome::AlreadyRecorded) => {
                    warn!(
                        feed_id = feed.id,
                        fingerprint = %entry.fingerprint,
                        "Entry was recorded by another run"
                    );
                }
                Err((stage, e)) => {
                    summary.entries_failed += 1;
                    warn!(
                        feed_id = feed.id,
                        fingerprint = %entry.fingerprint,
                        stage = stage.as_str(),
                        "Entry failed: {}",
                        e
                    );
                    let failure = NewEntryFailure {
                        run_id: summary.run_id,
                        feed_id: feed.id,
                        fingerprint: entry.fingerprint.clone(),
                        url: entry.link.clone(),
                        title: entry.title.clone(),
                        stage,
                        error: e.to_string(),
                    };
                    if let Err(e) = failures.record(&failure).await {
                        error!(feed_id = feed.id, "Failed to store entry failure: {}", e);
                    }
                }
            }
        }

        if cancelled {
            info!(feed_id = feed.id, "Run cancelled");
            summary.error = Some("cancelled".to_string());
            summary.status = RunStatus::Partial;
        } else if summary.entries_failed > 0 {
            summary.status = RunStatus::Partial;
        } else {
            summary.status = RunStatus::Success;
        }

        Ok(())
    }

    /// Drop entries already recorded or repeated within this document.
    async fn select_new(&self, feed_id: i64, entries: Vec<Entry>) -> Result<Vec<Entry>> {
        let dedup = ProcessedEntryRepository::new(self.db.pool());
        let mut seen = HashSet::new();
        let mut fresh = Vec::new();

        for entry in entries {
            if !seen.insert(entry.fingerprint.clone()) {
                continue;
            }
            if dedup.is_new(feed_id, &entry.fingerprint).await? {
                fresh.push(entry);
            }
        }

        if fresh.len() > self.config.max_entries_per_run {
            info!(
                feed_id,
                "Deferring {} entries to a later run",
                fresh.len() - self.config.max_entries_per_run
            );
            fresh.truncate(self.config.max_entries_per_run);
        }

        Ok(fresh)
    }

    async fn process_entry(
        &self,
        feed: &FeedSource,
        template: &Template,
        run_id: i64,
        entry: &Entry,
    ) -> std::result::Result<EntryOutcome, (FailureStage, RelayError)> {
        let content = if entry.content.trim().is_empty() {
            entry.title.as_str()
        } else {
            entry.content.as_str()
        };

        let result = self
            .transform_with_retry(feed, run_id, content, template)
            .await
            .map_err(|e| (FailureStage::Transform, RelayError::from(e)))?;

        let title = if entry.title.trim().is_empty() {
            UNTITLED
        } else {
            entry.title.as_str()
        };

        let post_id = self
            .publisher
            .publish(title, &result.text, template)
            .await
            .map_err(|e| (FailureStage::Publish, RelayError::from(e)))?;

        debug!(
            feed_id = feed.id,
            fingerprint = %entry.fingerprint,
            "Published as post {}",
            post_id
        );

        match ProcessedEntryRepository::new(self.db.pool())
            .record(
                feed.id,
                &entry.fingerprint,
                &entry.link,
                &entry.title,
                Some(&post_id),
            )
            .await
        {
            Ok(_) => Ok(EntryOutcome::Published),
            Err(e) if e.is_duplicate() => Ok(EntryOutcome::AlreadyRecorded),
            Err(e) => Err((FailureStage::Record, e)),
        }
    }

    /// Retry network-class provider errors with exponential backoff.
    ///
    /// Every provider call leaves a usage record, failed ones with zero
    /// tokens and cost.
    async fn transform_with_retry(
        &self,
        feed: &FeedSource,
        run_id: i64,
        content: &str,
        template: &Template,
    ) -> std::result::Result<TransformResult, ProviderError> {
        let attempts = self.config.transform_attempts.max(1);
        let mut attempt = 0;

        loop {
            let started = Instant::now();
            let outcome = self
                .transformer
                .transform(content, template, &feed.provider)
                .await;
            self.record_usage(feed, run_id, &outcome, started.elapsed())
                .await;

            match outcome {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                    let delay = Duration::from_secs(1 << attempt.min(6));
                    warn!(
                        "Transform attempt {} of {} failed: {}; retrying in {:?}",
                        attempt + 1,
                        attempts,
                        e,
                        delay
                    );
                    self.clock.sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn record_usage(
        &self,
        feed: &FeedSource,
        run_id: i64,
        outcome: &std::result::Result<TransformResult, ProviderError>,
        elapsed: Duration,
    ) {
        let usage = match outcome {
            Ok(result) => NewUsageRecord {
                run_id,
                feed_id: feed.id,
                provider: result.provider.clone(),
                model: result.model.clone(),
                input_tokens: i64::from(result.input_tokens),
                output_tokens: i64::from(result.output_tokens),
                cost_usd: result.cost_usd,
                duration_ms: result.duration.as_millis() as i64,
            },
            Err(e) => NewUsageRecord {
                run_id,
                feed_id: feed.id,
                provider: e.provider.clone(),
                model: self
                    .transformer
                    .model_for(&feed.provider)
                    .unwrap_or_default()
                    .to_string(),
                input_tokens: 0,
                output_tokens: 0,
                cost_usd: 0.0,
                duration_ms: elapsed.as_millis() as i64,
            },
        };

        if let Err(e) = UsageRepository::new(self.db.pool()).record(&usage).await {
            error!(feed_id = feed.id, "Failed to store usage record: {}", e);
        }
    }
}
