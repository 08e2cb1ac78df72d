//! Background scheduler for periodic feeds.
//!
//! Every check interval the scheduler lists the feeds whose interval has
//! elapsed and processes them as independent tasks, at most
//! `max_concurrent_feeds` at a time.

use std::sync::Arc;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::cancel::CancelToken;
use super::orchestrator::Orchestrator;
use super::types::RunSummary;
use crate::config::SchedulerConfig;
use crate::db::Database;
use crate::feed::FeedRepository;
use crate::{RelayError, Result};

/// Periodic feed scheduler.
pub struct Scheduler {
    db: Database,
    orchestrator: Arc<Orchestrator>,
    check_interval: Duration,
    max_concurrent: usize,
}

impl Scheduler {
    /// Create a scheduler from the `[scheduler]` config section.
    pub fn new(db: Database, orchestrator: Arc<Orchestrator>, config: &SchedulerConfig) -> Self {
        Self {
            db,
            orchestrator,
            check_interval: Duration::from_secs(config.check_interval_secs.max(1)),
            max_concurrent: config.max_concurrent_feeds.max(1),
        }
    }

    /// Run the scheduler loop until `shutdown` fires.
    ///
    /// The first check happens immediately.
    pub async fn run(&self, shutdown: CancelToken) {
        info!(
            "Scheduler started (check interval: {} seconds, max concurrent feeds: {})",
            self.check_interval.as_secs(),
            self.max_concurrent
        );

        let mut timer = interval(self.check_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    self.process_due_feeds(&shutdown).await;
                }
                _ = shutdown.cancelled() => {
                    info!("Scheduler stopped");
                    break;
                }
            }
        }
    }

    /// Process every feed that is due. Returns the number of runs started.
    pub async fn process_due_feeds(&self, shutdown: &CancelToken) -> usize {
        debug!("Checking for feeds due for processing");

        let feeds = match FeedRepository::new(self.db.pool())
            .list_due_for_processing()
            .await
        {
            Ok(feeds) => feeds,
            Err(e) => {
                error!("Failed to list feeds due for processing: {}", e);
                return 0;
            }
        };

        if feeds.is_empty() {
            debug!("No feeds due for processing");
            return 0;
        }

        info!("Processing {} due feed(s)", feeds.len());

        let mut started = 0;
        for batch in feeds.chunks(self.max_concurrent) {
            if shutdown.is_cancelled() {
                break;
            }

            let handles: Vec<(i64, JoinHandle<Result<RunSummary>>)> = batch
                .iter()
                .map(|feed| {
                    let orchestrator = Arc::clone(&self.orchestrator);
                    let token = shutdown.clone();
                    let feed_id = feed.id;
                    let handle = tokio::spawn(async move {
                        orchestrator.process_with_cancel(feed_id, &token).await
                    });
                    (feed_id, handle)
                })
                .collect();

            let (ids, handles): (Vec<i64>, Vec<_>) = handles.into_iter().unzip();
            for (feed_id, joined) in ids.into_iter().zip(join_all(handles).await) {
                match joined {
                    Ok(Ok(_)) => started += 1,
                    Ok(Err(RelayError::AlreadyRunning(name))) => {
                        debug!("Feed {} is already being processed", name);
                    }
                    Ok(Err(e)) => {
                        warn!(feed_id, "Scheduled run failed: {}", e);
                    }
                    Err(e) => {
                        error!(feed_id, "Scheduled run task panicked: {}", e);
                    }
                }
            }
        }

        started
    }
}

/// Spawn the scheduler as a background task.
pub fn start_scheduler(
    db: Database,
    orchestrator: Arc<Orchestrator>,
    config: &SchedulerConfig,
    shutdown: CancelToken,
) -> JoinHandle<()> {
    let scheduler = Scheduler::new(db, orchestrator, config);
    tokio::spawn(async move {
        scheduler.run(shutdown).await;
    })
}
