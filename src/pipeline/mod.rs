//! Feed processing pipeline and its scheduler.

pub mod cancel;
pub mod locks;
pub mod orchestrator;
pub mod repository;
pub mod scheduler;
pub mod types;

pub use cancel::{cancel_pair, CancelHandle, CancelToken};
pub use locks::FeedLocks;
pub use orchestrator::Orchestrator;
pub use repository::{EntryFailureRepository, RunRepository, UsageRepository};
pub use scheduler::{start_scheduler, Scheduler};
pub use types::{
    EntryFailure, FailureStage, NewEntryFailure, NewUsageRecord, ProcessingRun, RunStatus,
    RunSummary, UsageRecord,
};
