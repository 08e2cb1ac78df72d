//! Feed sources and feed parsing.
//!
//! - `types`: feed source configuration and canonical entries
//! - `parser`: RSS/Atom bytes to entries, with content fingerprints
//! - `repository`: durable feed definitions

pub mod parser;
pub mod repository;
pub mod types;

pub use parser::{fingerprint, parse_entries};
pub use repository::FeedRepository;
pub use types::{Entry, FeedSource, NewFeedSource, ScheduleMode, DEFAULT_INTERVAL_SECS};
