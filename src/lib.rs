//! feedrelay - RSS/Atom to CMS relay
//!
//! Fetches feeds, rewrites new entries with an AI provider and publishes
//! them as posts to a headless CMS.

pub mod config;
pub mod datetime;
pub mod db;
pub mod dedup;
pub mod error;
pub mod feed;
pub mod fetcher;
pub mod logging;
pub mod pipeline;
pub mod publish;
pub mod transform;
pub mod web;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use db::Database;
pub use error::{RelayError, Result};
pub use pipeline::{Orchestrator, RunStatus, RunSummary, Scheduler};
