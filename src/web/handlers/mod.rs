//! API handlers.

pub mod feeds;
pub mod proxy;

pub use feeds::*;
pub use proxy::*;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use crate::config::LegacyConfig;
use crate::db::Database;
use crate::pipeline::Orchestrator;
use crate::{RelayError, Result};

/// Upstream timeout of the legacy passthrough.
const PROXY_TIMEOUT_SECS: u64 = 30;

/// Application state shared across handlers.
pub struct AppState {
    /// Database.
    pub db: Database,
    /// Pipeline orchestrator.
    pub orchestrator: Arc<Orchestrator>,
    /// Client used by `/proxy`.
    pub proxy_client: Client,
    /// Upstream URL of `/proxy`.
    pub proxy_url: String,
}

impl AppState {
    /// Create a new application state.
    pub fn new(
        db: Database,
        orchestrator: Arc<Orchestrator>,
        legacy: &LegacyConfig,
    ) -> Result<Self> {
        let proxy_client = Client::builder()
            .user_agent(legacy.user_agent.as_str())
            .timeout(Duration::from_secs(PROXY_TIMEOUT_SECS))
            .build()
            .map_err(|e| RelayError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            db,
            orchestrator,
            proxy_client,
            proxy_url: legacy.proxy_url.clone(),
        })
    }
}
