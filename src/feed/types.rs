//! Feed source and entry types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default processing interval in seconds (1 hour).
pub const DEFAULT_INTERVAL_SECS: i64 = 3600;

/// How a feed gets processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleMode {
    /// Only processed on explicit request.
    #[default]
    Manual,
    /// Processed by the scheduler every `interval_secs`.
    Periodic,
}

impl ScheduleMode {
    /// Database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleMode::Manual => "manual",
            ScheduleMode::Periodic => "periodic",
        }
    }

    /// Parse the database representation. Unknown values fall back to manual.
    pub fn from_db(s: &str) -> Self {
        match s {
            "periodic" => ScheduleMode::Periodic,
            _ => ScheduleMode::Manual,
        }
    }
}

/// A configured feed source.
#[derive(Debug, Clone, Serialize)]
pub struct FeedSource {
    /// Feed ID.
    pub id: i64,
    /// Unique name.
    pub name: String,
    /// Source URL.
    pub url: String,
    /// AI provider key.
    pub provider: String,
    /// Prompt template name.
    pub template: String,
    /// Schedule mode.
    pub schedule: ScheduleMode,
    /// Interval between periodic runs, in seconds.
    pub interval_secs: i64,
    /// Whether the feed is enabled.
    pub enabled: bool,
    /// When the last run reached finalization.
    pub last_processed_at: Option<DateTime<Utc>>,
    /// When the feed was created.
    pub created_at: DateTime<Utc>,
    /// When the feed was last updated.
    pub updated_at: DateTime<Utc>,
}

impl FeedSource {
    /// Check whether the scheduler should process this feed at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if !self.enabled || self.schedule != ScheduleMode::Periodic {
            return false;
        }
        match self.last_processed_at {
            None => true,
            Some(last) => now.signed_duration_since(last).num_seconds() >= self.interval_secs,
        }
    }
}

/// New feed source for creation or upsert.
#[derive(Debug, Clone)]
pub struct NewFeedSource {
    /// Unique name.
    pub name: String,
    /// Source URL.
    pub url: String,
    /// AI provider key.
    pub provider: String,
    /// Prompt template name.
    pub template: String,
    /// Schedule mode.
    pub schedule: ScheduleMode,
    /// Interval for periodic runs, in seconds.
    pub interval_secs: i64,
    /// Whether the feed is enabled.
    pub enabled: bool,
}

impl NewFeedSource {
    /// Create a manual, enabled feed using the `openai` provider and the
    /// `blog_post` template.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            provider: "openai".to_string(),
            template: "blog_post".to_string(),
            schedule: ScheduleMode::Manual,
            interval_secs: DEFAULT_INTERVAL_SECS,
            enabled: true,
        }
    }

    /// Set the provider key.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    /// Set the template name.
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    /// Make the feed periodic with the given interval.
    pub fn periodic(mut self, interval_secs: i64) -> Self {
        self.schedule = ScheduleMode::Periodic;
        self.interval_secs = interval_secs;
        self
    }

    /// Disable the feed.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl From<&crate::config::FeedDefinition> for NewFeedSource {
    fn from(def: &crate::config::FeedDefinition) -> Self {
        Self {
            name: def.name.clone(),
            url: def.url.clone(),
            provider: def.provider.clone(),
            template: def.template.clone(),
            schedule: def.schedule,
            interval_secs: def.interval_secs,
            enabled: def.enabled,
        }
    }
}

/// A canonical feed entry. Never persisted directly.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Entry title (empty if absent).
    pub title: String,
    /// Canonical link (empty if absent).
    pub link: String,
    /// Body: first non-empty of content, description, summary.
    pub content: String,
    /// Author name.
    pub author: Option<String>,
    /// Parsed publication timestamp.
    pub published: Option<DateTime<Utc>>,
    /// Publication date exactly as it appeared in the document.
    pub raw_published: Option<String>,
    /// Category terms.
    pub tags: Vec<String>,
    /// Hex SHA-256 over title, link and raw published string.
    pub fingerprint: String,
}
