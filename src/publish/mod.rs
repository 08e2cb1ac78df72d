//! Publishing transformed entries to the target CMS.

pub mod cms;
pub mod document;

pub use cms::CmsPublisher;
pub use document::{to_document, Node};

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::transform::Template;

/// Category of a publish failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishErrorKind {
    /// Missing or rejected credentials.
    Auth,
    /// The CMS rejected the post.
    Validation,
    /// Transport failure, timeout or server error.
    Network,
    /// Unexpected response.
    Response,
}

impl fmt::Display for PublishErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PublishErrorKind::Auth => "auth",
            PublishErrorKind::Validation => "validation",
            PublishErrorKind::Network => "network",
            PublishErrorKind::Response => "response",
        };
        f.write_str(s)
    }
}

/// CMS publish failure.
#[derive(Debug, Clone, Error)]
#[error("publish {kind} error: {message}")]
pub struct PublishError {
    /// Failure category.
    pub kind: PublishErrorKind,
    /// Human readable cause.
    pub message: String,
}

impl PublishError {
    /// Create a publish error.
    pub fn new(kind: PublishErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Creates posts in a CMS.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Create a post and return its external id.
    ///
    /// Tags and status come from `template`.
    async fn publish(
        &self,
        title: &str,
        content: &str,
        template: &Template,
    ) -> Result<String, PublishError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_error_display() {
        let err = PublishError::new(PublishErrorKind::Validation, "title is required");
        assert_eq!(err.to_string(), "publish validation error: title is required");
    }
}
