//! HTTP client for the target CMS.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::document::{to_document, Node};
use super::{PublishError, PublishErrorKind, Publisher};
use crate::config::CmsConfig;
use crate::transform::{PostStatus, Template};
use crate::{RelayError, Result};

#[derive(Serialize)]
struct CreatePost<'a> {
    title: &'a str,
    content: Node,
    tags: &'a [&'a str],
    status: PostStatus,
}

/// Publisher creating posts via `POST {base_url}/posts`.
pub struct CmsPublisher {
    http: Client,
    base_url: String,
    api_token: String,
}

impl CmsPublisher {
    /// Create a publisher from the `[cms]` config section.
    pub fn new(config: &CmsConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RelayError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        })
    }
}

#[async_trait]
impl Publisher for CmsPublisher {
    async fn publish(
        &self,
        title: &str,
        content: &str,
        template: &Template,
    ) -> std::result::Result<String, PublishError> {
        if self.base_url.is_empty() {
            return Err(PublishError::new(
                PublishErrorKind::Validation,
                "CMS base URL is not configured",
            ));
        }
        if self.api_token.is_empty() {
            return Err(PublishError::new(
                PublishErrorKind::Auth,
                "CMS API token is not configured",
            ));
        }
        if title.trim().is_empty() {
            return Err(PublishError::new(
                PublishErrorKind::Validation,
                "post title is empty",
            ));
        }

        let body = CreatePost {
            title,
            content: to_document(content),
            tags: template.tags,
            status: template.status,
        };

        let response = self
            .http
            .post(format!("{}/posts", self.base_url))
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| PublishError::new(PublishErrorKind::Network, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &text));
        }

        let value: Value = response.json().await.map_err(|e| {
            PublishError::new(PublishErrorKind::Response, format!("invalid body: {e}"))
        })?;

        let id = match value.get("id") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Err(PublishError::new(
                    PublishErrorKind::Response,
                    "response has no post id",
                ))
            }
        };

        debug!("Created CMS post {} ({})", id, title);
        Ok(id)
    }
}

fn classify_status(status: StatusCode, body: &str) -> PublishError {
    let kind = match status.as_u16() {
        401 | 403 => PublishErrorKind::Auth,
        400 | 409 | 422 => PublishErrorKind::Validation,
        500..=599 => PublishErrorKind::Network,
        _ => PublishErrorKind::Response,
    };
    let snippet: String = body.chars().take(300).collect();
    PublishError::new(kind, format!("HTTP {status}: {snippet}"))
}
