//! Anthropic messages provider.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{AiProvider, Completion, Pricing, ProviderError, ProviderErrorKind};
use crate::config::ProviderConfig;
use crate::{RelayError, Result};

/// Default API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Default model.
pub const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";

/// API version header value.
const API_VERSION: &str = "2023-06-01";

const DEFAULT_INPUT_COST: f64 = 0.80;
const DEFAULT_OUTPUT_COST: f64 = 4.00;

const NAME: &str = "anthropic";

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

/// Provider speaking the messages wire format.
pub struct AnthropicProvider {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_output_tokens: u32,
    pricing: Pricing,
}

impl AnthropicProvider {
    /// Create a provider from its config section.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RelayError::Config(format!("failed to create HTTP client: {e}")))?;

        let base_url = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: config.model.as_deref().unwrap_or(DEFAULT_MODEL).to_string(),
            max_output_tokens: config.max_output_tokens,
            pricing: Pricing {
                input_per_mtok: config.input_cost_per_mtok.unwrap_or(DEFAULT_INPUT_COST),
                output_per_mtok: config.output_cost_per_mtok.unwrap_or(DEFAULT_OUTPUT_COST),
            },
        })
    }
}

#[async_trait]
impl AiProvider for AnthropicProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn pricing(&self) -> Pricing {
        self.pricing
    }

    async fn complete(
        &self,
        instruction: &str,
        content: &str,
    ) -> std::result::Result<Completion, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::new(
                NAME,
                ProviderErrorKind::Auth,
                "API key is not configured",
            ));
        }

        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_output_tokens,
            system: instruction,
            messages: vec![Message {
                role: "user",
                content,
            }],
        };

        let response = self
            .http
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(NAME, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(NAME, status, &body));
        }

        let body: MessagesResponse = response.json().await.map_err(|e| {
            ProviderError::new(NAME, ProviderErrorKind::Response, format!("invalid body: {e}"))
        })?;

        // Concatenate text blocks; other block types are ignored.
        let text: String = body
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text)
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string();

        if text.is_empty() {
            return Err(ProviderError::new(
                NAME,
                ProviderErrorKind::Response,
                "empty completion",
            ));
        }

        let usage = body.usage.unwrap_or_default();
        Ok(Completion {
            text,
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
        })
    }
}
