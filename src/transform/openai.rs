//! OpenAI-compatible chat completions provider.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{AiProvider, Completion, Pricing, ProviderError, ProviderErrorKind};
use crate::config::ProviderConfig;
use crate::{RelayError, Result};

/// Default API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default USD per million input tokens.
const DEFAULT_INPUT_COST: f64 = 0.15;

/// Default USD per million output tokens.
const DEFAULT_OUTPUT_COST: f64 = 0.60;

const NAME: &str = "openai";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

/// Provider speaking the chat completions wire format.
pub struct OpenAiProvider {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_output_tokens: u32,
    pricing: Pricing,
}

impl OpenAiProvider {
    /// Create a provider from its config section.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RelayError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_output_tokens: config.max_output_tokens,
            pricing: Pricing {
                input_per_mtok: config.input_cost_per_mtok.unwrap_or(DEFAULT_INPUT_COST),
                output_per_mtok: config.output_cost_per_mtok.unwrap_or(DEFAULT_OUTPUT_COST),
            },
        })
    }
}

#[async_trait]
impl AiProvider for OpenAiProvider {
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

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: instruction,
                },
                ChatMessage {
                    role: "user",
                    content,
                },
            ],
            max_tokens: self.max_output_tokens,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(NAME, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(NAME, status, &body));
        }

        let body: ChatResponse = response.json().await.map_err(|e| {
            ProviderError::new(NAME, ProviderErrorKind::Response, format!("invalid body: {e}"))
        })?;

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ProviderError::new(NAME, ProviderErrorKind::Response, "empty completion")
            })?;

        let usage = body.usage.unwrap_or(Usage {
            prompt_tokens: 0,
            completion_tokens: 0,
        });

        Ok(Completion {
            text,
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_server;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    fn provider(base_url: &str, api_key: &str) -> OpenAiProvider {
        OpenAiProvider::new(&ProviderConfig {
            api_key: api_key.to_string(),
            base_url: Some(base_url.to_string()),
            max_output_tokens: 256,
            timeout_secs: 5,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let p = OpenAiProvider::new(&ProviderConfig::default()).unwrap();
        assert_eq!(p.name(), "openai");
        assert_eq!(p.model(), DEFAULT_MODEL);
        assert_eq!(p.base_url, DEFAULT_BASE_URL);
        assert_eq!(p.pricing().input_per_mtok, DEFAULT_INPUT_COST);
    }

    #[tokio::test]
    async fn test_missing_key_is_auth_error() {
        let p = provider("http://127.0.0.1:9", "");
        let err = p.complete("i", "c").await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Auth);
    }

    #[tokio::test]
    async fn test_complete_success() {
        let router = Router::new().route(
            "/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers["authorization"], "Bearer sk-test");
                assert_eq!(body["model"], DEFAULT_MODEL);
                assert_eq!(body["max_tokens"], 256);
                assert_eq!(body["messages"][0]["role"], "system");
                assert_eq!(body["messages"][0]["content"], "instruction");
                assert_eq!(body["messages"][1]["content"], "content");
                Json(json!({
                    "choices": [{"message": {"role": "assistant", "content": "  rewritten  "}}],
                    "usage": {"prompt_tokens": 12, "completion_tokens": 34}
                }))
            }),
        );
        let base = spawn_server(router).await;

        let completion = provider(&base, "sk-test")
            .complete("instruction", "content")
            .await
            .unwrap();
        assert_eq!(completion.text, "rewritten");
        assert_eq!(completion.input_tokens, 12);
        assert_eq!(completion.output_tokens, 34);
    }

    #[tokio::test]
    async fn test_quota_error() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async {
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({"error": {"code": "insufficient_quota"}})),
                )
            }),
        );
        let base = spawn_server(router).await;

        let err = provider(&base, "sk-test")
            .complete("i", "c")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Quota);
        assert!(err.message.contains("insufficient_quota"));
    }

    #[tokio::test]
    async fn test_empty_choices_is_response_error() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async { Json(json!({"choices": []})) }),
        );
        let base = spawn_server(router).await;

        let err = provider(&base, "sk-test")
            .complete("i", "c")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Response);
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = provider(&format!("http://{addr}"), "sk-test")
            .complete("i", "c")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Network);
        assert!(err.is_retryable());
    }
}
