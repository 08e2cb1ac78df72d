//! AI text transformation.
//!
//! Providers implement [`AiProvider`] and are registered in a [`Transformer`]
//! under their key. Adding a provider means adding an implementation and
//! registering it; the orchestrator only ever sees provider keys.

pub mod anthropic;
pub mod openai;
pub mod templates;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;
pub use templates::{PostStatus, Template};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::config::ProvidersConfig;
use crate::Result;

/// Keys of the providers built into the binary.
pub const BUILTIN_PROVIDERS: &[&str] = &["openai", "anthropic"];

/// Category of a provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// Missing or rejected credentials.
    Auth,
    /// Rate limit or exhausted quota.
    Quota,
    /// Transport failure, timeout or server error.
    Network,
    /// Unexpected or empty response.
    Response,
    /// No provider registered under the key.
    UnknownProvider,
}

impl ProviderErrorKind {
    /// Short snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderErrorKind::Auth => "auth",
            ProviderErrorKind::Quota => "quota",
            ProviderErrorKind::Network => "network",
            ProviderErrorKind::Response => "response",
            ProviderErrorKind::UnknownProvider => "unknown_provider",
        }
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// AI provider failure.
#[derive(Debug, Clone, Error)]
#[error("provider {provider} {kind} error: {message}")]
pub struct ProviderError {
    /// Provider key.
    pub provider: String,
    /// Failure category.
    pub kind: ProviderErrorKind,
    /// Human readable cause.
    pub message: String,
}

impl ProviderError {
    /// Create a provider error.
    pub fn new(
        provider: impl Into<String>,
        kind: ProviderErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            kind,
            message: message.into(),
        }
    }

    /// Classify a transport error from reqwest.
    pub fn from_transport(provider: &str, e: &reqwest::Error) -> Self {
        Self::new(provider, ProviderErrorKind::Network, e.to_string())
    }

    /// Classify a non-success HTTP status.
    ///
    /// `body` is the raw error payload, used for the message and to spot
    /// quota errors that are not reported as 429.
    pub fn from_status(provider: &str, status: StatusCode, body: &str) -> Self {
        let kind = match status.as_u16() {
            401 | 403 => ProviderErrorKind::Auth,
            402 | 429 => ProviderErrorKind::Quota,
            _ if body.contains("insufficient_quota") => ProviderErrorKind::Quota,
            500..=599 => ProviderErrorKind::Network,
            _ => ProviderErrorKind::Response,
        };
        let snippet: String = body.chars().take(300).collect();
        Self::new(provider, kind, format!("HTTP {status}: {snippet}"))
    }

    /// Whether the orchestrator may retry the call.
    pub fn is_retryable(&self) -> bool {
        self.kind == ProviderErrorKind::Network
    }
}

/// USD prices per million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pricing {
    /// Per million input tokens.
    pub input_per_mtok: f64,
    /// Per million output tokens.
    pub output_per_mtok: f64,
}

impl Pricing {
    /// Estimated cost of a call in USD.
    pub fn cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        (f64::from(input_tokens) * self.input_per_mtok
            + f64::from(output_tokens) * self.output_per_mtok)
            / 1_000_000.0
    }
}

/// Raw provider output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Generated text.
    pub text: String,
    /// Input token count.
    pub input_tokens: u32,
    /// Output token count.
    pub output_tokens: u32,
}

/// An AI text provider.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Registry key.
    fn name(&self) -> &str;

    /// Model used for completions.
    fn model(&self) -> &str;

    /// Pricing for cost estimation.
    fn pricing(&self) -> Pricing;

    /// Run `instruction` over `content`.
    async fn complete(
        &self,
        instruction: &str,
        content: &str,
    ) -> std::result::Result<Completion, ProviderError>;
}

/// Result of one successful transformation.
#[derive(Debug, Clone)]
pub struct TransformResult {
    /// Transformed text.
    pub text: String,
    /// Input token count.
    pub input_tokens: u32,
    /// Output token count.
    pub output_tokens: u32,
    /// Wall time of the provider call.
    pub duration: Duration,
    /// Provider key.
    pub provider: String,
    /// Model name.
    pub model: String,
    /// Estimated cost in USD.
    pub cost_usd: f64,
}

/// Provider registry keyed by provider name.
#[derive(Default, Clone)]
pub struct Transformer {
    providers: HashMap<String, Arc<dyn AiProvider>>,
}

impl Transformer {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in providers.
    pub fn from_config(config: &ProvidersConfig) -> Result<Self> {
        let mut transformer = Self::new();
        transformer.register(Arc::new(OpenAiProvider::new(&config.openai)?));
        transformer.register(Arc::new(AnthropicProvider::new(&config.anthropic)?));
        Ok(transformer)
    }

    /// Register a provider under its name, replacing any previous one.
    pub fn register(&mut self, provider: Arc<dyn AiProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_provider(mut self, provider: Arc<dyn AiProvider>) -> Self {
        self.register(provider);
        self
    }

    /// Model of the provider registered under `provider_key`.
    pub fn model_for(&self, provider_key: &str) -> Option<&str> {
        self.providers.get(provider_key).map(|p| p.model())
    }

    /// Registered provider keys, sorted.
    pub fn provider_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Transform `content` with the template's instruction.
    ///
    /// No internal retries.
    pub async fn transform(
        &self,
        content: &str,
        template: &Template,
        provider_key: &str,
    ) -> std::result::Result<TransformResult, ProviderError> {
        let provider = self.providers.get(provider_key).ok_or_else(|| {
            ProviderError::new(
                provider_key,
                ProviderErrorKind::UnknownProvider,
                format!("no provider registered under {provider_key:?}"),
            )
        })?;

        let start = Instant::now();
        let completion = provider.complete(template.instruction, content).await?;
        let duration = start.elapsed();

        debug!(
            "{} ({}) transformed {} chars in {:?}: {} in / {} out tokens",
            provider_key,
            provider.model(),
            content.len(),
            duration,
            completion.input_tokens,
            completion.output_tokens
        );

        let cost_usd = provider
            .pricing()
            .cost(completion.input_tokens, completion.output_tokens);

        Ok(TransformResult {
            text: completion.text,
            input_tokens: completion.input_tokens,
            output_tokens: completion.output_tokens,
            duration,
            provider: provider_key.to_string(),
            model: provider.model().to_string(),
            cost_usd,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoProvider;

    #[async_trait]
    impl AiProvider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        fn model(&self) -> &str {
            "echo-1"
        }

        fn pricing(&self) -> Pricing {
            Pricing {
                input_per_mtok: 1.0,
                output_per_mtok: 2.0,
            }
        }

        async fn complete(
            &self,
            instruction: &str,
            content: &str,
        ) -> std::result::Result<Completion, ProviderError> {
            Ok(Completion {
                text: format!("{instruction}|{content}"),
                input_tokens: 1000,
                output_tokens: 500,
            })
        }
    }

    fn template() -> &'static Template {
        templates::find("blog_post").unwrap()
    }

    #[tokio::test]
    async fn test_transform_uses_instruction_only() {
        let transformer = Transformer::new().with_provider(Arc::new(EchoProvider));
        let result = transformer
            .transform("body", template(), "echo")
            .await
            .unwrap();

        assert_eq!(result.text, format!("{}|body", template().instruction));
        assert_eq!(result.provider, "echo");
        assert_eq!(result.model, "echo-1");
        assert_eq!(transformer.model_for("echo"), Some("echo-1"));
        assert_eq!(result.input_tokens, 1000);
        assert_eq!(result.output_tokens, 500);
        assert!((result.cost_usd - 0.002).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_unknown_provider() {
        let transformer = Transformer::new();
        let err = transformer
            .transform("body", template(), "missing")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::UnknownProvider);
        assert_eq!(err.provider, "missing");
        assert!(!err.is_retryable());
        assert_eq!(transformer.model_for("missing"), None);
    }

    #[test]
    fn test_from_config_registers_builtins() {
        let transformer = Transformer::from_config(&ProvidersConfig::default()).unwrap();
        assert_eq!(transformer.provider_keys(), vec!["anthropic", "openai"]);
        let mut builtin = BUILTIN_PROVIDERS.to_vec();
        builtin.sort_unstable();
        assert_eq!(transformer.provider_keys(), builtin);
    }

    #[test]
    fn test_status_classification() {
        let cases = [
            (401, "", ProviderErrorKind::Auth),
            (403, "", ProviderErrorKind::Auth),
            (429, "", ProviderErrorKind::Quota),
            (402, "", ProviderErrorKind::Quota),
            (400, r#"{"error":{"code":"insufficient_quota"}}"#, ProviderErrorKind::Quota),
            (500, "", ProviderErrorKind::Network),
            (529, "overloaded", ProviderErrorKind::Network),
            (400, "bad request", ProviderErrorKind::Response),
            (404, "", ProviderErrorKind::Response),
        ];
        for (status, body, kind) in cases {
            let err = ProviderError::from_status("openai", StatusCode::from_u16(status).unwrap(), body);
            assert_eq!(err.kind, kind, "status {}", status);
        }
    }

    #[test]
    fn test_pricing_cost() {
        let pricing = Pricing {
            input_per_mtok: 3.0,
            output_per_mtok: 15.0,
        };
        assert!((pricing.cost(1_000_000, 0) - 3.0).abs() < 1e-9);
        assert!((pricing.cost(2000, 1000) - 0.021).abs() < 1e-9);
        assert_eq!(Pricing::default().cost(5000, 5000), 0.0);
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::new("anthropic", ProviderErrorKind::Auth, "missing API key");
        assert_eq!(
            err.to_string(),
            "provider anthropic auth error: missing API key"
        );
    }
}
