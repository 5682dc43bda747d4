//! Single-prompt gateway in front of the text provider.
//!
//! Every call checks the requested model against the provider's catalog,
//! submits the prompt, and classifies anything other than non-empty text as a
//! [`GatewayError`]. The whole call runs under one deadline; dropping the
//! returned future cancels the in-flight provider request.

use super::metrics;
use super::providers::{ProviderError, TextProvider};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Why a gateway call produced no answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorKind {
    ModelUnavailable,
    EmptyResponse,
    Provider,
    Timeout,
}

impl GatewayErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayErrorKind::ModelUnavailable => "model_unavailable",
            GatewayErrorKind::EmptyResponse => "empty_response",
            GatewayErrorKind::Provider => "provider_error",
            GatewayErrorKind::Timeout => "timeout",
        }
    }
}

/// Tagged failure carrying the diagnostic text shown to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    pub message: String,
}

impl GatewayError {
    fn new(kind: GatewayErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for GatewayError {}

#[derive(Clone)]
pub struct AiGateway {
    provider: Arc<dyn TextProvider>,
    timeout: Duration,
}

impl AiGateway {
    pub fn new(provider: Arc<dyn TextProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Models the provider currently offers, bounded by the gateway deadline.
    pub async fn available_models(&self) -> Result<Vec<String>, ProviderError> {
        let call = self.timed("list_models", self.provider.list_models());
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::NetworkError(format!(
                "{} did not respond within {}s",
                self.provider.name(),
                self.timeout.as_secs()
            ))),
        }
    }

    /// Generate a response for `prompt` with `model`.
    pub async fn generate(&self, prompt: &str, model: &str) -> Result<String, GatewayError> {
        match tokio::time::timeout(self.timeout, self.generate_inner(prompt, model)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let message = format!(
                    "AI generation error: provider did not respond within {}s",
                    self.timeout.as_secs()
                );
                tracing::error!(
                    model = %model,
                    timeout_secs = self.timeout.as_secs(),
                    "AI generation timed out"
                );
                metrics::record_provider_error(self.provider.name(), "timeout");
                Err(GatewayError::new(GatewayErrorKind::Timeout, message))
            }
        }
    }

    async fn generate_inner(&self, prompt: &str, model: &str) -> Result<String, GatewayError> {
        let provider = self.provider.name();

        let models = self
            .timed("list_models", self.provider.list_models())
            .await
            .map_err(|e| self.provider_failure(e))?;

        if !models.iter().any(|m| m == model) {
            let message = format!("Model '{}' is not available for your account.", model);
            tracing::error!(model = %model, provider, "{}", message);
            return Err(GatewayError::new(GatewayErrorKind::ModelUnavailable, message));
        }

        let text = self
            .timed("generate", self.provider.generate(model, prompt))
            .await
            .map_err(|e| self.provider_failure(e))?;

        match text {
            Some(text) if !text.is_empty() => Ok(text),
            _ => {
                tracing::warn!(model = %model, provider, "Provider returned an empty response");
                Err(GatewayError::new(
                    GatewayErrorKind::EmptyResponse,
                    "AI did not generate any response.",
                ))
            }
        }
    }

    fn provider_failure(&self, error: ProviderError) -> GatewayError {
        tracing::error!(
            provider = self.provider.name(),
            error = ?error,
            "AI generation failed: {}",
            error
        );
        metrics::record_provider_error(self.provider.name(), error.kind());
        GatewayError::new(
            GatewayErrorKind::Provider,
            format!("AI generation error: {}", error),
        )
    }

    /// Await a provider call, recording its latency.
    async fn timed<T, F>(&self, operation: &'static str, call: F) -> T
    where
        F: Future<Output = T>,
    {
        let start = Instant::now();
        let result = call.await;
        metrics::record_provider_latency(
            self.provider.name(),
            operation,
            start.elapsed().as_secs_f64(),
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::mock::{MockReply, MockTextProvider};

    fn gateway(provider: MockTextProvider) -> (AiGateway, Arc<MockTextProvider>) {
        let provider = Arc::new(provider);
        (
            AiGateway::new(provider.clone(), Duration::from_secs(5)),
            provider,
        )
    }

    #[tokio::test]
    async fn returns_provider_text() {
        let (gw, _) = gateway(MockTextProvider::new(["gemini-1.5-flash"]));
        assert_eq!(
            gw.generate("hi", "gemini-1.5-flash").await.unwrap(),
            "Mock response for: hi"
        );
    }

    #[tokio::test]
    async fn unknown_model_is_rejected_before_generation() {
        let (gw, provider) = gateway(MockTextProvider::new(["gemini-2.0-flash"]));

        let err = gw.generate("hi", "gemini-1.5-flash").await.unwrap_err();
        assert_eq!(err.kind, GatewayErrorKind::ModelUnavailable);
        assert_eq!(
            err.message,
            "Model 'gemini-1.5-flash' is not available for your account."
        );
        assert_eq!(provider.generate_calls(), 0);
    }

    #[tokio::test]
    async fn empty_text_becomes_placeholder() {
        let (gw, _) =
            gateway(MockTextProvider::new(["m"]).with_reply(MockReply::Text(String::new())));
        let err = gw.generate("hi", "m").await.unwrap_err();
        assert_eq!(err.kind, GatewayErrorKind::EmptyResponse);
        assert_eq!(err.message, "AI did not generate any response.");

        let (gw, _) = gateway(MockTextProvider::new(["m"]).with_reply(MockReply::Empty));
        assert_eq!(
            gw.generate("hi", "m").await.unwrap_err().kind,
            GatewayErrorKind::EmptyResponse
        );
    }

    #[tokio::test]
    async fn provider_failures_are_described() {
        let (gw, _) = gateway(
            MockTextProvider::new(["m"]).with_reply(MockReply::Fail("quota exceeded".into())),
        );
        let err = gw.generate("hi", "m").await.unwrap_err();
        assert_eq!(err.kind, GatewayErrorKind::Provider);
        assert!(err.message.starts_with("AI generation error:"));
        assert!(err.message.contains("quota exceeded"));
    }

    #[tokio::test]
    async fn catalog_failure_is_a_provider_error() {
        let (gw, _) = gateway(MockTextProvider::new(["m"]).unreachable("connection refused"));
        let err = gw.generate("hi", "m").await.unwrap_err();
        assert_eq!(err.kind, GatewayErrorKind::Provider);
        assert!(err.message.contains("connection refused"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_hits_the_deadline() {
        let provider = Arc::new(MockTextProvider::new(["m"]).with_delay(Duration::from_secs(30)));
        let gw = AiGateway::new(provider, Duration::from_secs(2));

        let err = gw.generate("hi", "m").await.unwrap_err();
        assert_eq!(err.kind, GatewayErrorKind::Timeout);
    }

    #[tokio::test]
    async fn available_models_passes_catalog_through() {
        let (gw, _) = gateway(MockTextProvider::new(["a", "b"]));
        assert_eq!(gw.available_models().await.unwrap(), vec!["a", "b"]);

        let (gw, _) = gateway(MockTextProvider::new(["a"]).unreachable("down"));
        assert!(gw.available_models().await.is_err());
    }
}
