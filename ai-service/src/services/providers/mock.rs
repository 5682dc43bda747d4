//! Mock provider implementation for testing.

use super::{ProviderError, TextProvider};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// What the mock returns from `generate`.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// `Mock response for: <prompt>`
    Echo,
    Text(String),
    /// Provider answered without any text.
    Empty,
    Fail(String),
}

/// Mock text provider for testing.
pub struct MockTextProvider {
    models: Vec<String>,
    reply: MockReply,
    list_error: Option<String>,
    delay: Option<Duration>,
    generate_calls: AtomicUsize,
}

impl MockTextProvider {
    /// Echoing provider that advertises `models`.
    pub fn new<I, S>(models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            models: models.into_iter().map(Into::into).collect(),
            reply: MockReply::Echo,
            list_error: None,
            delay: None,
            generate_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_reply(mut self, reply: MockReply) -> Self {
        self.reply = reply;
        self
    }

    /// Make `list_models` fail, as when the provider is unreachable.
    pub fn unreachable(mut self, message: impl Into<String>) -> Self {
        self.list_error = Some(message.into());
        self
    }

    /// Delay every `generate` call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextProvider for MockTextProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        match &self.list_error {
            Some(message) => Err(ProviderError::NetworkError(message.clone())),
            None => Ok(self.models.clone()),
        }
    }

    async fn generate(&self, _model: &str, prompt: &str) -> Result<Option<String>, ProviderError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.reply {
            MockReply::Echo => Ok(Some(format!("Mock response for: {}", prompt))),
            MockReply::Text(text) => Ok(Some(text.clone())),
            MockReply::Empty => Ok(None),
            MockReply::Fail(message) => Err(ProviderError::ApiError(message.clone())),
        }
    }
}
