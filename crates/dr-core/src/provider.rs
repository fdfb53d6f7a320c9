use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Raw response lines, in arrival order. Finite and consumed once.
pub type LineStream = Pin<Box<dyn Stream<Item = Result<String, Error>> + Send>>;

/// One streaming reasoning request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningRequest {
    /// Content of the single user message.
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Capped at one token by default so the model emits only its reasoning
    /// phase and no final answer.
    pub max_tokens: u32,
}

impl ReasoningRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: None,
            temperature: None,
            max_tokens: 1,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// A remote endpoint that streams reasoning frames.
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Model used when the request does not name one.
    fn default_model(&self) -> &str;

    /// Open a streaming request and hand back its lines. The connection lives
    /// as long as the returned stream and is released when it is dropped.
    async fn stream_lines(&self, request: ReasoningRequest) -> Result<LineStream, Error>;
}
