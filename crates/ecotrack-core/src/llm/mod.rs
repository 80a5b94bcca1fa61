//! Language-model completion seam.
//!
//! Every model call in the pipeline goes through [`CompletionClient`], so
//! timeouts, retries or circuit breaking can be layered on without touching
//! the pipeline stages.

mod openai;

pub use openai::OpenAiClient;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::LlmError;

/// A single chat-completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub temperature: f32,
    /// Ask the endpoint for a JSON object response.
    pub json_response: bool,
}

impl CompletionRequest {
    /// Deterministic JSON-object request.
    pub fn json(model: impl Into<String>, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: system.into(),
            user: user.into(),
            temperature: 0.0,
            json_response: true,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// A chat-completion endpoint returning the message content as text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

/// Parse model output as a JSON object.
///
/// Tolerates a surrounding markdown code fence or leading prose, which some
/// models emit even in JSON mode.
pub fn parse_json_object(content: &str) -> Option<serde_json::Map<String, serde_json::Value>> {
    let trimmed = content.trim();
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str(trimmed) {
        return Some(map);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str(&trimmed[start..=end]) {
        Ok(serde_json::Value::Object(map)) => Some(map),
        _ => None,
    }
}
