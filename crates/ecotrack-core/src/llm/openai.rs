//! OpenAI-compatible chat-completions client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;
use tracing::{debug, warn};

use super::{CompletionClient, CompletionRequest};
use crate::error::LlmError;
use crate::models::config::LlmConfig;

/// Chat-completions client with bearer auth and an explicit request timeout.
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Build from configuration. A missing key is passed through as empty;
    /// the calculator's credential check reports it.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        Self::new(
            config.base_url.clone(),
            config.api_key.clone().unwrap_or_default(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let mut body = json!({
            "model": request.model,
            "temperature": request.temperature,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user },
            ],
        });
        if request.json_response {
            body["response_format"] = json!({ "type": "json_object" });
        }

        let started = Instant::now();
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        debug!(
            "Completion from {} returned {} in {}ms",
            request.model,
            status,
            started.elapsed().as_millis()
        );

        if !status.is_success() {
            let message = provider_message(&text);
            warn!("Language model request failed ({}): {}", status, message);
            return Err(match status {
                StatusCode::UNAUTHORIZED => LlmError::Unauthorized(message),
                StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited(message),
                StatusCode::BAD_REQUEST => LlmError::BadRequest(message),
                _ => LlmError::Status {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        let value: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| LlmError::InvalidResponse(format!("response is not JSON: {}", e)))?;

        value
            .pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| LlmError::InvalidResponse("no message content in response".to_string()))
    }
}

/// Pull `error.message` out of a provider error body, falling back to the raw body.
fn provider_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                "empty response body".to_string()
            } else {
                body.trim().to_string()
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> OpenAiClient {
        OpenAiClient::new(server.uri(), "sk-test", Duration::from_secs(5)).unwrap()
    }

    fn request() -> CompletionRequest {
        CompletionRequest::json("gpt-4o", "extract", "invoice text")
    }

    #[tokio::test]
    async fn test_returns_message_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-4o",
                "response_format": { "type": "json_object" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "{\"ok\":true}" } }]
            })))
            .mount(&server)
            .await;

        let content = client(&server).complete(&request()).await.unwrap();
        assert_eq!(content, "{\"ok\":true}");
    }

    #[tokio::test]
    async fn test_maps_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": { "message": "Incorrect API key provided" }
            })))
            .mount(&server)
            .await;

        let err = client(&server).complete(&request()).await.unwrap_err();
        assert_eq!(err, LlmError::Unauthorized("Incorrect API key provided".to_string()));
    }

    #[tokio::test]
    async fn test_maps_rate_limit_and_bad_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "model": "busy-model" })))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "model": "gpt-4o" })))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "message": "maximum context length exceeded" }
            })))
            .mount(&server)
            .await;

        let client = client(&server);
        let busy = CompletionRequest::json("busy-model", "s", "u");
        assert_eq!(
            client.complete(&busy).await.unwrap_err(),
            LlmError::RateLimited("slow down".to_string())
        );
        assert_eq!(
            client.complete(&request()).await.unwrap_err(),
            LlmError::BadRequest("maximum context length exceeded".to_string())
        );
    }

    #[tokio::test]
    async fn test_missing_content_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let err = client(&server).complete(&request()).await.unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let client =
            OpenAiClient::new("http://127.0.0.1:9", "sk-test", Duration::from_secs(2)).unwrap();
        let err = client.complete(&request()).await.unwrap_err();
        assert!(matches!(err, LlmError::Network(_) | LlmError::Timeout));
    }
}
