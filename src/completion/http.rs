//! HTTP completion service (OpenAI-compatible chat completions)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{CompletionError, CompletionRequest, CompletionService};

/// Completion service reached over an OpenAI-compatible HTTP API
pub struct HttpCompletionService {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpCompletionService {
    /// Create a client against the given API base URL
    #[must_use]
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl CompletionService for HttpCompletionService {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let body = ChatCompletionRequest {
            model: request.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system_prompt.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.user_text.clone(),
                },
            ],
            max_tokens: Some(request.max_tokens),
            temperature: Some(request.temperature),
        };

        let mut http_request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .timeout(request.timeout)
            .json(&body);
        if let Some(key) = &self.api_key {
            http_request = http_request.header("Authorization", format!("Bearer {key}"));
        }

        let response = http_request.send().await.map_err(|e| {
            if e.is_timeout() {
                CompletionError::Timeout
            } else {
                CompletionError::Service(format!("request failed: {e}"))
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Service(format!(
                "completion API error: {status} - {body}"
            )));
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Service(format!("failed to parse response: {e}")))?;

        result
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| CompletionError::Service("response contained no text".to_string()))
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}
