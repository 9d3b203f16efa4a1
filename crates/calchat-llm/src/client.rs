//! Completion client trait and implementations.
//!
//! Both translation pipelines consume the same primitive: a system
//! instruction plus one user utterance in, plain completion text out.
//! The trait keeps the pipelines testable without a live endpoint.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LlmError;
use crate::settings::LlmSettings;

/// Shared completion capability: one system instruction, one user turn.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;
}

#[async_trait]
impl CompletionClient for Arc<dyn CompletionClient> {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        (**self).complete(system, user).await
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Client for an OpenAI-compatible chat-completions endpoint.
pub struct HttpCompletionClient {
    client: reqwest::Client,
    settings: LlmSettings,
}

impl HttpCompletionClient {
    pub fn new(settings: LlmSettings) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|error| LlmError::Http(error.to_string()))?;
        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &LlmSettings {
        &self.settings
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or(LlmError::MissingApiKey)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let bearer = format!("Bearer {api_key}");
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&bearer).map_err(|error| LlmError::Http(error.to_string()))?,
        );

        let body = ChatRequest {
            model: self.settings.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_output_tokens,
        };

        debug!(
            model = %self.settings.model,
            user_len = user.len(),
            "sending completion request"
        );

        let response = self
            .client
            .post(self.settings.completions_url())
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|error| LlmError::Http(error.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::Response(format!("HTTP {status}: {text}")));
        }

        let text = response
            .text()
            .await
            .map_err(|error| LlmError::Http(error.to_string()))?;
        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|error| LlmError::Serialization(error.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| LlmError::Response("completion carried no choices".to_string()))
    }
}

/// Canned client replaying queued responses, for tests and dry runs.
///
/// Responses are consumed front to back; an exhausted queue yields a
/// response error, which is what a misbehaving endpoint would produce.
#[derive(Default)]
pub struct CannedCompletionClient {
    responses: Mutex<VecDeque<String>>,
}

impl CannedCompletionClient {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
        }
    }

    pub fn with_response(response: impl Into<String>) -> Self {
        Self::new([response.into()])
    }

    fn pop(&self) -> Option<String> {
        let mut queue = match self.responses.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        queue.pop_front()
    }
}

#[async_trait]
impl CompletionClient for CannedCompletionClient {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
        self.pop()
            .ok_or_else(|| LlmError::Response("canned responses exhausted".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_response_parses_content() {
        let raw = r#"{
            "choices": [
                {"message": {"role": "assistant", "content": "SELECT * FROM calendar;"}}
            ]
        }"#;
        let parsed: ChatResponse = serde_json::from_str(raw).expect("valid wire shape");
        assert_eq!(
            parsed.choices[0].message.content,
            "SELECT * FROM calendar;"
        );
    }

    #[tokio::test]
    async fn canned_client_replays_in_order() {
        let client = CannedCompletionClient::new(["first", "second"]);
        assert_eq!(client.complete("s", "u").await.unwrap(), "first");
        assert_eq!(client.complete("s", "u").await.unwrap(), "second");
        assert!(client.complete("s", "u").await.is_err());
    }

    #[tokio::test]
    async fn http_client_requires_api_key() {
        let client = HttpCompletionClient::new(LlmSettings::default()).expect("client");
        let err = client.complete("s", "u").await.unwrap_err();
        assert!(matches!(err, LlmError::MissingApiKey));
    }
}
