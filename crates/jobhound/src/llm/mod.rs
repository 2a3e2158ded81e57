//! OpenAI-compatible chat-completions client.
//!
//! Single point of entry for all LLM traffic. The three agent stages share
//! one client speaking the `/chat/completions` wire shape that OpenAI,
//! Ollama, and Gemini's compatibility endpoint all accept. Stages talk to
//! the [`ChatApi`] trait, never to the client directly, so they can run
//! against a scripted fake in tests.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Provider presets with known endpoints and default models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Openai,
    Ollama,
    Gemini,
}

impl LlmProvider {
    /// Returns the chat-completions base URL for this provider.
    pub fn base_url(&self) -> &'static str {
        match self {
            LlmProvider::Openai => "https://api.openai.com/v1",
            LlmProvider::Ollama => "http://localhost:11434/v1",
            LlmProvider::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
        }
    }

    /// Returns the default model for this provider.
    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::Openai => "gpt-4o-mini",
            LlmProvider::Ollama => "gemma3:12b",
            LlmProvider::Gemini => "gemini-2.5-flash",
        }
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse LLM response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited by provider (HTTP 429)")]
    RateLimited,

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// Seam between the agent stages and the wire client.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Sends one system+user exchange, returning the assistant text.
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Chat-completions client for one configured provider.
pub struct LlmClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
}

impl LlmClient {
    /// Builds a client for the given preset; explicit `base_url`/`model`
    /// override the preset values.
    pub fn new(
        provider: LlmProvider,
        base_url: Option<&str>,
        model: Option<&str>,
        api_key: Option<SecretString>,
    ) -> Result<Self, LlmError> {
        let base_url = base_url
            .unwrap_or_else(|| provider.base_url())
            .trim_end_matches('/')
            .to_string();
        let model = model.unwrap_or_else(|| provider.default_model()).to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url,
            model,
            api_key,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn send(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder.send().await?;
        let status = response.status();

        if status.as_u16() == 429 {
            return Err(LlmError::RateLimited);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // Providers wrap the message in {"error": {"message": ...}};
            // fall back to the raw body when they don't.
            let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let completion: ChatCompletionResponse = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(LlmError::EmptyContent);
        }

        debug!(model = %self.model, chars = content.len(), "chat completion received");
        Ok(content)
    }
}

#[async_trait]
impl ChatApi for LlmClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        self.send(system, user).await
    }
}

/// Requests a completion and deserializes the reply as strict JSON,
/// tolerating Markdown code fences around the payload.
pub async fn complete_json<T: DeserializeOwned>(
    api: &dyn ChatApi,
    system: &str,
    user: &str,
) -> Result<T, LlmError> {
    let text = api.complete(system, user).await?;
    let stripped = strip_json_fences(&text);
    serde_json::from_str(stripped).map_err(LlmError::Parse)
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or_else(|| stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or_else(|| stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_presets() {
        assert_eq!(LlmProvider::Openai.base_url(), "https://api.openai.com/v1");
        assert_eq!(LlmProvider::Openai.default_model(), "gpt-4o-mini");
        assert_eq!(LlmProvider::Ollama.base_url(), "http://localhost:11434/v1");
        assert_eq!(
            LlmProvider::Gemini.base_url(),
            "https://generativelanguage.googleapis.com/v1beta/openai"
        );
        assert_eq!(LlmProvider::Gemini.default_model(), "gemini-2.5-flash");
    }

    #[test]
    fn test_provider_parses_lowercase() {
        let provider: LlmProvider = serde_json::from_str("\"gemini\"").unwrap();
        assert_eq!(provider, LlmProvider::Gemini);
    }

    #[test]
    fn test_client_overrides_beat_presets() {
        let client = LlmClient::new(
            LlmProvider::Openai,
            Some("http://llm.internal:8080/v1/"),
            Some("my-tuned-model"),
            None,
        )
        .unwrap();
        assert_eq!(client.base_url, "http://llm.internal:8080/v1");
        assert_eq!(client.model(), "my-tuned-model");
    }

    #[test]
    fn test_client_defaults_from_preset() {
        let client = LlmClient::new(LlmProvider::Ollama, None, None, None).unwrap();
        assert_eq!(client.base_url, "http://localhost:11434/v1");
        assert_eq!(client.model(), "gemma3:12b");
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    struct ScriptedChat(String);

    #[async_trait]
    impl ChatApi for ScriptedChat {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Verdict {
        ok: bool,
        score: u8,
    }

    #[tokio::test]
    async fn test_complete_json_strips_fences_and_parses() {
        let api = ScriptedChat("```json\n{\"ok\": true, \"score\": 88}\n```".to_string());
        let verdict: Verdict = complete_json(&api, "sys", "user").await.unwrap();
        assert_eq!(
            verdict,
            Verdict {
                ok: true,
                score: 88
            }
        );
    }

    #[tokio::test]
    async fn test_complete_json_malformed_is_parse_error() {
        let api = ScriptedChat("not json at all".to_string());
        let result: Result<Verdict, LlmError> = complete_json(&api, "sys", "user").await;
        assert!(matches!(result, Err(LlmError::Parse(_))));
    }
}
