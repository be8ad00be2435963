//! Ollama chat provider.
//!
//! Talks to a local or remote Ollama server through `POST /api/chat` with
//! streaming disabled.
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::client::{
    ChatModel, ModelError, RetryPolicy, http_client, post_json, retry_with_backoff,
    validate_base_url,
};
use crate::models::{Message, Role};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "llama3.2";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Builder for constructing `OllamaChatModel` instances.
///
/// # Examples
///
/// ```
/// use noteflow::llm::OllamaChatModelBuilder;
///
/// let model = OllamaChatModelBuilder::new()
///     .base_url("http://localhost:11434")
///     .model("llama3.2")
///     .build()
///     .expect("Failed to create model");
/// ```
#[derive(Debug, Default)]
pub struct OllamaChatModelBuilder {
    name: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    retry: Option<RetryPolicy>,
    timeout: Option<Duration>,
}

impl OllamaChatModelBuilder {
    /// Creates a new `OllamaChatModelBuilder` with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the registry name reported by `ChatModel::name` (default "ollama").
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the base URL for the Ollama API.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the Ollama model tag (e.g. "llama3.2" or "gemma3:4b").
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the sampling temperature (default 0.7).
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the retry policy (default: two retries).
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Sets the per-request timeout (default 120s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the `OllamaChatModel`.
    ///
    /// # Environment Variables
    ///
    /// If `base_url()` was not called, `OLLAMA_HOST` is used, falling back to
    /// `http://localhost:11434`. If `model()` was not called, `OLLAMA_MODEL`
    /// is used, falling back to `llama3.2`.
    pub fn build(self) -> Result<OllamaChatModel, ModelError> {
        let base_url = self.base_url.unwrap_or_else(|| {
            std::env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
        });
        let model = self.model.unwrap_or_else(|| {
            std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string())
        });

        let base_url = validate_base_url(&base_url)?;
        let client = http_client(self.timeout.unwrap_or(Duration::from_secs(120)))?;

        Ok(OllamaChatModel {
            client,
            name: self.name.unwrap_or_else(|| "ollama".to_string()),
            base_url,
            model,
            temperature: self.temperature.unwrap_or(0.7),
            retry: self.retry.unwrap_or_default(),
        })
    }
}

/// Chat model served by Ollama.
pub struct OllamaChatModel {
    client: reqwest::blocking::Client,
    name: String,
    base_url: String,
    model: String,
    temperature: f32,
    retry: RetryPolicy,
}

impl OllamaChatModel {
    /// Returns the base URL configured for this model.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the Ollama model tag.
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl ChatModel for OllamaChatModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, messages: &[Message]) -> Result<Message, ModelError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
            },
        };

        let response: ChatResponse =
            retry_with_backoff(self.retry, || post_json(self.client.post(&url), &body))?;

        into_message(response)
    }
}

fn into_message(response: ChatResponse) -> Result<Message, ModelError> {
    if let Some(error) = response.error {
        return Err(ModelError::Api { message: error });
    }
    response
        .message
        .map(|m| Message::new(Role::Assistant, m.content))
        .ok_or_else(|| ModelError::Api {
            message: "Missing 'message' field in API response".to_string(),
        })
}
