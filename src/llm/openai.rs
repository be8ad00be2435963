//! OpenAI-compatible chat provider.
//!
//! Mistral, Gemini and Perplexity all expose `POST {base}/chat/completions`
//! with bearer authentication, so one client serves every hosted model.
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::client::{
    ChatModel, ModelError, RetryPolicy, http_client, post_json, retry_with_backoff,
    validate_base_url,
};
use crate::models::{Message, Role};

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Builder for constructing `OpenAiChatModel` instances.
///
/// # Examples
///
/// ```
/// use noteflow::llm::OpenAiChatModelBuilder;
///
/// let model = OpenAiChatModelBuilder::new("mistral")
///     .base_url("https://codestral.mistral.ai/v1")
///     .model("codestral-latest")
///     .api_key("secret")
///     .temperature(0.6)
///     .build()
///     .expect("Failed to create model");
/// ```
#[derive(Debug)]
pub struct OpenAiChatModelBuilder {
    name: String,
    base_url: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    temperature: Option<f32>,
    retry: Option<RetryPolicy>,
    timeout: Option<Duration>,
}

impl OpenAiChatModelBuilder {
    /// Creates a builder for a model registered under `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: None,
            model: None,
            api_key: None,
            temperature: None,
            retry: None,
            timeout: None,
        }
    }

    /// Sets the API base URL, e.g. "https://api.perplexity.ai".
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the provider's model identifier.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the bearer token.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the sampling temperature; provider default when unset.
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

    /// Builds the `OpenAiChatModel`.
    ///
    /// Returns `ModelError::InvalidUrl` when the base URL is missing or
    /// malformed and `ModelError::Api` when no model identifier was given.
    pub fn build(self) -> Result<OpenAiChatModel, ModelError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ModelError::InvalidUrl(format!("no base URL for model {}", self.name)))?;
        let base_url = validate_base_url(&base_url)?;
        let model = self.model.ok_or_else(|| ModelError::Api {
            message: format!("no model identifier for {}", self.name),
        })?;
        let client = http_client(self.timeout.unwrap_or(Duration::from_secs(120)))?;

        Ok(OpenAiChatModel {
            client,
            name: self.name,
            base_url,
            model,
            api_key: self.api_key,
            temperature: self.temperature,
            retry: self.retry.unwrap_or_default(),
        })
    }
}

/// Chat model behind an OpenAI-compatible completions endpoint.
pub struct OpenAiChatModel {
    client: reqwest::blocking::Client,
    name: String,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: Option<f32>,
    retry: RetryPolicy,
}

impl OpenAiChatModel {
    /// Returns the base URL configured for this model.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the provider's model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl ChatModel for OpenAiChatModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, messages: &[Message]) -> Result<Message, ModelError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            stream: false,
        };

        let response: ChatCompletionResponse = retry_with_backoff(self.retry, || {
            let mut request = self.client.post(&url);
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }
            post_json(request, &body)
        })?;

        into_message(response)
    }
}

fn into_message(response: ChatCompletionResponse) -> Result<Message, ModelError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| Message::new(Role::Assistant, content))
        .ok_or_else(|| ModelError::Api {
            message: "Response contained no message content".to_string(),
        })
}
