//! Shared chat-model interface, error type and retry logic.
use std::thread;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::models::Message;

/// Errors that can occur when invoking a chat model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Network-related errors (connection failures, DNS resolution, etc.)
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Request or response timeout errors
    #[error("Request timed out")]
    Timeout(#[source] reqwest::Error),

    /// HTTP errors with status code
    #[error("HTTP error: status {status}")]
    Http { status: u16 },

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Provider-specific errors, e.g. a response without content
    #[error("Model API error: {message}")]
    Api { message: String },

    /// Invalid URL configuration error
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A stage asked for a model name the registry does not know
    #[error("Unknown model: {0}")]
    UnknownModel(String),
}

impl ModelError {
    fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ModelError::Timeout(err)
        } else {
            ModelError::Network(err)
        }
    }
}

/// A chat model that turns an ordered list of messages into one response.
///
/// This trait enables mocking in unit tests and lets every pipeline stage
/// be configured with any registered provider.
pub trait ChatModel: Send + Sync {
    /// Name used in logs and registry listings.
    fn name(&self) -> &str;

    /// Invokes the model over `messages` and returns its reply.
    ///
    /// # Errors
    ///
    /// Returns `ModelError` if the request fails after the model's retries.
    fn invoke(&self, messages: &[Message]) -> Result<Message, ModelError>;
}

/// Bounded retry with exponential backoff.
///
/// The first retry waits `base_delay`, each later retry doubles the wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// A policy that never retries.
    pub const fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(1 << retry.min(16))
    }
}

impl Default for RetryPolicy {
    /// Two retries, waiting 1s then 2s.
    fn default() -> Self {
        Self::new(2, Duration::from_secs(1))
    }
}

/// Retries an operation with exponential backoff.
///
/// Only transient errors (network errors, timeouts, HTTP 429 and 5xx) are
/// retried; anything else is returned immediately.
///
/// # Returns
///
/// Returns the result of the operation if it succeeds, or the last error if
/// all retries fail.
pub fn retry_with_backoff<F, T>(policy: RetryPolicy, mut f: F) -> Result<T, ModelError>
where
    F: FnMut() -> Result<T, ModelError>,
{
    let mut last_error = match f() {
        Ok(result) => return Ok(result),
        Err(e) if !should_retry(&e) => return Err(e),
        Err(e) => e,
    };

    for retry in 0..policy.max_retries {
        let delay = policy.delay_for(retry);
        tracing::debug!(
            retry = retry + 1,
            delay_ms = delay.as_millis() as u64,
            error = %last_error,
            "retrying model call"
        );
        thread::sleep(delay);

        match f() {
            Ok(result) => return Ok(result),
            Err(e) if !should_retry(&e) => return Err(e),
            Err(e) => last_error = e,
        }
    }

    Err(last_error)
}

/// Returns `true` for transient errors worth another attempt.
fn should_retry(error: &ModelError) -> bool {
    match error {
        ModelError::Network(_) => true,
        ModelError::Timeout(_) => true,
        ModelError::Http { status } => *status == 429 || (500..600).contains(status),
        ModelError::Serialization(_) => false,
        ModelError::Api { .. } => false,
        ModelError::InvalidUrl(_) => false,
        ModelError::UnknownModel(_) => false,
    }
}

/// Builds the blocking HTTP client shared by the providers.
pub(super) fn http_client(timeout: Duration) -> Result<reqwest::blocking::Client, ModelError> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(5))
        .build()
        .map_err(ModelError::Network)
}

/// Validates a provider base URL and strips any trailing slash.
pub(super) fn validate_base_url(base_url: &str) -> Result<String, ModelError> {
    reqwest::Url::parse(base_url)
        .map_err(|e| ModelError::InvalidUrl(format!("{}: {}", base_url, e)))?;
    Ok(base_url.trim_end_matches('/').to_string())
}

/// Sends one JSON POST and decodes the JSON reply, mapping failures onto
/// `ModelError` so the retry loop can classify them.
pub(super) fn post_json<B, R>(
    request: reqwest::blocking::RequestBuilder,
    body: &B,
) -> Result<R, ModelError>
where
    B: Serialize,
    R: DeserializeOwned,
{
    let response = request
        .json(body)
        .send()
        .map_err(ModelError::from_transport)?;

    let status = response.status();
    if !status.is_success() {
        return Err(ModelError::Http {
            status: status.as_u16(),
        });
    }

    let bytes = response.bytes().map_err(ModelError::from_transport)?;
    serde_json::from_slice(&bytes).map_err(ModelError::Serialization)
}
