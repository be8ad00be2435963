use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

use super::html::html_to_text;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const USER_AGENT: &str = concat!("noteflow/", env!("CARGO_PKG_VERSION"));

/// Errors that can occur while retrieving a page.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-related errors (connection failures, DNS resolution, etc.)
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Request or response timeout errors
    #[error("Request timed out")]
    Timeout(#[source] reqwest::Error),

    /// Any status other than 200 OK
    #[error("HTTP error: status {status}")]
    Http { status: u16 },

    /// The response body could not be read as text
    #[error("Failed to read response body: {0}")]
    Body(#[source] reqwest::Error),

    /// The link is not a valid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(err)
        } else {
            FetchError::Network(err)
        }
    }
}

/// Retrieves a page and returns its visible text.
///
/// This trait is the seam between link summarization and the network, so
/// tests can substitute canned pages or failures.
pub trait PageFetcher: Send + Sync {
    /// Fetches `url` and returns the page's plain text.
    ///
    /// # Errors
    ///
    /// Returns `FetchError` on transport failure, on any status other than
    /// 200, or when the body cannot be read.
    fn fetch_text(&self, url: &str) -> Result<String, FetchError>;
}

/// Builder for constructing `HttpPageFetcher` instances.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use noteflow::fetcher::HttpPageFetcherBuilder;
///
/// let fetcher = HttpPageFetcherBuilder::new()
///     .timeout(Duration::from_secs(10))
///     .build()
///     .expect("Failed to create fetcher");
/// ```
#[derive(Debug, Default)]
pub struct HttpPageFetcherBuilder {
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
}

impl HttpPageFetcherBuilder {
    /// Creates a new `HttpPageFetcherBuilder` with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the total request timeout (default 30s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the connection timeout (default 5s).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Builds the `HttpPageFetcher`.
    pub fn build(self) -> Result<HttpPageFetcher, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .connect_timeout(self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT))
            .user_agent(USER_AGENT)
            .build()
            .map_err(FetchError::Network)?;

        Ok(HttpPageFetcher { client })
    }
}

/// Blocking HTTP page fetcher. Performs a single attempt per URL, no retry.
pub struct HttpPageFetcher {
    client: reqwest::blocking::Client,
}

impl PageFetcher for HttpPageFetcher {
    fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let parsed =
            reqwest::Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;

        let response = self
            .client
            .get(parsed)
            .send()
            .map_err(FetchError::from_transport)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        let body = response.text().map_err(FetchError::Body)?;
        tracing::debug!(url, bytes = body.len(), "fetched page");
        Ok(html_to_text(&body))
    }
}
