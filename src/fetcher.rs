/// Page retrieval and HTML-to-text extraction.
///
/// This module provides the blocking `HttpPageFetcher` used to resolve links
/// found in notes, the `PageFetcher` trait it implements, and the markup
/// stripping applied to every fetched page.
mod html;
mod http;

pub use html::html_to_text;
pub use http::{FetchError, HttpPageFetcher, HttpPageFetcherBuilder, PageFetcher};
