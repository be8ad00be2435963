//! Summarizes the page behind a single link.

use std::sync::Arc;

use thiserror::Error;

use super::state::LinkSummary;
use crate::fetcher::{FetchError, PageFetcher};
use crate::llm::{ChatModel, ModelError};
use crate::models::Message;

/// Prompt prefix placed before the extracted page text.
pub const LINK_PROMPT_PREFIX: &str =
    "Please provide a short summary of the material on the following website: \n ";

#[derive(Debug, Error)]
enum LinkError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("model call failed: {0}")]
    Model(#[from] ModelError),
}

/// Fetches one link and asks a model to summarize it.
///
/// Every failure is absorbed here. A broken link, a non-200 page or a
/// failing model call yields `LinkSummary::Unavailable`, never an error, so
/// one bad link cannot fail the note.
#[derive(Clone)]
pub struct LinkSummarizer {
    model: Arc<dyn ChatModel>,
    fetcher: Arc<dyn PageFetcher>,
}

impl LinkSummarizer {
    pub fn new(model: Arc<dyn ChatModel>, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { model, fetcher }
    }

    /// Summarizes `link`, or reports it unavailable.
    pub fn summarize(&self, link: Option<&str>) -> LinkSummary {
        let Some(link) = link else {
            return LinkSummary::unavailable("no link");
        };

        match self.try_summarize(link) {
            Ok(summary) => {
                tracing::debug!(url = link, model = self.model.name(), "link summarized");
                LinkSummary::Summary(summary)
            }
            Err(e) => {
                tracing::warn!(url = link, error = %e, "link summary not available");
                LinkSummary::unavailable(e.to_string())
            }
        }
    }

    fn try_summarize(&self, link: &str) -> Result<String, LinkError> {
        let text = self.fetcher.fetch_text(link)?;
        let prompt = [Message::user(format!("{LINK_PROMPT_PREFIX}{text}"))];
        let response = self.model.invoke(&prompt)?;
        Ok(response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct StaticFetcher(Result<&'static str, u16>);

    impl PageFetcher for StaticFetcher {
        fn fetch_text(&self, _url: &str) -> Result<String, FetchError> {
            self.0
                .map(str::to_string)
                .map_err(|status| FetchError::Http { status })
        }
    }

    #[derive(Default)]
    struct RecordingModel {
        prompts: Mutex<Vec<Vec<Message>>>,
        fail: bool,
    }

    impl ChatModel for RecordingModel {
        fn name(&self) -> &str {
            "recording"
        }

        fn invoke(&self, messages: &[Message]) -> Result<Message, ModelError> {
            self.prompts.lock().unwrap().push(messages.to_vec());
            if self.fail {
                Err(ModelError::Http { status: 500 })
            } else {
                Ok(Message::assistant("short summary"))
            }
        }
    }

    #[test]
    fn successful_fetch_is_summarized_with_fixed_prompt() {
        let model = Arc::new(RecordingModel::default());
        let summarizer = LinkSummarizer::new(model.clone(), Arc::new(StaticFetcher(Ok("Hello"))));

        let summary = summarizer.summarize(Some("https://example.com"));

        assert_eq!(summary, LinkSummary::Summary("short summary".to_string()));
        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(
            prompts[0],
            vec![Message::user(
                "Please provide a short summary of the material on the following website: \n Hello"
            )]
        );
    }

    #[test]
    fn missing_link_is_unavailable_without_calls() {
        let model = Arc::new(RecordingModel::default());
        let summarizer = LinkSummarizer::new(model.clone(), Arc::new(StaticFetcher(Ok("x"))));

        let summary = summarizer.summarize(None);

        assert_eq!(summary.render(), "not available");
        assert!(model.prompts.lock().unwrap().is_empty());
    }

    #[test]
    fn fetch_failure_is_unavailable_and_skips_model() {
        let model = Arc::new(RecordingModel::default());
        let summarizer = LinkSummarizer::new(model.clone(), Arc::new(StaticFetcher(Err(404))));

        let summary = summarizer.summarize(Some("https://example.com/missing"));

        assert!(matches!(&summary, LinkSummary::Unavailable { reason } if reason.contains("404")));
        assert!(model.prompts.lock().unwrap().is_empty());
    }

    #[test]
    fn model_failure_is_unavailable() {
        let model = Arc::new(RecordingModel {
            fail: true,
            ..RecordingModel::default()
        });
        let summarizer = LinkSummarizer::new(model, Arc::new(StaticFetcher(Ok("page"))));

        let summary = summarizer.summarize(Some("https://example.com"));

        assert!(matches!(
            &summary,
            LinkSummary::Unavailable { reason } if reason.contains("model call failed")
        ));
        assert_eq!(summary.render(), "not available");
    }
}
