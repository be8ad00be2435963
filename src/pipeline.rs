//! Per-note enrichment pipeline.
//!
//! A note flows through four stages:
//!
//! 1. the `FanOutDispatcher` extracts links and schedules one task per link,
//! 2. each task runs the `LinkSummarizer` (failures become "not available"),
//! 3. the `NoteSummarizer` joins every link summary with the note,
//! 4. the `Tagger` derives a comma-delimited tag list from the summary.
//!
//! Stages never mutate `PipelineState` themselves. They return a
//! `StateUpdate` which `Pipeline::run` applies in order.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use noteflow::fetcher::HttpPageFetcherBuilder;
//! use noteflow::llm::{ModelRegistry, OllamaChatModelBuilder};
//! use noteflow::pipeline::{Pipeline, PipelineConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = ModelRegistry::new("ollama")
//!     .with_model("ollama", Arc::new(OllamaChatModelBuilder::new().build()?));
//! let fetcher = Arc::new(HttpPageFetcherBuilder::new().build()?);
//!
//! let pipeline = Pipeline::new(&registry, fetcher, &PipelineConfig::with_default_instructions())?;
//! let outcome = pipeline.run("Read later: https://www.rust-lang.org")?;
//!
//! println!("{}", outcome.content);
//! println!("{:?}", outcome.tags);
//! # Ok(())
//! # }
//! ```

mod config;
mod dispatcher;
mod link_summarizer;
mod note_summarizer;
mod state;
mod tagger;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

pub use config::{DEFAULT_SUMMARIZER_MESSAGE, DEFAULT_TAGGER_MESSAGE, PipelineConfig};
pub use dispatcher::{FanOutDispatcher, LinkTask};
pub use link_summarizer::{LINK_PROMPT_PREFIX, LinkSummarizer};
pub use note_summarizer::NoteSummarizer;
pub use state::{LinkSummary, PipelineState, StateUpdate, UNAVAILABLE_SENTINEL};
pub use tagger::{Tagger, parse_tag_list};

use crate::fetcher::PageFetcher;
use crate::llm::{ModelError, ModelRegistry};

/// Pipeline stage, used to attribute errors and log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LinkSummarizer,
    NoteSummarizer,
    Tagger,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::LinkSummarizer => write!(f, "link_summarizer"),
            Stage::NoteSummarizer => write!(f, "note_summarizer"),
            Stage::Tagger => write!(f, "tagger"),
        }
    }
}

/// Errors that fail a whole note.
///
/// Link-level failures never appear here; they are absorbed into
/// `LinkSummary::Unavailable`.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A stage's model call failed after retries
    #[error("{stage} model call failed: {source}")]
    Model {
        stage: Stage,
        #[source]
        source: ModelError,
    },

    /// A configured stage model is not in the registry
    #[error("{stage} model is not registered: {source}")]
    UnknownModel {
        stage: Stage,
        #[source]
        source: ModelError,
    },

    /// The link worker pool could not be started
    #[error("failed to start link workers: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    /// The run finished without the expected summary and tag messages
    #[error("pipeline produced {0} messages, expected at least 3")]
    IncompleteRun(usize),
}

/// Result of running one note through the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub state: PipelineState,
    /// Condensed content: the note summarizer's response.
    pub content: String,
    /// Tags parsed from the tagger's response.
    pub tags: Vec<String>,
}

impl PipelineOutcome {
    fn from_state(state: PipelineState) -> Result<Self, PipelineError> {
        let messages = state.messages();
        let [_, .., summary, tags] = messages else {
            return Err(PipelineError::IncompleteRun(messages.len()));
        };

        let content = summary.content.clone();
        let tags = parse_tag_list(&tags.content);
        Ok(Self {
            state,
            content,
            tags,
        })
    }
}

/// The assembled four-stage pipeline.
pub struct Pipeline {
    dispatcher: FanOutDispatcher,
    note_summarizer: NoteSummarizer,
    tagger: Tagger,
}

impl Pipeline {
    /// Resolves every stage model from `registry` and wires the stages.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::UnknownModel` when a configured model name is
    /// not registered, or `PipelineError::WorkerPool` when the link workers
    /// cannot be spawned.
    pub fn new(
        registry: &ModelRegistry,
        fetcher: Arc<dyn PageFetcher>,
        config: &PipelineConfig,
    ) -> Result<Self, PipelineError> {
        let resolve = |stage: Stage, name: Option<&str>| {
            registry
                .resolve(name)
                .map_err(|source| PipelineError::UnknownModel { stage, source })
        };

        let link_model = resolve(Stage::LinkSummarizer, config.link_summarizer_model.as_deref())?;
        let note_model = resolve(Stage::NoteSummarizer, config.note_summarizer_model.as_deref())?;
        let tagger_model = resolve(Stage::Tagger, config.tagger_model.as_deref())?;

        tracing::debug!(
            link_summarizer = link_model.name(),
            note_summarizer = note_model.name(),
            tagger = tagger_model.name(),
            "pipeline models resolved"
        );

        let dispatcher = FanOutDispatcher::new(
            LinkSummarizer::new(link_model, fetcher),
            config.max_parallel_links,
        )?;

        Ok(Self {
            dispatcher,
            note_summarizer: NoteSummarizer::new(note_model, config.summarizer_message.clone()),
            tagger: Tagger::new(tagger_model, config.tagger_message.clone()),
        })
    }

    /// Runs one note's content through every stage.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Model` when the note summarizer or tagger
    /// fails. Failed links do not fail the run.
    pub fn run(&self, content: &str) -> Result<PipelineOutcome, PipelineError> {
        let mut state = PipelineState::new(content);

        let (links, tasks) = self.dispatcher.scatter(&state);
        state.apply(links);
        tracing::debug!(stage = %Stage::LinkSummarizer, link_count = tasks.len(), "dispatching");

        state.apply(self.dispatcher.join(tasks));
        let available = state
            .link_summary()
            .iter()
            .filter(|summary| summary.is_available())
            .count();
        tracing::info!(
            link_count = state.links().len(),
            summarized = available,
            "link summaries joined"
        );

        tracing::debug!(stage = %Stage::NoteSummarizer, "running");
        let update = self
            .note_summarizer
            .run(&state)
            .map_err(|source| PipelineError::Model {
                stage: Stage::NoteSummarizer,
                source,
            })?;
        state.apply(update);

        tracing::debug!(stage = %Stage::Tagger, "running");
        let update = self.tagger.run(&state).map_err(|source| PipelineError::Model {
            stage: Stage::Tagger,
            source,
        })?;
        state.apply(update);

        PipelineOutcome::from_state(state)
    }
}
