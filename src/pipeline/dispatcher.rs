//! Per-link fan-out and join.
//!
//! `scatter` extracts the note's links and turns each into a `LinkTask`;
//! `join` runs the link summarizer for every task on a bounded rayon pool
//! and collects the results back in link order.

use std::panic::{self, AssertUnwindSafe};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

use super::link_summarizer::LinkSummarizer;
use super::state::{LinkSummary, PipelineState, StateUpdate};
use crate::links::extract_links;

/// One unit of per-link work: the link and its position in the note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTask {
    pub index: usize,
    pub link: String,
}

/// Schedules one link summarization per extracted link.
pub struct FanOutDispatcher {
    summarizer: LinkSummarizer,
    pool: ThreadPool,
}

impl FanOutDispatcher {
    /// Builds the worker pool. `max_parallel` is clamped to at least one
    /// worker.
    ///
    /// # Errors
    ///
    /// Returns `ThreadPoolBuildError` if the worker threads cannot be spawned.
    pub fn new(
        summarizer: LinkSummarizer,
        max_parallel: usize,
    ) -> Result<Self, ThreadPoolBuildError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(max_parallel.max(1))
            .thread_name(|i| format!("noteflow-link-{i}"))
            .build()?;
        Ok(Self { summarizer, pool })
    }

    /// Extracts links from the note and builds one task per link.
    ///
    /// The returned update records the links in `state.links`. Zero links
    /// means zero tasks.
    pub fn scatter(&self, state: &PipelineState) -> (StateUpdate, Vec<LinkTask>) {
        let content = state
            .messages()
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        let links = extract_links(content);

        let tasks = links
            .iter()
            .enumerate()
            .map(|(index, link)| LinkTask {
                index,
                link: link.clone(),
            })
            .collect();

        (StateUpdate::new().with_links(links), tasks)
    }

    /// Runs every task and returns their summaries keyed by link index.
    ///
    /// The update always carries exactly one summary per task. A task that
    /// panicked contributes an unavailable summary.
    pub fn join(&self, tasks: Vec<LinkTask>) -> StateUpdate {
        if tasks.is_empty() {
            return StateUpdate::new();
        }

        tracing::debug!(
            link_count = tasks.len(),
            workers = self.pool.current_num_threads(),
            "summarizing links"
        );

        let summaries: Vec<(usize, LinkSummary)> = self.pool.install(|| {
            tasks
                .par_iter()
                .map(|task| (task.index, self.summarize_contained(task)))
                .collect()
        });

        StateUpdate::new().with_link_summaries(summaries)
    }

    fn summarize_contained(&self, task: &LinkTask) -> LinkSummary {
        panic::catch_unwind(AssertUnwindSafe(|| {
            self.summarizer.summarize(Some(&task.link))
        }))
        .unwrap_or_else(|_| {
            tracing::error!(url = %task.link, "link summarizer panicked");
            LinkSummary::unavailable("link summarizer panicked")
        })
    }
}
