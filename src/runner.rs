//! Batch processing of notes from a source into a destination collection.

use std::time::Instant;

use thiserror::Error;
use time::OffsetDateTime;

use crate::models::Note;
use crate::pipeline::{Pipeline, PipelineError};
use crate::source::NoteSource;
use crate::store::{DocumentStore, StoreError};

/// Content longer than this is cut before it enters the pipeline.
pub const DEFAULT_MAX_CONTENT_CHARS: usize = 1_000_000;

/// Why a single note was not persisted.
#[derive(Debug, Error)]
pub enum NoteError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Failed to encode note: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to persist note: {0}")]
    Store(#[from] StoreError),
}

/// A note that failed, with the reason.
#[derive(Debug)]
pub struct NoteFailure {
    pub key: String,
    pub error: NoteError,
}

/// Tunables for one batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Number of leading notes to leave untouched.
    pub skip: usize,
    /// Maximum number of notes to process after the skip.
    pub limit: Option<usize>,
    /// Maximum content length in characters.
    pub max_content_chars: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: None,
            max_content_chars: DEFAULT_MAX_CONTENT_CHARS,
        }
    }
}

/// Outcome counts of a batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Notes listed by the source.
    pub total: usize,
    /// Notes left untouched by the skip offset.
    pub skipped: usize,
    /// Notes transformed and written.
    pub persisted: usize,
    pub failures: Vec<NoteFailure>,
}

impl BatchReport {
    /// Notes that went through the pipeline, successfully or not.
    pub fn attempted(&self) -> usize {
        self.persisted + self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs every note of a source through the pipeline and persists each
/// result individually.
pub struct BatchRunner<'a> {
    pipeline: &'a Pipeline,
    store: &'a dyn DocumentStore,
    options: BatchOptions,
}

impl<'a> BatchRunner<'a> {
    pub fn new(
        pipeline: &'a Pipeline,
        store: &'a dyn DocumentStore,
        options: BatchOptions,
    ) -> Self {
        Self {
            pipeline,
            store,
            options,
        }
    }

    /// Processes `source` into the `destination` collection.
    ///
    /// A failing note is logged and recorded in the report; the batch moves
    /// on to the next note.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` only when the source itself cannot be listed.
    pub fn run(
        &self,
        source: &dyn NoteSource,
        destination: &str,
    ) -> Result<BatchReport, StoreError> {
        let notes = source.list_notes()?;
        let mut report = BatchReport {
            total: notes.len(),
            skipped: self.options.skip.min(notes.len()),
            ..BatchReport::default()
        };

        let limit = self.options.limit.unwrap_or(usize::MAX);
        tracing::info!(
            total = report.total,
            skip = self.options.skip,
            destination,
            "starting batch"
        );

        for note in notes.iter().skip(self.options.skip).take(limit) {
            let started = Instant::now();
            match self.process(note, destination) {
                Ok(tag_count) => {
                    report.persisted += 1;
                    tracing::info!(
                        note_key = %note.key,
                        tag_count,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "note persisted"
                    );
                }
                Err(error) => {
                    tracing::error!(note_key = %note.key, error = %error, "note failed");
                    report.failures.push(NoteFailure {
                        key: note.key.clone(),
                        error,
                    });
                }
            }
        }

        tracing::info!(
            persisted = report.persisted,
            failed = report.failures.len(),
            "batch finished"
        );
        Ok(report)
    }

    fn process(&self, note: &Note, destination: &str) -> Result<usize, NoteError> {
        let content = truncate_chars(&note.content, self.options.max_content_chars);
        let outcome = self.pipeline.run(content)?;

        let tag_count = outcome.tags.len();
        let transformed =
            note.transformed(outcome.content, outcome.tags, OffsetDateTime::now_utc());
        self.store
            .upsert_merge(destination, &transformed.key, &transformed.to_fields()?)?;
        Ok(tag_count)
    }
}

/// Cuts `text` to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 5), "hello");
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        assert_eq!(truncate_chars("héllo wörld", 4), "héll");
        assert_eq!(truncate_chars("日本語テキスト", 3), "日本語");
    }

    #[test]
    fn zero_limit_yields_empty() {
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn report_counts_attempts() {
        let report = BatchReport {
            total: 5,
            skipped: 2,
            persisted: 2,
            failures: vec![NoteFailure {
                key: "k".into(),
                error: NoteError::Store(StoreError::Poisoned),
            }],
        };
        assert_eq!(report.attempted(), 3);
        assert!(!report.is_success());
    }
}
