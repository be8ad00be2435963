pub mod config;
pub mod fetcher;
pub mod links;
pub mod llm;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod runner;
pub mod source;
pub mod store;

pub use models::{Message, Note, NoteBuilder, Role};
pub use pipeline::{Pipeline, PipelineConfig, PipelineError, PipelineOutcome};
pub use runner::{BatchOptions, BatchReport, BatchRunner};
pub use source::{NoteSource, StoreNoteSource};
pub use store::{DocumentStore, MemoryStore, SqliteStore, StoreError};
