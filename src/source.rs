//! Where unprocessed notes come from.

use std::sync::Arc;

use serde::Deserialize;
use time::macros::format_description;

use crate::models::Note;
use crate::store::{DocumentStore, StoreError};

/// A provider of notes to process.
///
/// This trait abstracts the sync provider so the batch runner can be fed
/// from a stored backup, a live service or a fixed list in tests.
pub trait NoteSource {
    /// Lists every available note in the source's order.
    fn list_notes(&self) -> Result<Vec<Note>, StoreError>;
}

impl NoteSource for Vec<Note> {
    fn list_notes(&self) -> Result<Vec<Note>, StoreError> {
        Ok(self.clone())
    }
}

/// Reads notes from one collection of a `DocumentStore`.
pub struct StoreNoteSource<S: ?Sized> {
    store: Arc<S>,
    collection: String,
}

impl<S: DocumentStore + ?Sized> StoreNoteSource<S> {
    pub fn new(store: Arc<S>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }
}

impl<S: DocumentStore + ?Sized> NoteSource for StoreNoteSource<S> {
    /// Records that are not valid notes are logged and skipped.
    fn list_notes(&self) -> Result<Vec<Note>, StoreError> {
        let records = self.store.read_collection(&self.collection)?;
        let notes = records
            .into_iter()
            .filter_map(|(key, fields)| match Note::from_fields(&key, fields) {
                Ok(note) => Some(note),
                Err(e) => {
                    tracing::warn!(
                        collection = %self.collection,
                        note_key = %key,
                        error = %e,
                        "skipping malformed note"
                    );
                    None
                }
            })
            .collect();
        Ok(notes)
    }
}

/// A note backup file: either a bare array or an object with `notes`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Backup {
    Notes(Vec<Note>),
    Wrapped { notes: Vec<Note> },
}

/// Parses a JSON note backup.
pub fn parse_backup(json: &str) -> Result<Vec<Note>, serde_json::Error> {
    let backup: Backup = serde_json::from_str(json)?;
    Ok(match backup {
        Backup::Notes(notes) | Backup::Wrapped { notes } => notes,
    })
}

/// Writes every note into `collection`, merging into existing documents.
///
/// Returns the number of notes written.
pub fn import_notes(
    store: &dyn DocumentStore,
    collection: &str,
    notes: &[Note],
) -> Result<usize, StoreError> {
    for note in notes {
        store.upsert_merge(collection, &note.key, &note.to_fields()?)?;
    }
    tracing::info!(collection, count = notes.len(), "notes imported");
    Ok(notes.len())
}

/// Formats notes as `YYYY-MM-DD - title` lines, newest first.
pub fn listing(notes: &[Note]) -> Vec<String> {
    let mut sorted: Vec<&Note> = notes.iter().collect();
    sorted.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));

    let date_format = format_description!("[year]-[month]-[day]");
    sorted
        .into_iter()
        .map(|note| {
            let date = note
                .modified_at
                .format(&date_format)
                .unwrap_or_else(|_| "????-??-??".to_string());
            format!("{} - {}", date, note.title())
        })
        .collect()
}
