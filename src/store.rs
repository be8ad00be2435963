//! Keyed document persistence.
//!
//! Transformed notes are written one at a time with `upsert_merge`, keyed by
//! collection name and note key. `SqliteStore` is the durable backend and
//! `MemoryStore` serves tests and dry runs.

mod memory;
mod schema;
mod sqlite;

use serde_json::{Map, Value};
use thiserror::Error;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// A document: a JSON object of named fields.
pub type Fields = Map<String, Value>;

/// Errors that can occur while reading or writing documents.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying SQLite call failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored document could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored document is valid JSON but not an object
    #[error("Document {collection}/{key} is not a JSON object")]
    NotAnObject { collection: String, key: String },

    /// The store's lock was poisoned by a panicking writer
    #[error("Store lock poisoned")]
    Poisoned,
}

/// Document persistence keyed by collection name and document key.
///
/// This trait lets the batch runner persist into SQLite in production and
/// into memory in tests.
pub trait DocumentStore {
    /// Returns every document in `collection` in first-insertion order.
    ///
    /// A collection that was never written is empty, not an error.
    fn read_collection(&self, collection: &str) -> Result<Vec<(String, Fields)>, StoreError>;

    /// Returns one document, if present.
    fn get(&self, collection: &str, key: &str) -> Result<Option<Fields>, StoreError>;

    /// Creates the document or merges `fields` into it at the field level.
    ///
    /// Fields not named in `fields` keep their stored values and other keys
    /// in the collection are untouched. Writing identical fields twice
    /// leaves the same document as writing them once.
    fn upsert_merge(&self, collection: &str, key: &str, fields: &Fields) -> Result<(), StoreError>;
}

/// Overlays `fields` onto `existing`, field by field.
pub(crate) fn merge_fields(existing: &mut Fields, fields: &Fields) {
    for (name, value) in fields {
        existing.insert(name.clone(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn merge_overwrites_named_fields_and_keeps_others() {
        let mut existing = object(json!({"content": "old", "pinned": true}));
        merge_fields(&mut existing, &object(json!({"content": "new", "tags": ["a"]})));

        assert_eq!(
            Value::Object(existing),
            json!({"content": "new", "pinned": true, "tags": ["a"]})
        );
    }
}
