use std::collections::HashMap;
use std::sync::Mutex;

use super::{DocumentStore, Fields, StoreError, merge_fields};

/// In-process document store.
///
/// Keeps each collection as an insertion-ordered list, matching
/// `SqliteStore`'s read order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Vec<(String, Fields)>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryStore {
    fn read_collection(&self, collection: &str) -> Result<Vec<(String, Fields)>, StoreError> {
        let collections = self.collections.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(collections.get(collection).cloned().unwrap_or_default())
    }

    fn get(&self, collection: &str, key: &str) -> Result<Option<Fields>, StoreError> {
        let collections = self.collections.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|(k, _)| k == key))
            .map(|(_, fields)| fields.clone()))
    }

    fn upsert_merge(&self, collection: &str, key: &str, fields: &Fields) -> Result<(), StoreError> {
        let mut collections = self.collections.lock().map_err(|_| StoreError::Poisoned)?;
        let docs = collections.entry(collection.to_string()).or_default();
        match docs.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => merge_fields(existing, fields),
            None => docs.push((key.to_string(), fields.clone())),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn keeps_insertion_order_across_updates() {
        let store = MemoryStore::new();
        store.upsert_merge("c", "b", &fields(json!({"n": 1}))).unwrap();
        store.upsert_merge("c", "a", &fields(json!({"n": 2}))).unwrap();
        store.upsert_merge("c", "b", &fields(json!({"n": 3}))).unwrap();

        let keys: Vec<_> = store
            .read_collection("c")
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(store.get("c", "b").unwrap().unwrap()["n"], 3);
    }

    #[test]
    fn unknown_collection_is_empty() {
        let store = MemoryStore::new();
        assert!(store.read_collection("none").unwrap().is_empty());
        assert!(store.get("none", "k").unwrap().is_none());
    }
}
