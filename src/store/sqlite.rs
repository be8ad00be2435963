use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use time::OffsetDateTime;

use super::schema::DOCUMENT_SCHEMA;
use super::{DocumentStore, Fields, StoreError, merge_fields};

/// SQLite-backed document store.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens an in-memory SQLite store.
    ///
    /// Automatically initializes the schema on connection open.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Opens a file-based SQLite store at the given path.
    ///
    /// Creates the database file if it does not exist.
    /// Automatically initializes the schema on connection open.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(DOCUMENT_SCHEMA)?;
        Ok(())
    }

    /// Returns a reference to the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn decode(collection: &str, key: &str, raw: &str) -> Result<Fields, StoreError> {
    match serde_json::from_str(raw)? {
        Value::Object(fields) => Ok(fields),
        _ => Err(StoreError::NotAnObject {
            collection: collection.to_string(),
            key: key.to_string(),
        }),
    }
}

impl DocumentStore for SqliteStore {
    fn read_collection(&self, collection: &str) -> Result<Vec<(String, Fields)>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, fields FROM documents WHERE collection = ?1 ORDER BY rowid")?;

        let rows = stmt
            .query_map([collection], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(key, raw)| {
                let fields = decode(collection, &key, &raw)?;
                Ok((key, fields))
            })
            .collect()
    }

    fn get(&self, collection: &str, key: &str) -> Result<Option<Fields>, StoreError> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT fields FROM documents WHERE collection = ?1 AND key = ?2",
                params![collection, key],
                |row| row.get(0),
            )
            .optional()?;

        raw.map(|raw| decode(collection, key, &raw)).transpose()
    }

    fn upsert_merge(&self, collection: &str, key: &str, fields: &Fields) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT fields FROM documents WHERE collection = ?1 AND key = ?2",
                params![collection, key],
                |row| row.get(0),
            )
            .optional()?;

        let mut merged = match existing {
            Some(raw) => decode(collection, key, &raw)?,
            None => Fields::new(),
        };
        merge_fields(&mut merged, fields);

        let encoded = serde_json::to_string(&merged)?;
        let now = OffsetDateTime::now_utc().unix_timestamp();
        tx.execute(
            "INSERT INTO documents (collection, key, fields, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(collection, key) DO UPDATE SET
                fields = excluded.fields,
                updated_at = excluded.updated_at",
            params![collection, key, encoded, now],
        )?;

        tx.commit()?;
        tracing::debug!(collection, key, "document upserted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn in_memory_opens_successfully() {
        assert!(SqliteStore::in_memory().is_ok());
    }

    #[test]
    fn schema_table_exists() {
        let store = SqliteStore::in_memory().unwrap();

        let tables: Vec<String> = store
            .connection()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"documents".to_string()));
    }

    #[test]
    fn missing_collection_reads_empty() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.read_collection("nothing").unwrap().is_empty());
        assert!(store.get("nothing", "k").unwrap().is_none());
    }

    #[test]
    fn upsert_creates_then_merges() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .upsert_merge("notes", "k1", &fields(json!({"content": "a", "pinned": true})))
            .unwrap();
        store
            .upsert_merge("notes", "k1", &fields(json!({"content": "b"})))
            .unwrap();

        let doc = store.get("notes", "k1").unwrap().unwrap();
        assert_eq!(Value::Object(doc), json!({"content": "b", "pinned": true}));
    }

    #[test]
    fn collections_are_isolated() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .upsert_merge("a", "k", &fields(json!({"v": 1})))
            .unwrap();
        store
            .upsert_merge("b", "k", &fields(json!({"v": 2})))
            .unwrap();

        assert_eq!(store.get("a", "k").unwrap().unwrap()["v"], 1);
        assert_eq!(store.get("b", "k").unwrap().unwrap()["v"], 2);
    }

    #[test]
    fn non_object_document_is_reported() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .connection()
            .execute(
                "INSERT INTO documents (collection, key, fields, updated_at) VALUES ('c', 'k', '[1]', 0)",
                [],
            )
            .unwrap();

        assert!(matches!(
            store.get("c", "k"),
            Err(StoreError::NotAnObject { .. })
        ));
    }

    #[test]
    fn reopen_is_idempotent_and_keeps_documents() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("notes.db");

        {
            let store = SqliteStore::open(&db_path).unwrap();
            store
                .upsert_merge("notes", "k", &fields(json!({"content": "kept"})))
                .unwrap();
        }

        let store = SqliteStore::open(&db_path).unwrap();
        assert_eq!(store.get("notes", "k").unwrap().unwrap()["content"], "kept");
    }
}
