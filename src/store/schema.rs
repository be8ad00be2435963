/// Document store schema.
///
/// Uses CREATE TABLE IF NOT EXISTS for idempotent execution. The table keeps
/// its implicit rowid, which `read_collection` orders by so documents come
/// back in first-insertion order; upserts update in place and keep it.
pub const DOCUMENT_SCHEMA: &str = r#"
-- Documents table: one JSON object per (collection, key)
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    key TEXT NOT NULL,
    fields TEXT NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (collection, key)
);
"#;
