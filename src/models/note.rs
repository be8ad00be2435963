use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

/// A note with its content, tags and modification time.
///
/// Notes are identified by `key`. Fields the note source carries beyond the
/// ones modelled here are kept in `extra` and written back unchanged, so a
/// transformed note never drops provider metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Stable unique identity.
    pub key: String,
    /// Raw note text.
    #[serde(default)]
    pub content: String,
    /// Ordered tag names.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Last modification time, stored as fractional unix seconds.
    #[serde(rename = "modifydate", with = "unix_seconds", default = "epoch")]
    pub modified_at: OffsetDateTime,
    /// Any other fields of the source record.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Note {
    /// Returns the first non-blank line of the content, or `[No Title]`.
    pub fn title(&self) -> &str {
        self.content
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("[No Title]")
    }

    /// Produces the transformed version of this note.
    ///
    /// Keeps the key and every extra field, replaces content and tags, and
    /// stamps both `modifydate` and `modificationDate` with `now`.
    pub fn transformed(&self, content: String, tags: Vec<String>, now: OffsetDateTime) -> Note {
        let mut extra = self.extra.clone();
        extra.insert(
            "modificationDate".to_string(),
            Value::from(unix_seconds::to_f64(now)),
        );
        Note {
            key: self.key.clone(),
            content,
            tags,
            modified_at: now,
            extra,
        }
    }

    /// Serializes the note into the field map written to a document store.
    pub fn to_fields(&self) -> Result<Map<String, Value>, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(serde::ser::Error::custom(format!(
                "note serialized to non-object value: {other}"
            ))),
        }
    }

    /// Deserializes a note from a stored field map.
    ///
    /// `key` is taken from the map when present, otherwise from `key`.
    pub fn from_fields(key: &str, fields: Map<String, Value>) -> Result<Note, serde_json::Error> {
        let mut fields = fields;
        fields
            .entry("key")
            .or_insert_with(|| Value::String(key.to_string()));
        serde_json::from_value(Value::Object(fields))
    }
}

fn epoch() -> OffsetDateTime {
    OffsetDateTime::UNIX_EPOCH
}

/// Serde helpers for timestamps stored as fractional unix seconds.
///
/// Note providers are inconsistent here: some write a float, some a numeric
/// string. Both are accepted on input; output is always a float.
mod unix_seconds {
    use serde::{Deserialize, Deserializer, Serializer, de};
    use serde_json::Value;
    use time::OffsetDateTime;

    pub fn to_f64(at: OffsetDateTime) -> f64 {
        at.unix_timestamp_nanos() as f64 / 1_000_000_000.0
    }

    pub fn from_f64(secs: f64) -> Option<OffsetDateTime> {
        if !secs.is_finite() {
            return None;
        }
        OffsetDateTime::from_unix_timestamp_nanos((secs * 1_000_000_000.0) as i128).ok()
    }

    pub fn serialize<S: Serializer>(at: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(to_f64(*at))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<OffsetDateTime, D::Error> {
        let secs = match Value::deserialize(deserializer)? {
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| de::Error::custom("timestamp out of range"))?,
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|e| de::Error::custom(format!("invalid timestamp {s:?}: {e}")))?,
            Value::Null => 0.0,
            other => {
                return Err(de::Error::custom(format!(
                    "expected timestamp, found {other}"
                )));
            }
        };
        from_f64(secs).ok_or_else(|| de::Error::custom("timestamp out of range"))
    }
}

/// Builder for constructing `Note` instances with optional fields.
///
/// # Examples
///
/// ```
/// use noteflow::NoteBuilder;
///
/// let note = NoteBuilder::new()
///     .key("abc123")
///     .content("My first note")
///     .build();
///
/// assert_eq!(note.key, "abc123");
/// assert!(note.tags.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct NoteBuilder {
    key: Option<String>,
    content: Option<String>,
    tags: Option<Vec<String>>,
    modified_at: Option<OffsetDateTime>,
    extra: Map<String, Value>,
}

impl NoteBuilder {
    /// Creates a new `NoteBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the note key.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets the note content.
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Sets the tags.
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the modification timestamp.
    pub fn modified_at(mut self, modified_at: OffsetDateTime) -> Self {
        self.modified_at = Some(modified_at);
        self
    }

    /// Adds an extra field carried through untouched.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    /// Builds the `Note`, using defaults for optional fields.
    ///
    /// # Panics
    ///
    /// Panics if `key` or `content` have not been set.
    pub fn build(self) -> Note {
        Note {
            key: self.key.expect("key is required"),
            content: self.content.expect("content is required"),
            tags: self.tags.unwrap_or_default(),
            modified_at: self.modified_at.unwrap_or_else(OffsetDateTime::now_utc),
            extra: self.extra,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn builder_defaults_to_empty_tags() {
        let note = NoteBuilder::new().key("k1").content("Test note").build();

        assert_eq!(note.key, "k1");
        assert_eq!(note.content, "Test note");
        assert!(note.tags.is_empty());
        assert!(note.extra.is_empty());
    }

    #[test]
    fn deserializes_simplenote_record_with_string_timestamp() {
        let value = json!({
            "key": "abc",
            "content": "hello\nworld",
            "tags": ["a"],
            "modifydate": "1700000000.5",
            "deleted": false
        });

        let note: Note = serde_json::from_value(value).unwrap();

        assert_eq!(note.key, "abc");
        assert_eq!(note.tags, vec!["a"]);
        assert_eq!(note.modified_at.unix_timestamp(), 1_700_000_000);
        assert_eq!(note.extra.get("deleted"), Some(&json!(false)));
    }

    #[test]
    fn missing_timestamp_defaults_to_epoch() {
        let note: Note = serde_json::from_value(json!({"key": "k", "content": "c"})).unwrap();
        assert_eq!(note.modified_at, OffsetDateTime::UNIX_EPOCH);
    }

    #[test]
    fn from_fields_uses_map_key_when_record_has_none() {
        let fields = json!({"content": "body"}).as_object().cloned().unwrap();
        let note = Note::from_fields("from-map", fields).unwrap();
        assert_eq!(note.key, "from-map");
        assert_eq!(note.content, "body");
    }

    #[test]
    fn transformed_keeps_key_and_extra_fields() {
        let note = NoteBuilder::new()
            .key("k")
            .content("old")
            .tags(["old-tag"])
            .field("systemtags", json!(["pinned"]))
            .build();
        let now = datetime!(2024-01-02 03:04:05 UTC);

        let out = note.transformed("new".to_string(), vec!["t".to_string()], now);

        assert_eq!(out.key, "k");
        assert_eq!(out.content, "new");
        assert_eq!(out.tags, vec!["t"]);
        assert_eq!(out.modified_at, now);
        assert_eq!(out.extra.get("systemtags"), Some(&json!(["pinned"])));
        assert_eq!(
            out.extra.get("modificationDate"),
            Some(&json!(now.unix_timestamp() as f64))
        );
    }

    #[test]
    fn to_fields_writes_modifydate_as_float() {
        let now = datetime!(2024-01-02 03:04:05 UTC);
        let note = NoteBuilder::new()
            .key("k")
            .content("c")
            .modified_at(now)
            .build();

        let fields = note.to_fields().unwrap();

        assert_eq!(fields.get("key"), Some(&json!("k")));
        assert_eq!(
            fields.get("modifydate"),
            Some(&json!(now.unix_timestamp() as f64))
        );
    }

    #[test]
    fn title_is_first_non_blank_line() {
        let note = NoteBuilder::new()
            .key("k")
            .content("\n  Groceries  \nmilk")
            .build();
        assert_eq!(note.title(), "Groceries");

        let empty = NoteBuilder::new().key("k").content("   ").build();
        assert_eq!(empty.title(), "[No Title]");
    }
}
