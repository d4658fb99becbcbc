//! Document payloads and the server timestamp codec.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::history::core::ids::DocumentId;
use crate::history::document::path::DocumentPath;

/// Field map of a stored document.
pub type DocumentData = Map<String, Value>;

/// A document as read back from a store.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    /// Document identifier (last path segment).
    pub id: DocumentId,
    /// Full document path.
    pub path: DocumentPath,
    /// Stored fields, server timestamps already resolved.
    pub data: DocumentData,
}

impl Document {
    /// Read a field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    /// Read a timestamp field. Absent, null or malformed values yield `None`.
    #[must_use]
    pub fn timestamp(&self, field: &str) -> Option<DateTime<Utc>> {
        self.get(field).and_then(decode_timestamp)
    }
}

/// Fields to write, plus fields the store must stamp with its own clock.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteData {
    fields: DocumentData,
    server_timestamps: Vec<String>,
}

impl WriteData {
    /// Empty write.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing field map.
    #[must_use]
    pub fn from_fields(fields: DocumentData) -> Self {
        Self {
            fields,
            server_timestamps: Vec::new(),
        }
    }

    /// Set a literal field value.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Have the store set `name` to its clock at write time.
    #[must_use]
    pub fn server_timestamp(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.fields.remove(&name);
        self.server_timestamps.push(name);
        self
    }

    /// Produce the stored field map using `now` for every server timestamp.
    #[must_use]
    pub fn resolve(self, now: DateTime<Utc>) -> DocumentData {
        let mut fields = self.fields;
        for name in self.server_timestamps {
            fields.insert(name, encode_timestamp(now));
        }
        fields
    }
}

/// Encode a timestamp the way stores persist it.
///
/// Fixed microsecond precision keeps the strings sortable as text.
#[must_use]
pub fn encode_timestamp(ts: DateTime<Utc>) -> Value {
    Value::String(ts.to_rfc3339_opts(SecondsFormat::Micros, true))
}

/// Decode a stored timestamp.
#[must_use]
pub fn decode_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|ts| ts.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_resolve_stamps_fields() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let data = WriteData::new()
            .field("createdAt", "client clock")
            .field("messagePairs", json!([]))
            .server_timestamp("createdAt")
            .resolve(now);
        assert_eq!(data["createdAt"], "2026-03-01T12:00:00.000000Z");
        assert_eq!(data["messagePairs"], json!([]));
    }

    #[test]
    fn test_encoded_timestamps_sort_as_text() {
        let early = Utc.with_ymd_and_hms(2026, 3, 1, 9, 59, 59).unwrap();
        let late = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let early_text = encode_timestamp(early);
        let late_text = encode_timestamp(late);
        assert!(early_text.as_str().unwrap() < late_text.as_str().unwrap());
        assert_eq!(decode_timestamp(&late_text), Some(late));
    }

    #[test]
    fn test_decode_rejects_non_timestamps() {
        assert_eq!(decode_timestamp(&Value::Null), None);
        assert_eq!(decode_timestamp(&json!("yesterday")), None);
        assert_eq!(decode_timestamp(&json!(17)), None);
    }
}
