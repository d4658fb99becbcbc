//! Validating conversion between documents and domain records.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::history::core::errors::{HistoryError, HistoryResult};
use crate::history::core::types::{ChatPair, ConversationRecord, FeedbackRecord};
use crate::history::document::model::{Document, WriteData};

/// Field holding the pairs of a conversation record.
pub const MESSAGE_PAIRS: &str = "messagePairs";
/// Server timestamp of conversation and feedback records.
pub const CREATED_AT: &str = "createdAt";
/// Server timestamp of feedback markers.
pub const FEEDBACK_AT: &str = "feedbackAt";

fn decode<T: DeserializeOwned>(doc: &Document) -> HistoryResult<T> {
    serde_json::from_value(Value::Object(doc.data.clone()))
        .map_err(|err| HistoryError::schema_mismatch(doc.path.as_str(), err.to_string()))
}

/// Decode a conversation record.
///
/// # Errors
/// Returns `SchemaMismatch` if `messagePairs` is missing or malformed, or if
/// `createdAt` / `feedback` hold unexpected values.
pub fn decode_conversation(doc: &Document) -> HistoryResult<ConversationRecord> {
    decode(doc)
}

/// Build the write for a new conversation record.
///
/// # Errors
/// Returns an error if the pairs cannot be serialized.
pub fn encode_exchange(pairs: &[ChatPair]) -> HistoryResult<WriteData> {
    Ok(WriteData::new()
        .field(MESSAGE_PAIRS, serde_json::to_value(pairs)?)
        .server_timestamp(CREATED_AT))
}

/// Decode a shared feedback record.
///
/// # Errors
/// Returns `SchemaMismatch` if required fields are missing or malformed.
pub fn decode_feedback(doc: &Document) -> HistoryResult<FeedbackRecord> {
    decode(doc)
}

/// Build the write for a shared feedback record. `createdAt` is stamped by the store.
///
/// # Errors
/// Returns an error if the record cannot be serialized.
pub fn encode_feedback(record: &FeedbackRecord) -> HistoryResult<WriteData> {
    match serde_json::to_value(record)? {
        Value::Object(fields) => Ok(WriteData::from_fields(fields).server_timestamp(CREATED_AT)),
        other => Err(HistoryError::Backend(format!(
            "feedback record serialized to a non-object: {other}"
        ))),
    }
}

/// Build the write for a feedback marker.
#[must_use]
pub fn encode_marker() -> WriteData {
    WriteData::new().server_timestamp(FEEDBACK_AT)
}

/// Read a marker's timestamp.
///
/// # Errors
/// Returns `SchemaMismatch` if `feedbackAt` is present but not a timestamp.
pub fn decode_marker(doc: &Document) -> HistoryResult<Option<DateTime<Utc>>> {
    match doc.get(FEEDBACK_AT) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => doc.timestamp(FEEDBACK_AT).map(Some).ok_or_else(|| {
            HistoryError::schema_mismatch(
                doc.path.as_str(),
                format!("{FEEDBACK_AT} is not a timestamp: {value}"),
            )
        }),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::history::core::ids::{DocumentId, UserId};
    use crate::history::core::types::FeedbackKind;
    use crate::history::document::model::DocumentData;
    use crate::history::document::path::CollectionPath;

    fn doc(data: Value) -> Document {
        let id = DocumentId::new("m1").unwrap();
        let path = CollectionPath::parse("users/u1/conversation-0610")
            .unwrap()
            .doc(&id);
        let data: DocumentData = match data {
            Value::Object(map) => map,
            _ => panic!("test data must be an object"),
        };
        Document { id, path, data }
    }

    #[test]
    fn test_decode_full_record() {
        let record = decode_conversation(&doc(json!({
            "messagePairs": [
                {"user": "hi", "ai": "hello", "metadata": "greeting"},
                {"user": "bye", "ai": "see you"}
            ],
            "createdAt": "2026-05-01T08:30:00.000000Z",
            "feedback": "dislike"
        })))
        .unwrap();

        assert_eq!(record.message_pairs.len(), 2);
        assert_eq!(record.message_pairs[0].metadata, Some(json!("greeting")));
        assert_eq!(record.message_pairs[1].metadata, None);
        assert_eq!(
            record.created_at,
            Some(Utc.with_ymd_and_hms(2026, 5, 1, 8, 30, 0).unwrap())
        );
        assert_eq!(record.feedback, Some(FeedbackKind::Dislike));
    }

    #[test]
    fn test_pending_timestamp_decodes_as_none() {
        let record = decode_conversation(&doc(json!({
            "messagePairs": [{"user": "q", "ai": "a"}],
            "createdAt": null
        })))
        .unwrap();
        assert_eq!(record.created_at, None);
        assert_eq!(record.feedback, None);
    }

    #[test]
    fn test_shape_errors_are_schema_mismatches() {
        let cases = [
            json!({"createdAt": "2026-05-01T08:30:00.000000Z"}),
            json!({"messagePairs": "not a list"}),
            json!({"messagePairs": [{"user": "only user"}]}),
            json!({"messagePairs": [], "createdAt": "tuesday"}),
            json!({"messagePairs": [], "feedback": "meh"}),
        ];
        for case in cases {
            let err = decode_conversation(&doc(case)).unwrap_err();
            assert!(matches!(err, HistoryError::SchemaMismatch { .. }), "{err}");
        }
    }

    #[test]
    fn test_encode_exchange_stamps_created_at() {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();
        let data = encode_exchange(&[ChatPair::new("q", "a")]).unwrap().resolve(now);
        assert_eq!(data[MESSAGE_PAIRS], json!([{"user": "q", "ai": "a"}]));
        assert_eq!(data[CREATED_AT], "2026-05-01T09:00:00.000000Z");
    }

    #[test]
    fn test_feedback_record_wire_shape() {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();
        let record = FeedbackRecord::from_pair(
            UserId::new("u1").unwrap(),
            &ChatPair::new("question", "answer"),
        );
        let data = encode_feedback(&record).unwrap().resolve(now);
        assert_eq!(data["uid"], "u1");
        assert_eq!(data["aiText"], "answer");
        assert_eq!(data["userText"], "question");
        assert_eq!(data["metadata"], "");

        let decoded = decode_feedback(&doc(Value::Object(data))).unwrap();
        assert_eq!(decoded.created_at, Some(now));
    }

    #[test]
    fn test_marker_timestamp() {
        let stamped = decode_marker(&doc(json!({"feedbackAt": "2026-05-01T09:00:00.000000Z"})));
        assert!(stamped.unwrap().is_some());
        assert_eq!(decode_marker(&doc(json!({}))).unwrap(), None);
        assert!(decode_marker(&doc(json!({"feedbackAt": 5}))).is_err());
    }
}
