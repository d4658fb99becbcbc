//! Projection of conversation records into display messages.

use std::fmt::Write as _;

use chrono::{DateTime, Local, SecondsFormat, Utc};
use tracing::warn;

use crate::history::core::ids::DocumentId;
use crate::history::core::types::{ChatMessage, ConversationRecord, Sender};

/// Renders record timestamps in local time.
#[derive(Clone, Debug)]
pub struct TimestampFormatter {
    pattern: String,
}

impl TimestampFormatter {
    /// Create a formatter from a `strftime` pattern validated by the config.
    #[must_use]
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    /// Render a server timestamp, or the current local time while it is unresolved.
    ///
    /// A pattern that fails to render falls back to RFC 3339.
    #[must_use]
    pub fn render(&self, ts: Option<DateTime<Utc>>) -> String {
        let local = ts.map_or_else(Local::now, |utc| utc.with_timezone(&Local));
        let mut out = String::new();
        if write!(out, "{}", local.format(&self.pattern)).is_err() {
            warn!(pattern = %self.pattern, "timestamp pattern failed to render");
            return local.to_rfc3339_opts(SecondsFormat::Secs, false);
        }
        out
    }
}

/// Build the full display list: the default message, then a user and an ai
/// message for every pair of every record, in order.
///
/// Records with no pairs contribute nothing.
#[must_use]
pub fn project_records(
    records: &[(DocumentId, ConversationRecord)],
    default_message: &ChatMessage,
    formatter: &TimestampFormatter,
) -> Vec<ChatMessage> {
    let pair_count: usize = records
        .iter()
        .map(|(_, record)| record.message_pairs.len())
        .sum();
    let mut messages = Vec::with_capacity(1 + pair_count * 2);
    messages.push(default_message.clone());

    for (docid, record) in records {
        if record.message_pairs.is_empty() {
            continue;
        }
        let created_at = formatter.render(record.created_at);
        for pair in &record.message_pairs {
            messages.push(ChatMessage {
                docid: Some(docid.clone()),
                sender: Sender::User,
                text: pair.user.clone(),
                created_at: Some(created_at.clone()),
                metadata: None,
                feedback: None,
            });
            messages.push(ChatMessage {
                docid: Some(docid.clone()),
                sender: Sender::Ai,
                text: pair.ai.clone(),
                created_at: Some(created_at.clone()),
                metadata: pair.metadata.clone(),
                feedback: record.feedback,
            });
        }
    }

    messages
}
