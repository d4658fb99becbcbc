//! Domain records for conversations, display messages and feedback.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::history::core::ids::{DocumentId, UserId};

/// One user/assistant exchange.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatPair {
    /// Text of the user's message.
    pub user: String,
    /// Text of the assistant's reply.
    pub ai: String,
    /// Optional free-form annotation attached to the reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl ChatPair {
    /// Build a pair without metadata.
    #[must_use]
    pub fn new(user: impl Into<String>, ai: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ai: ai.into(),
            metadata: None,
        }
    }

    /// Attach metadata to the reply.
    #[must_use]
    pub fn with_metadata(mut self, metadata: impl Into<Value>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }

    /// Whether both sides carry text.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.user.is_empty() && !self.ai.is_empty()
    }
}

/// Like/dislike tag attached to an exchange.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    /// Positive feedback.
    Like,
    /// Negative feedback.
    Dislike,
}

impl FeedbackKind {
    /// Every feedback kind, in a stable order.
    pub const ALL: [Self; 2] = [Self::Like, Self::Dislike];

    /// Stable string form used in collection names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Dislike => "dislike",
        }
    }
}

impl fmt::Display for FeedbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FeedbackKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "like" => Ok(Self::Like),
            "dislike" => Ok(Self::Dislike),
            _ => Err(value.to_string()),
        }
    }
}

/// One persisted conversation document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    /// Pairs in chronological order.
    pub message_pairs: Vec<ChatPair>,
    /// Server timestamp; `None` until the store resolves it.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Feedback tag, if any.
    #[serde(default)]
    pub feedback: Option<FeedbackKind>,
}

/// Which side of an exchange a display message belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    /// The human side.
    User,
    /// The assistant side.
    Ai,
}

impl Sender {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Ai => "ai",
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A display-ready message projected from a conversation record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Source record, used to target feedback writes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docid: Option<DocumentId>,
    /// Message author.
    pub sender: Sender,
    /// Message body.
    pub text: String,
    /// Local rendering of the record timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Reply metadata (assistant messages only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Record feedback (assistant messages only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<FeedbackKind>,
}

impl ChatMessage {
    /// Build a standalone assistant message, e.g. a welcome banner.
    #[must_use]
    pub fn welcome(text: impl Into<String>) -> Self {
        Self {
            docid: None,
            sender: Sender::Ai,
            text: text.into(),
            created_at: None,
            metadata: None,
            feedback: None,
        }
    }
}

/// Shared copy of an exchange that received feedback.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    /// Owner of the source conversation.
    pub uid: UserId,
    /// Assistant reply.
    pub ai_text: String,
    /// User message.
    pub user_text: String,
    /// Reply metadata, or an empty string when the pair had none.
    #[serde(default)]
    pub metadata: Value,
    /// Server timestamp of the mirror write.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl FeedbackRecord {
    /// Build the mirror record for one pair.
    #[must_use]
    pub fn from_pair(uid: UserId, pair: &ChatPair) -> Self {
        Self {
            uid,
            ai_text: pair.ai.clone(),
            user_text: pair.user.clone(),
            metadata: pair
                .metadata
                .clone()
                .unwrap_or_else(|| Value::String(String::new())),
            created_at: None,
        }
    }
}
