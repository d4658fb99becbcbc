//! Core chat history types and identifiers.

pub mod config;
pub mod errors;
pub mod ids;
pub mod types;

pub use config::{CollectionConfig, DisplayConfig, HistoryConfig, StorageBackend, StorageConfig};
pub use errors::{HistoryError, HistoryResult};
pub use ids::{DocumentId, UserId};
pub use types::{ChatMessage, ChatPair, ConversationRecord, FeedbackKind, FeedbackRecord, Sender};
