//! Conversation history for chat users, persisted in a hierarchical document store.
//!
//! This module is organized into:
//! - `core`: Configuration, errors, identifiers, and domain records
//! - `document`: Paths, documents, the store trait, backends, and snapshot listeners
//! - `conversation`: Path layout, record codec, projection, the `ConversationStore`, and live watches
//! - `logging`: Tracing subscriber setup

pub mod conversation;
pub mod core;
pub mod document;
pub mod logging;

// Re-export commonly used types for convenience
pub use conversation::{
    ConversationPaths, ConversationStore, FeedbackOutcome, MirrorOutcome, TimestampFormatter,
    WatchHandle, project_records,
};
pub use self::core::{
    ChatMessage, ChatPair, CollectionConfig, ConversationRecord, DisplayConfig, DocumentId,
    FeedbackKind, FeedbackRecord, HistoryConfig, HistoryError, HistoryResult, Sender,
    StorageBackend, StorageConfig, UserId,
};
pub use document::{
    ChangeEvent, ChangeKind, CollectionPath, Direction, Document, DocumentPath, DocumentStore,
    InMemoryDocumentStore, Query, SnapshotListener, SqliteDocumentStore, WriteData,
    open_document_store,
};
pub use logging::init_tracing;
