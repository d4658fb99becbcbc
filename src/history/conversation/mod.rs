//! Conversation history on top of the document layer.
//!
//! - `paths`: where records, markers and shared feedback live
//! - `codec`: validating decode of documents into records
//! - `projection`: records to display messages
//! - `service`: `ConversationStore` operations
//! - `watch`: live projection into a caller-owned slot

pub mod codec;
pub mod paths;
pub mod projection;
pub mod service;
pub mod watch;

pub use paths::ConversationPaths;
pub use projection::{TimestampFormatter, project_records};
pub use service::{ConversationStore, FeedbackOutcome, MirrorOutcome};
pub use watch::WatchHandle;
