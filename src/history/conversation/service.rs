//! Conversation store: append, fetch, feedback and review reads.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::history::conversation::codec::{
    CREATED_AT, decode_conversation, decode_feedback, decode_marker, encode_exchange,
    encode_feedback, encode_marker,
};
use crate::history::conversation::paths::ConversationPaths;
use crate::history::conversation::projection::TimestampFormatter;
use crate::history::core::config::HistoryConfig;
use crate::history::core::errors::{HistoryError, HistoryResult};
use crate::history::core::ids::{DocumentId, UserId};
use crate::history::core::types::{ChatPair, FeedbackKind, FeedbackRecord};
use crate::history::document::store::{Direction, DocumentStore, Query, open_document_store};

/// What happened to the shared copy when feedback was recorded.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MirrorOutcome {
    /// The shared record was written (`writes` upserts onto the same document).
    Mirrored {
        /// Number of complete pairs written.
        writes: usize,
    },
    /// No conversation record exists under the message id.
    ConversationMissing,
    /// The record exists but has no pair with both texts set.
    NoCompletePairs,
    /// Mirroring failed; the marker is still durable.
    Failed {
        /// Rendered error.
        reason: String,
    },
}

/// Result of recording feedback.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FeedbackOutcome {
    /// Kind that was recorded.
    pub kind: FeedbackKind,
    /// Record the feedback targets.
    pub message_id: DocumentId,
    /// Shared mirror result.
    pub mirror: MirrorOutcome,
}

/// Chat history operations over an injected document store.
#[derive(Clone)]
pub struct ConversationStore {
    store: Arc<dyn DocumentStore>,
    paths: ConversationPaths,
    formatter: TimestampFormatter,
}

impl ConversationStore {
    /// Create a conversation store over an existing backend.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(config: &HistoryConfig, store: Arc<dyn DocumentStore>) -> HistoryResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            paths: ConversationPaths::new(config.collections.clone()),
            formatter: TimestampFormatter::new(config.display.timestamp_format.clone()),
        })
    }

    /// Create a conversation store on the backend selected by the config.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the backend cannot be opened.
    pub async fn from_config(config: &HistoryConfig) -> HistoryResult<Self> {
        config.validate()?;
        let store = open_document_store(&config.storage).await?;
        Self::new(config, store)
    }

    /// Underlying document store.
    #[must_use]
    pub fn document_store(&self) -> Arc<dyn DocumentStore> {
        Arc::clone(&self.store)
    }

    /// Path builder in use.
    #[must_use]
    pub const fn paths(&self) -> &ConversationPaths {
        &self.paths
    }

    pub(crate) const fn formatter(&self) -> &TimestampFormatter {
        &self.formatter
    }

    /// Persist one exchange (one or more pairs) as a new conversation record.
    ///
    /// # Errors
    /// Returns `EmptyExchange` for an empty slice, or the store's error.
    pub async fn append_exchange(
        &self,
        user: &UserId,
        pairs: &[ChatPair],
    ) -> HistoryResult<DocumentId> {
        if pairs.is_empty() {
            return Err(HistoryError::EmptyExchange);
        }
        let collection = self.paths.history(user)?;
        let id = self
            .store
            .add(collection.clone(), encode_exchange(pairs)?)
            .await?;
        debug!(%user, %collection, %id, pairs = pairs.len(), "conversation saved");
        Ok(id)
    }

    /// Like [`Self::append_exchange`], but logs failures instead of returning them.
    pub async fn append_exchange_or_log(
        &self,
        user: &UserId,
        pairs: &[ChatPair],
    ) -> Option<DocumentId> {
        match self.append_exchange(user, pairs).await {
            Ok(id) => Some(id),
            Err(err) => {
                error!(%user, error = %err, "failed to save conversation");
                None
            }
        }
    }

    /// Every pair in the user's history, oldest record first.
    ///
    /// # Errors
    /// Returns the store's error, or `SchemaMismatch` for a malformed record.
    pub async fn fetch_history(&self, user: &UserId) -> HistoryResult<Vec<ChatPair>> {
        let query = Query::collection(self.paths.history(user)?)
            .order_by(CREATED_AT, Direction::Ascending);
        let docs = self.store.query(query).await?;

        let mut pairs = Vec::new();
        for doc in &docs {
            pairs.extend(decode_conversation(doc)?.message_pairs);
        }
        debug!(%user, records = docs.len(), pairs = pairs.len(), "history loaded");
        Ok(pairs)
    }

    /// Like [`Self::fetch_history`], but logs failures and returns an empty history.
    pub async fn fetch_history_or_empty(&self, user: &UserId) -> Vec<ChatPair> {
        match self.fetch_history(user).await {
            Ok(pairs) => pairs,
            Err(err) => {
                error!(%user, error = %err, "failed to load history");
                Vec::new()
            }
        }
    }

    /// Record a like/dislike on a conversation record.
    ///
    /// The per-user marker is written first and its failure is returned. The
    /// shared mirror is best-effort: its result is reported in the outcome and
    /// logged, never returned as an error.
    ///
    /// # Errors
    /// Returns an error if the marker write fails.
    pub async fn record_feedback(
        &self,
        user: &UserId,
        message_id: &DocumentId,
        kind: FeedbackKind,
    ) -> HistoryResult<FeedbackOutcome> {
        let marker = self.paths.marker(user, kind, message_id)?;
        self.store.set(marker, encode_marker()).await?;

        let mirror = match self.mirror_feedback(user, message_id, kind).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(%user, %message_id, %kind, error = %err, "failed to mirror feedback");
                MirrorOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        };

        Ok(FeedbackOutcome {
            kind,
            message_id: message_id.clone(),
            mirror,
        })
    }

    async fn mirror_feedback(
        &self,
        user: &UserId,
        message_id: &DocumentId,
        kind: FeedbackKind,
    ) -> HistoryResult<MirrorOutcome> {
        let record_path = self.paths.history_record(user, message_id)?;
        let Some(doc) = self.store.get(record_path).await? else {
            warn!(%user, %message_id, "conversation record not found, feedback not mirrored");
            return Ok(MirrorOutcome::ConversationMissing);
        };
        let record = decode_conversation(&doc)?;

        let target = self.paths.public_feedback_record(kind, message_id)?;
        let mut writes = 0;
        // Every pair lands on the same shared document; the last one wins.
        for pair in record.message_pairs.iter().filter(|pair| pair.is_complete()) {
            let shared = FeedbackRecord::from_pair(user.clone(), pair);
            self.store
                .set(target.clone(), encode_feedback(&shared)?)
                .await?;
            writes += 1;
        }

        if writes == 0 {
            debug!(%user, %message_id, "no complete pairs to mirror");
            return Ok(MirrorOutcome::NoCompletePairs);
        }
        info!(%message_id, %target, writes, "feedback mirrored");
        Ok(MirrorOutcome::Mirrored { writes })
    }

    /// Feedback currently recorded on a message, if any.
    ///
    /// When both markers exist the later `feedbackAt` wins; a marker whose
    /// timestamp is unresolved counts as older than any resolved one.
    ///
    /// # Errors
    /// Returns the store's error, or `SchemaMismatch` for a malformed marker.
    pub async fn feedback_for(
        &self,
        user: &UserId,
        message_id: &DocumentId,
    ) -> HistoryResult<Option<FeedbackKind>> {
        let mut latest = None;
        for kind in FeedbackKind::ALL {
            let path = self.paths.marker(user, kind, message_id)?;
            if let Some(doc) = self.store.get(path).await? {
                let at = decode_marker(&doc)?;
                match latest {
                    Some((_, previous)) if previous >= at => {}
                    _ => latest = Some((kind, at)),
                }
            }
        }
        Ok(latest.map(|(kind, _)| kind))
    }

    /// Shared feedback copy of a message.
    ///
    /// # Errors
    /// Returns the store's error, or `SchemaMismatch` for a malformed record.
    pub async fn public_feedback(
        &self,
        kind: FeedbackKind,
        message_id: &DocumentId,
    ) -> HistoryResult<Option<FeedbackRecord>> {
        let path = self.paths.public_feedback_record(kind, message_id)?;
        match self.store.get(path).await? {
            Some(doc) => Ok(Some(decode_feedback(&doc)?)),
            None => Ok(None),
        }
    }

    /// Review queue for one feedback kind, oldest first.
    ///
    /// # Errors
    /// Returns the store's error, or `SchemaMismatch` for a malformed record.
    pub async fn list_public_feedback(
        &self,
        kind: FeedbackKind,
    ) -> HistoryResult<Vec<(DocumentId, FeedbackRecord)>> {
        let query = Query::collection(self.paths.public_feedback(kind)?)
            .order_by(CREATED_AT, Direction::Ascending);
        let docs = self.store.query(query).await?;
        docs.iter()
            .map(|doc| -> HistoryResult<(DocumentId, FeedbackRecord)> {
                Ok((doc.id.clone(), decode_feedback(doc)?))
            })
            .collect()
    }
}
