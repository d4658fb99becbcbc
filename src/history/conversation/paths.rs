//! Addresses of every collection the conversation store touches.

use crate::history::core::config::CollectionConfig;
use crate::history::core::errors::HistoryResult;
use crate::history::core::ids::{DocumentId, UserId};
use crate::history::core::types::FeedbackKind;
use crate::history::document::path::{CollectionPath, DocumentPath};

/// Builds conversation paths from the configured collection names.
#[derive(Clone, Debug)]
pub struct ConversationPaths {
    config: CollectionConfig,
}

impl ConversationPaths {
    /// Create a path builder.
    #[must_use]
    pub const fn new(config: CollectionConfig) -> Self {
        Self { config }
    }

    fn user_collection(&self, user: &UserId, name: &str) -> HistoryResult<CollectionPath> {
        let user_doc = CollectionPath::root(&self.config.users_root)?
            .doc(&DocumentId::new(user.as_str())?);
        user_doc.collection(name)
    }

    /// `users/{uid}/{history}`.
    ///
    /// # Errors
    /// Returns an error if the configured names do not form a valid path.
    pub fn history(&self, user: &UserId) -> HistoryResult<CollectionPath> {
        self.user_collection(user, &self.config.history)
    }

    /// `users/{uid}/{history}/{messageId}`.
    ///
    /// # Errors
    /// Returns an error if the configured names do not form a valid path.
    pub fn history_record(&self, user: &UserId, id: &DocumentId) -> HistoryResult<DocumentPath> {
        Ok(self.history(user)?.doc(id))
    }

    /// `users/{uid}/conversation-{kind}`.
    ///
    /// # Errors
    /// Returns an error if the configured names do not form a valid path.
    pub fn markers(&self, user: &UserId, kind: FeedbackKind) -> HistoryResult<CollectionPath> {
        let name = format!("{}{}", self.config.marker_prefix, kind.as_str());
        self.user_collection(user, &name)
    }

    /// `users/{uid}/conversation-{kind}/{messageId}`.
    ///
    /// # Errors
    /// Returns an error if the configured names do not form a valid path.
    pub fn marker(
        &self,
        user: &UserId,
        kind: FeedbackKind,
        id: &DocumentId,
    ) -> HistoryResult<DocumentPath> {
        Ok(self.markers(user, kind)?.doc(id))
    }

    /// `public-feedback-{kind}`.
    ///
    /// # Errors
    /// Returns an error if the configured prefix does not form a valid path.
    pub fn public_feedback(&self, kind: FeedbackKind) -> HistoryResult<CollectionPath> {
        CollectionPath::root(&format!(
            "{}{}",
            self.config.public_feedback_prefix,
            kind.as_str()
        ))
    }

    /// `public-feedback-{kind}/{messageId}`.
    ///
    /// # Errors
    /// Returns an error if the configured prefix does not form a valid path.
    pub fn public_feedback_record(
        &self,
        kind: FeedbackKind,
        id: &DocumentId,
    ) -> HistoryResult<DocumentPath> {
        Ok(self.public_feedback(kind)?.doc(id))
    }
}

impl Default for ConversationPaths {
    fn default() -> Self {
        Self::new(CollectionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let paths = ConversationPaths::default();
        let uid = UserId::new("u1").unwrap();
        let mid = DocumentId::new("m1").unwrap();

        assert_eq!(paths.history(&uid).unwrap().as_str(), "users/u1/conversation-0610");
        assert_eq!(
            paths.marker(&uid, FeedbackKind::Like, &mid).unwrap().as_str(),
            "users/u1/conversation-like/m1"
        );
        assert_eq!(
            paths
                .public_feedback_record(FeedbackKind::Dislike, &mid)
                .unwrap()
                .as_str(),
            "public-feedback-dislike/m1"
        );
    }

    #[test]
    fn test_custom_history_collection() {
        let config = CollectionConfig {
            history: "conversation".to_string(),
            ..CollectionConfig::default()
        };
        let paths = ConversationPaths::new(config);
        let uid = UserId::new("u1").unwrap();
        assert_eq!(paths.history(&uid).unwrap().as_str(), "users/u1/conversation");
    }
}
