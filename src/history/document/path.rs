//! Slash-separated addresses of collections and documents.
//!
//! Paths alternate collection and document segments, starting with a
//! collection: `users` is a collection, `users/alice` a document,
//! `users/alice/conversation` a collection again.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::history::core::errors::{HistoryError, HistoryResult};
use crate::history::core::ids::DocumentId;

fn split_segments(path: &str) -> HistoryResult<Vec<&str>> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Err(HistoryError::InvalidPath("path is empty".to_string()));
    }
    let segments: Vec<&str> = trimmed.split('/').collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(HistoryError::InvalidPath(format!(
            "path has an empty segment: {path}"
        )));
    }
    Ok(segments)
}

/// Address of a collection (odd number of segments).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionPath(String);

impl CollectionPath {
    /// Parse a collection path. Leading and trailing slashes are ignored.
    ///
    /// # Errors
    /// Returns an error if a segment is empty or the segment count is even.
    pub fn parse(path: &str) -> HistoryResult<Self> {
        let segments = split_segments(path)?;
        if segments.len() % 2 == 0 {
            return Err(HistoryError::InvalidPath(format!(
                "collection path needs an odd number of segments: {path}"
            )));
        }
        Ok(Self(segments.join("/")))
    }

    /// Address of a top-level collection.
    ///
    /// # Errors
    /// Returns an error if `name` is empty or contains `/`.
    pub fn root(name: &str) -> HistoryResult<Self> {
        if name.is_empty() || name.contains('/') {
            return Err(HistoryError::InvalidPath(format!(
                "invalid collection name: {name:?}"
            )));
        }
        Ok(Self(name.to_string()))
    }

    /// Address of a document inside this collection.
    #[must_use]
    pub fn doc(&self, id: &DocumentId) -> DocumentPath {
        DocumentPath(format!("{}/{}", self.0, id))
    }

    /// Borrow the path text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CollectionPath {
    type Error = HistoryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CollectionPath> for String {
    fn from(value: CollectionPath) -> Self {
        value.0
    }
}

/// Address of a document (even number of segments).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentPath(String);

impl DocumentPath {
    /// Parse a document path. Leading and trailing slashes are ignored.
    ///
    /// # Errors
    /// Returns an error if a segment is empty or the segment count is odd.
    pub fn parse(path: &str) -> HistoryResult<Self> {
        let segments = split_segments(path)?;
        if segments.len() % 2 != 0 {
            return Err(HistoryError::InvalidPath(format!(
                "document path needs an even number of segments: {path}"
            )));
        }
        Ok(Self(segments.join("/")))
    }

    /// Collection holding this document.
    #[must_use]
    pub fn parent(&self) -> CollectionPath {
        match self.0.rsplit_once('/') {
            Some((parent, _)) => CollectionPath(parent.to_string()),
            None => CollectionPath(String::new()),
        }
    }

    /// Last segment of the path.
    ///
    /// # Errors
    /// Returns an error if the path is malformed.
    pub fn id(&self) -> HistoryResult<DocumentId> {
        let last = self.0.rsplit('/').next().unwrap_or_default();
        DocumentId::new(last)
    }

    /// Sub-collection below this document.
    ///
    /// # Errors
    /// Returns an error if `name` is empty or contains `/`.
    pub fn collection(&self, name: &str) -> HistoryResult<CollectionPath> {
        if name.is_empty() || name.contains('/') {
            return Err(HistoryError::InvalidPath(format!(
                "invalid collection name: {name:?}"
            )));
        }
        Ok(CollectionPath(format!("{}/{name}", self.0)))
    }

    /// Borrow the path text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DocumentPath {
    type Error = HistoryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DocumentPath> for String {
    fn from(value: DocumentPath) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_parity() {
        assert!(CollectionPath::parse("users").is_ok());
        assert!(CollectionPath::parse("/users/u1/conversation-0610").is_ok());
        assert!(CollectionPath::parse("users/u1").is_err());
        assert!(DocumentPath::parse("users/u1").is_ok());
        assert!(DocumentPath::parse("users").is_err());
        assert!(DocumentPath::parse("users//u1").is_err());
        assert!(CollectionPath::parse("").is_err());
    }

    #[test]
    fn test_navigation() {
        let users = CollectionPath::root("users").unwrap();
        let user_doc = users.doc(&DocumentId::new("u1").unwrap());
        let history = user_doc.collection("conversation-0610").unwrap();
        assert_eq!(history.as_str(), "users/u1/conversation-0610");

        let record = history.doc(&DocumentId::new("m1").unwrap());
        assert_eq!(record.as_str(), "users/u1/conversation-0610/m1");
        assert_eq!(record.parent(), history);
        assert_eq!(record.id().unwrap().as_str(), "m1");
    }

    #[test]
    fn test_leading_slash_is_normalized() {
        let a = CollectionPath::parse("/users/u1/conversation-0610").unwrap();
        let b = CollectionPath::parse("users/u1/conversation-0610").unwrap();
        assert_eq!(a, b);
    }
}
