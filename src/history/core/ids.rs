//! Identifier types for the chat history store.
//!
//! Both identifiers are opaque strings: user ids come from the caller's auth
//! provider and document ids are assigned by the document store. Each one is
//! a single path segment, so neither may be empty or contain `/`.
//!
//! ## Cargo features used by this module
//! - `uuid_v7`: generated document ids use `Uuid::now_v7()` for insert locality.
//! - `nanoid_ids`: generated document ids are 20 alphanumeric characters instead
//!   of a 32-character hex UUID.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
#[cfg(not(feature = "nanoid_ids"))]
use uuid::Uuid;

use crate::history::core::errors::{HistoryError, HistoryResult};

/// Generate a fresh document id body.
///
/// With feature `uuid_v7` enabled, this uses `Uuid::now_v7()`.
/// Otherwise it falls back to `Uuid::new_v4()`.
#[cfg(not(feature = "nanoid_ids"))]
#[inline]
#[must_use]
fn uuid_for_document() -> Uuid {
    #[cfg(feature = "uuid_v7")]
    {
        Uuid::now_v7()
    }
    #[cfg(not(feature = "uuid_v7"))]
    {
        Uuid::new_v4()
    }
}

#[cfg(feature = "nanoid_ids")]
const AUTO_ID_ALPHABET: [char; 62] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S',
    'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l',
    'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', '0', '1', '2', '3', '4',
    '5', '6', '7', '8', '9',
];

/// Check that a value can be used as one path segment.
fn validate_segment(kind: &str, value: &str) -> HistoryResult<()> {
    if value.is_empty() {
        return Err(HistoryError::InvalidId(format!("{kind} must not be empty")));
    }
    if value.contains('/') {
        return Err(HistoryError::InvalidId(format!(
            "{kind} must not contain '/': {value}"
        )));
    }
    Ok(())
}

/// Declare a validated string identifier with a consistent API.
macro_rules! define_segment_id {
    (
        $(#[$meta:meta])*
        $name:ident,
        kind = $kind:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validate and wrap an identifier.
            ///
            /// # Errors
            /// Returns an error if the value is empty or contains `/`.
            pub fn new(value: impl Into<String>) -> HistoryResult<Self> {
                let value = value.into();
                validate_segment($kind, &value)?;
                Ok(Self(value))
            }

            /// Borrow the identifier text.
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            #[inline]
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = HistoryError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = HistoryError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            #[inline]
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

define_segment_id!(
    /// Identifier of the user who owns a conversation namespace.
    UserId,
    kind = "user id"
);

define_segment_id!(
    /// Identifier of a document inside a collection.
    ///
    /// Conversation records use it as their message id when feedback is recorded.
    DocumentId,
    kind = "document id"
);

impl DocumentId {
    /// Generate a new store-assigned document id.
    #[must_use]
    pub fn generate() -> Self {
        #[cfg(feature = "nanoid_ids")]
        {
            Self(nanoid::nanoid!(20, &AUTO_ID_ALPHABET))
        }
        #[cfg(not(feature = "nanoid_ids"))]
        {
            Self(uuid_for_document().simple().to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_and_slash() {
        assert!(UserId::new("").is_err());
        assert!(UserId::new("a/b").is_err());
        assert!(DocumentId::new("x/").is_err());
        assert_eq!(UserId::new("uid-42").unwrap().as_str(), "uid-42");
    }

    #[test]
    fn test_generated_ids_are_unique_segments() {
        let a = DocumentId::generate();
        let b = DocumentId::generate();
        assert_ne!(a, b);
        let expected_len = if cfg!(feature = "nanoid_ids") { 20 } else { 32 };
        assert_eq!(a.as_str().len(), expected_len);
        assert!(!a.as_str().contains('/'));
    }

    #[test]
    fn test_serde_validates() {
        let id: UserId = serde_json::from_str("\"alice\"").unwrap();
        assert_eq!(id.to_string(), "alice");
        assert!(serde_json::from_str::<UserId>("\"a/b\"").is_err());
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"alice\"");
    }
}
