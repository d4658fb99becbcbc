//! Configuration for the chat history store.

use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::Local;
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};

use crate::history::core::errors::{HistoryError, HistoryResult};

/// Top-level configuration for the chat history store.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Backend selection and storage settings.
    pub storage: StorageConfig,
    /// Collection naming.
    pub collections: CollectionConfig,
    /// Display projection settings.
    pub display: DisplayConfig,
}

impl HistoryConfig {
    /// Build the default configuration overlaid with `CHAT_HISTORY_*` environment variables.
    ///
    /// # Errors
    /// Returns an error if a variable holds an unsupported value or validation fails.
    pub fn from_env() -> HistoryResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the default configuration overlaid with values from `lookup`.
    ///
    /// # Errors
    /// Returns an error if a value is unsupported or validation fails.
    pub fn from_lookup<F>(lookup: F) -> HistoryResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(backend) = lookup("CHAT_HISTORY_BACKEND") {
            config.storage.backend = match backend.to_ascii_lowercase().as_str() {
                "memory" => StorageBackend::Memory,
                "sqlite" => StorageBackend::Sqlite,
                other => {
                    return Err(HistoryError::InvalidConfig(format!(
                        "unknown CHAT_HISTORY_BACKEND: {other}"
                    )));
                }
            };
        }
        if let Some(path) = lookup("CHAT_HISTORY_SQLITE_PATH") {
            config.storage.sqlite_path = PathBuf::from(path);
        }
        if let Some(table) = lookup("CHAT_HISTORY_TABLE") {
            config.storage.table = table;
        }
        if let Some(history) = lookup("CHAT_HISTORY_COLLECTION") {
            config.collections.history = history;
        }
        if let Some(format) = lookup("CHAT_HISTORY_TIMESTAMP_FORMAT") {
            config.display.timestamp_format = format;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> HistoryResult<()> {
        if self.storage.table.is_empty()
            || !self
                .storage
                .table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(HistoryError::InvalidConfig(format!(
                "storage.table must be a non-empty identifier: {:?}",
                self.storage.table
            )));
        }

        check_segment("collections.users_root", &self.collections.users_root)?;
        check_segment("collections.history", &self.collections.history)?;
        check_prefix("collections.marker_prefix", &self.collections.marker_prefix)?;
        check_prefix(
            "collections.public_feedback_prefix",
            &self.collections.public_feedback_prefix,
        )?;

        if self.display.timestamp_format.is_empty()
            || StrftimeItems::new(&self.display.timestamp_format).any(|item| item == Item::Error)
            || !formats_cleanly(&self.display.timestamp_format)
        {
            return Err(HistoryError::InvalidConfig(format!(
                "display.timestamp_format is not a valid strftime pattern: {:?}",
                self.display.timestamp_format
            )));
        }

        Ok(())
    }
}

/// Some specifiers parse but fail when rendered (e.g. `%#z`), so render a sample.
fn formats_cleanly(pattern: &str) -> bool {
    let mut sample = String::new();
    write!(
        sample,
        "{}",
        Local::now().format_with_items(StrftimeItems::new(pattern))
    )
    .is_ok()
}

fn check_segment(name: &str, value: &str) -> HistoryResult<()> {
    if value.is_empty() {
        return Err(HistoryError::InvalidConfig(format!("{name} must not be empty")));
    }
    check_prefix(name, value)
}

fn check_prefix(name: &str, value: &str) -> HistoryResult<()> {
    if value.contains('/') {
        return Err(HistoryError::InvalidConfig(format!(
            "{name} must not contain '/': {value}"
        )));
    }
    Ok(())
}

/// Document store backend selector.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Process-local store, lost on exit.
    Memory,
    /// Single-file `SQLite` store.
    Sqlite,
}

/// Storage configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Which backend to open.
    pub backend: StorageBackend,
    /// `SQLite` database path.
    pub sqlite_path: PathBuf,
    /// Documents table name.
    pub table: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            sqlite_path: PathBuf::from("chat_history.sqlite"),
            table: "documents".to_string(),
        }
    }
}

/// Collection naming for the conversation namespace.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Root collection holding one document per user.
    pub users_root: String,
    /// Per-user history collection.
    pub history: String,
    /// Prefix of per-user feedback marker collections (`{prefix}{kind}`).
    pub marker_prefix: String,
    /// Prefix of shared feedback collections (`{prefix}{kind}`).
    pub public_feedback_prefix: String,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            users_root: "users".to_string(),
            history: "conversation-0610".to_string(),
            marker_prefix: "conversation-".to_string(),
            public_feedback_prefix: "public-feedback-".to_string(),
        }
    }
}

/// Display projection settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// `strftime` pattern for message timestamps in local time.
    pub timestamp_format: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            timestamp_format: "%Y/%m/%d %H:%M:%S".to_string(),
        }
    }
}
