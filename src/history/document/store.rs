//! Document store abstraction over hierarchical collections.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::history::core::config::{StorageBackend, StorageConfig};
use crate::history::core::errors::HistoryResult;
use crate::history::core::ids::DocumentId;
use crate::history::document::memory_store::InMemoryDocumentStore;
use crate::history::document::model::{Document, WriteData};
use crate::history::document::path::{CollectionPath, DocumentPath};
use crate::history::document::sqlite_store::SqliteDocumentStore;

/// Boxed future type for document store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Capacity of each backend's change feed.
pub const CHANGE_FEED_CAPACITY: usize = 256;

/// Sort direction for an ordered query.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Direction {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

/// Ordering clause of a query.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OrderBy {
    /// Field to sort on.
    pub field: String,
    /// Sort direction.
    pub direction: Direction,
}

/// Read of every document in one collection.
///
/// Ties on the order field, and unordered queries, follow insertion order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Query {
    /// Collection to read.
    pub collection: CollectionPath,
    /// Optional ordering.
    pub order_by: Option<OrderBy>,
}

impl Query {
    /// Unordered read of a collection.
    #[must_use]
    pub const fn collection(collection: CollectionPath) -> Self {
        Self {
            collection,
            order_by: None,
        }
    }

    /// Order results by a field.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }
}

/// What happened to a document.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChangeKind {
    /// New document.
    Added,
    /// Existing document overwritten.
    Modified,
    /// Document deleted.
    Removed,
}

/// Notification published after every successful write.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChangeEvent {
    /// Collection that changed.
    pub collection: CollectionPath,
    /// Document that changed.
    pub document: DocumentId,
    /// Kind of change.
    pub kind: ChangeKind,
}

/// Document store trait.
pub trait DocumentStore: Send + Sync {
    /// Create a document with a store-assigned id.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn add(
        &self,
        collection: CollectionPath,
        data: WriteData,
    ) -> StoreFuture<'_, HistoryResult<DocumentId>>;

    /// Create or overwrite the document at `path`.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn set(&self, path: DocumentPath, data: WriteData) -> StoreFuture<'_, HistoryResult<()>>;

    /// Read one document.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn get(&self, path: DocumentPath) -> StoreFuture<'_, HistoryResult<Option<Document>>>;

    /// Delete one document. Deleting a missing document is not an error.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn delete(&self, path: DocumentPath) -> StoreFuture<'_, HistoryResult<()>>;

    /// Read a collection.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn query(&self, query: Query) -> StoreFuture<'_, HistoryResult<Vec<Document>>>;

    /// Subscribe to change notifications for every collection.
    fn changes(&self) -> broadcast::Receiver<ChangeEvent>;
}

/// Open the backend selected by `config`.
///
/// # Errors
/// Returns an error if the backend cannot be initialized.
pub async fn open_document_store(config: &StorageConfig) -> HistoryResult<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match config.backend {
        StorageBackend::Memory => Arc::new(InMemoryDocumentStore::new()),
        StorageBackend::Sqlite => Arc::new(SqliteDocumentStore::new(config).await?),
    };
    Ok(store)
}
