//! Snapshot listener: full re-reads of a query driven by the change feed.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use crate::history::core::errors::HistoryResult;
use crate::history::document::model::Document;
use crate::history::document::store::{ChangeEvent, DocumentStore, Query};

/// Yields the current result of a query once up front, then again after every
/// change to the queried collection.
///
/// The change feed is subscribed before the first read, so a write that lands
/// between the initial read and the first `next_snapshot` call still triggers
/// a re-read.
pub struct SnapshotListener {
    store: Arc<dyn DocumentStore>,
    query: Query,
    changes: broadcast::Receiver<ChangeEvent>,
    primed: bool,
}

impl SnapshotListener {
    /// Attach a listener to a store.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, query: Query) -> Self {
        let changes = store.changes();
        Self {
            store,
            query,
            changes,
            primed: false,
        }
    }

    /// The query this listener re-runs.
    #[must_use]
    pub const fn query(&self) -> &Query {
        &self.query
    }

    /// Wait for the next snapshot.
    ///
    /// Returns `None` once the store's change feed is closed.
    pub async fn next_snapshot(&mut self) -> Option<HistoryResult<Vec<Document>>> {
        if self.primed {
            loop {
                match self.changes.recv().await {
                    Ok(event) if event.collection == self.query.collection => break,
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        // Snapshots are full re-reads, so missed events lose nothing.
                        debug!(
                            collection = %self.query.collection,
                            skipped,
                            "change feed lagged, re-reading"
                        );
                        break;
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        } else {
            self.primed = true;
        }

        Some(self.store.query(self.query.clone()).await)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::history::document::memory_store::InMemoryDocumentStore;
    use crate::history::document::model::WriteData;
    use crate::history::document::path::CollectionPath;

    #[tokio::test]
    async fn test_initial_snapshot_then_updates() {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
        let history = CollectionPath::parse("users/u1/conversation-0610").unwrap();
        let mut listener =
            SnapshotListener::new(Arc::clone(&store), Query::collection(history.clone()));

        let first = listener.next_snapshot().await.unwrap().unwrap();
        assert!(first.is_empty());

        store.add(history, WriteData::new()).await.unwrap();
        let second = listener.next_snapshot().await.unwrap().unwrap();
        assert_eq!(second.len(), 1);
    }

    #[tokio::test]
    async fn test_ignores_other_collections() {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
        let mine = CollectionPath::parse("users/u1/conversation-0610").unwrap();
        let theirs = CollectionPath::parse("users/u2/conversation-0610").unwrap();
        let mut listener = SnapshotListener::new(Arc::clone(&store), Query::collection(mine));
        listener.next_snapshot().await.unwrap().unwrap();

        store.add(theirs, WriteData::new()).await.unwrap();
        let waited = tokio::time::timeout(Duration::from_millis(50), listener.next_snapshot()).await;
        assert!(waited.is_err());
    }
}
