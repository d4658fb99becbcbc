//! Process-local document store.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::history::core::errors::HistoryResult;
use crate::history::core::ids::DocumentId;
use crate::history::document::model::{Document, DocumentData, WriteData};
use crate::history::document::path::{CollectionPath, DocumentPath};
use crate::history::document::store::{
    CHANGE_FEED_CAPACITY, ChangeEvent, ChangeKind, Direction, DocumentStore, Query, StoreFuture,
};

/// Clock used to resolve server timestamps.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Clone)]
struct StoredDocument {
    id: DocumentId,
    data: DocumentData,
}

/// In-memory implementation of the document store.
///
/// Each collection keeps its documents in insertion order; overwrites keep
/// the original position.
pub struct InMemoryDocumentStore {
    collections: DashMap<CollectionPath, Vec<StoredDocument>>,
    events: broadcast::Sender<ChangeEvent>,
    clock: Clock,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocumentStore {
    /// Create an empty store using the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(Utc::now))
    }

    /// Create an empty store that stamps writes with `clock`.
    #[must_use]
    pub fn with_clock(clock: Clock) -> Self {
        let (events, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            collections: DashMap::new(),
            events,
            clock,
        }
    }

    /// Number of documents currently in a collection.
    #[must_use]
    pub fn len(&self, collection: &CollectionPath) -> usize {
        self.collections.get(collection).map_or(0, |docs| docs.len())
    }

    /// Whether a collection holds no documents.
    #[must_use]
    pub fn is_empty(&self, collection: &CollectionPath) -> bool {
        self.len(collection) == 0
    }

    fn publish(&self, collection: CollectionPath, document: DocumentId, kind: ChangeKind) {
        // No receivers is fine: nobody is watching.
        let _ = self.events.send(ChangeEvent {
            collection,
            document,
            kind,
        });
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn add(
        &self,
        collection: CollectionPath,
        data: WriteData,
    ) -> StoreFuture<'_, HistoryResult<DocumentId>> {
        Box::pin(async move {
            let id = DocumentId::generate();
            let data = data.resolve((self.clock)());
            self.collections
                .entry(collection.clone())
                .or_default()
                .push(StoredDocument {
                    id: id.clone(),
                    data,
                });
            self.publish(collection, id.clone(), ChangeKind::Added);
            Ok(id)
        })
    }

    fn set(&self, path: DocumentPath, data: WriteData) -> StoreFuture<'_, HistoryResult<()>> {
        Box::pin(async move {
            let id = path.id()?;
            let collection = path.parent();
            let data = data.resolve((self.clock)());
            let kind = {
                let mut docs = self.collections.entry(collection.clone()).or_default();
                if let Some(existing) = docs.iter_mut().find(|doc| doc.id == id) {
                    existing.data = data;
                    ChangeKind::Modified
                } else {
                    docs.push(StoredDocument {
                        id: id.clone(),
                        data,
                    });
                    ChangeKind::Added
                }
            };
            self.publish(collection, id, kind);
            Ok(())
        })
    }

    fn get(&self, path: DocumentPath) -> StoreFuture<'_, HistoryResult<Option<Document>>> {
        Box::pin(async move {
            let id = path.id()?;
            let found = self.collections.get(&path.parent()).and_then(|docs| {
                docs.iter()
                    .find(|doc| doc.id == id)
                    .map(|doc| doc.data.clone())
            });
            Ok(found.map(|data| Document { id, path, data }))
        })
    }

    fn delete(&self, path: DocumentPath) -> StoreFuture<'_, HistoryResult<()>> {
        Box::pin(async move {
            let id = path.id()?;
            let collection = path.parent();
            let removed = self
                .collections
                .get_mut(&collection)
                .is_some_and(|mut docs| {
                    let before = docs.len();
                    docs.retain(|doc| doc.id != id);
                    docs.len() != before
                });
            if removed {
                self.publish(collection, id, ChangeKind::Removed);
            }
            Ok(())
        })
    }

    fn query(&self, query: Query) -> StoreFuture<'_, HistoryResult<Vec<Document>>> {
        Box::pin(async move {
            let mut docs: Vec<StoredDocument> = self
                .collections
                .get(&query.collection)
                .map(|docs| docs.value().clone())
                .unwrap_or_default();

            if let Some(order) = &query.order_by {
                // Stable sort keeps insertion order for ties.
                docs.sort_by(|a, b| {
                    let ordering = compare_fields(a.data.get(&order.field), b.data.get(&order.field));
                    match order.direction {
                        Direction::Ascending => ordering,
                        Direction::Descending => ordering.reverse(),
                    }
                });
            }

            Ok(docs
                .into_iter()
                .map(|doc| Document {
                    path: query.collection.doc(&doc.id),
                    id: doc.id,
                    data: doc.data,
                })
                .collect())
        })
    }

    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }
}

/// Order field values: missing/null, booleans, numbers, strings, then everything else.
fn compare_fields(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
