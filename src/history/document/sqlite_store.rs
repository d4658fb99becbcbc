//! `SQLite` document store: one JSON row per document.

use chrono::Utc;
use rusqlite::OptionalExtension;
use tokio::sync::broadcast;
use tokio_rusqlite::Connection;

use crate::history::core::config::StorageConfig;
use crate::history::core::errors::{HistoryError, HistoryResult};
use crate::history::core::ids::DocumentId;
use crate::history::document::model::{Document, DocumentData, WriteData};
use crate::history::document::path::{CollectionPath, DocumentPath};
use crate::history::document::store::{
    CHANGE_FEED_CAPACITY, ChangeEvent, ChangeKind, Direction, DocumentStore, Query, StoreFuture,
};

/// `SQLite` implementation of the document store.
///
/// Rows carry an autoincrement `seq` that preserves insertion order across
/// overwrites, so ordered queries break ties the same way the in-memory store does.
pub struct SqliteDocumentStore {
    conn: Connection,
    table: String,
    events: broadcast::Sender<ChangeEvent>,
}

impl SqliteDocumentStore {
    /// Initialize the document store at the configured path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub async fn new(config: &StorageConfig) -> HistoryResult<Self> {
        let conn = Connection::open(&config.sqlite_path).await?;
        Self::with_connection(conn, config.table.clone()).await
    }

    /// Initialize a private in-memory database.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub async fn open_in_memory(table: &str) -> HistoryResult<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::with_connection(conn, table.to_string()).await
    }

    async fn with_connection(conn: Connection, table: String) -> HistoryResult<Self> {
        if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(HistoryError::InvalidConfig(format!(
                "invalid table name: {table:?}"
            )));
        }
        let table_name = table.clone();

        conn.call(move |conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table_name} (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    collection TEXT NOT NULL,
                    doc_id TEXT NOT NULL,
                    data TEXT NOT NULL,
                    UNIQUE (collection, doc_id)
                );
                CREATE INDEX IF NOT EXISTS idx_{table_name}_collection
                    ON {table_name} (collection, seq);"
            ))?;
            Ok(())
        })
        .await?;

        let (events, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Ok(Self {
            conn,
            table,
            events,
        })
    }

    fn publish(&self, collection: CollectionPath, document: DocumentId, kind: ChangeKind) {
        let _ = self.events.send(ChangeEvent {
            collection,
            document,
            kind,
        });
    }
}

fn decode_row(path: &DocumentPath, raw: &str) -> HistoryResult<DocumentData> {
    match serde_json::from_str::<serde_json::Value>(raw)? {
        serde_json::Value::Object(data) => Ok(data),
        other => Err(HistoryError::schema_mismatch(
            path.as_str(),
            format!("stored document is not an object: {other}"),
        )),
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn add(
        &self,
        collection: CollectionPath,
        data: WriteData,
    ) -> StoreFuture<'_, HistoryResult<DocumentId>> {
        Box::pin(async move {
            let id = DocumentId::generate();
            let payload = serde_json::to_string(&data.resolve(Utc::now()))?;
            let table = self.table.clone();
            let collection_key = collection.to_string();
            let doc_id = id.to_string();

            self.conn
                .call(move |conn| {
                    conn.execute(
                        &format!(
                            "INSERT INTO {table} (collection, doc_id, data) VALUES (?1, ?2, ?3)"
                        ),
                        rusqlite::params![collection_key, doc_id, payload],
                    )?;
                    Ok(())
                })
                .await?;

            self.publish(collection, id.clone(), ChangeKind::Added);
            Ok(id)
        })
    }

    fn set(&self, path: DocumentPath, data: WriteData) -> StoreFuture<'_, HistoryResult<()>> {
        Box::pin(async move {
            let id = path.id()?;
            let collection = path.parent();
            let payload = serde_json::to_string(&data.resolve(Utc::now()))?;
            let table = self.table.clone();
            let collection_key = collection.to_string();
            let doc_id = id.to_string();

            let existed = self
                .conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    let existed = tx
                        .query_row(
                            &format!(
                                "SELECT 1 FROM {table} WHERE collection = ?1 AND doc_id = ?2"
                            ),
                            rusqlite::params![collection_key, doc_id],
                            |row| row.get::<_, i64>(0),
                        )
                        .optional()?
                        .is_some();
                    tx.execute(
                        &format!(
                            "INSERT INTO {table} (collection, doc_id, data) VALUES (?1, ?2, ?3)
                             ON CONFLICT (collection, doc_id) DO UPDATE SET data = excluded.data"
                        ),
                        rusqlite::params![collection_key, doc_id, payload],
                    )?;
                    tx.commit()?;
                    Ok(existed)
                })
                .await?;

            let kind = if existed {
                ChangeKind::Modified
            } else {
                ChangeKind::Added
            };
            self.publish(collection, id, kind);
            Ok(())
        })
    }

    fn get(&self, path: DocumentPath) -> StoreFuture<'_, HistoryResult<Option<Document>>> {
        Box::pin(async move {
            let id = path.id()?;
            let table = self.table.clone();
            let collection_key = path.parent().to_string();
            let doc_id = id.to_string();

            let raw = self
                .conn
                .call(move |conn| {
                    let row = conn
                        .query_row(
                            &format!(
                                "SELECT data FROM {table} WHERE collection = ?1 AND doc_id = ?2"
                            ),
                            rusqlite::params![collection_key, doc_id],
                            |row| row.get::<_, String>(0),
                        )
                        .optional()?;
                    Ok(row)
                })
                .await?;

            match raw {
                Some(raw) => {
                    let data = decode_row(&path, &raw)?;
                    Ok(Some(Document { id, path, data }))
                }
                None => Ok(None),
            }
        })
    }

    fn delete(&self, path: DocumentPath) -> StoreFuture<'_, HistoryResult<()>> {
        Box::pin(async move {
            let id = path.id()?;
            let collection = path.parent();
            let table = self.table.clone();
            let collection_key = collection.to_string();
            let doc_id = id.to_string();

            let removed = self
                .conn
                .call(move |conn| {
                    let count = conn.execute(
                        &format!("DELETE FROM {table} WHERE collection = ?1 AND doc_id = ?2"),
                        rusqlite::params![collection_key, doc_id],
                    )?;
                    Ok(count)
                })
                .await?;

            if removed > 0 {
                self.publish(collection, id, ChangeKind::Removed);
            }
            Ok(())
        })
    }

    fn query(&self, query: Query) -> StoreFuture<'_, HistoryResult<Vec<Document>>> {
        Box::pin(async move {
            let table = self.table.clone();
            let collection_key = query.collection.to_string();
            let (order_clause, json_path) = match &query.order_by {
                Some(order) => {
                    let direction = match order.direction {
                        Direction::Ascending => "ASC",
                        Direction::Descending => "DESC",
                    };
                    (
                        format!("json_extract(data, ?2) {direction}, seq ASC"),
                        Some(format!("$.\"{}\"", order.field.replace('"', ""))),
                    )
                }
                None => ("seq ASC".to_string(), None),
            };

            let rows = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT doc_id, data FROM {table}
                         WHERE collection = ?1
                         ORDER BY {order_clause}"
                    ))?;
                    let read_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(String, String)> {
                        let doc_id: String = row.get(0)?;
                        let data: String = row.get(1)?;
                        Ok((doc_id, data))
                    };
                    let rows = match json_path {
                        Some(json_path) => stmt
                            .query_map(rusqlite::params![collection_key, json_path], read_row)?
                            .collect::<Result<Vec<_>, rusqlite::Error>>()?,
                        None => stmt
                            .query_map(rusqlite::params![collection_key], read_row)?
                            .collect::<Result<Vec<_>, rusqlite::Error>>()?,
                    };
                    Ok(rows)
                })
                .await?;

            let mut documents = Vec::with_capacity(rows.len());
            for (doc_id, raw) in rows {
                let id = DocumentId::new(doc_id)?;
                let path = query.collection.doc(&id);
                let data = decode_row(&path, &raw)?;
                documents.push(Document { id, path, data });
            }
            Ok(documents)
        })
    }

    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn history() -> CollectionPath {
        CollectionPath::parse("users/u1/conversation-0610").unwrap()
    }

    #[tokio::test]
    async fn test_add_get_and_query_order() {
        let store = SqliteDocumentStore::open_in_memory("documents").await.unwrap();
        let first = store
            .add(history(), WriteData::new().field("n", 1).server_timestamp("createdAt"))
            .await
            .unwrap();
        let second = store
            .add(history(), WriteData::new().field("n", 2).server_timestamp("createdAt"))
            .await
            .unwrap();

        let doc = store.get(history().doc(&first)).await.unwrap().unwrap();
        assert_eq!(doc.get("n"), Some(&json!(1)));

        let docs = store
            .query(Query::collection(history()).order_by("createdAt", Direction::Ascending))
            .await
            .unwrap();
        let ids: Vec<DocumentId> = docs.iter().map(|doc| doc.id.clone()).collect();
        assert_eq!(ids, vec![first, second]);
    }

    #[tokio::test]
    async fn test_set_is_an_upsert() {
        let store = SqliteDocumentStore::open_in_memory("documents").await.unwrap();
        let mut rx = store.changes();
        let path = DocumentPath::parse("public-feedback-like/m1").unwrap();

        store.set(path.clone(), WriteData::new().field("v", 1)).await.unwrap();
        store.set(path.clone(), WriteData::new().field("v", 2)).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().kind, ChangeKind::Added);
        assert_eq!(rx.recv().await.unwrap().kind, ChangeKind::Modified);

        let docs = store.query(Query::collection(path.parent())).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].get("v"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_descending_order_keeps_insertion_for_ties() {
        let store = SqliteDocumentStore::open_in_memory("documents").await.unwrap();
        let collection = CollectionPath::root("scores").unwrap();
        let low = store
            .add(collection.clone(), WriteData::new().field("score", 1))
            .await
            .unwrap();
        let tie_a = store
            .add(collection.clone(), WriteData::new().field("score", 5))
            .await
            .unwrap();
        let tie_b = store
            .add(collection.clone(), WriteData::new().field("score", 5))
            .await
            .unwrap();

        let docs = store
            .query(Query::collection(collection).order_by("score", Direction::Descending))
            .await
            .unwrap();
        let ids: Vec<DocumentId> = docs.into_iter().map(|doc| doc.id).collect();
        assert_eq!(ids, vec![tie_a, tie_b, low]);
    }

    #[tokio::test]
    async fn test_delete_removes_row() {
        let store = SqliteDocumentStore::open_in_memory("documents").await.unwrap();
        let id = store.add(history(), WriteData::new()).await.unwrap();
        store.delete(history().doc(&id)).await.unwrap();
        assert!(store.get(history().doc(&id)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejects_unsafe_table_name() {
        let result = SqliteDocumentStore::open_in_memory("docs; DROP TABLE x").await;
        assert!(matches!(result, Err(HistoryError::InvalidConfig(_))));
    }
}
