//! Live projection of a user's history into a caller-owned message list.

use std::sync::Arc;

use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::history::conversation::codec::{CREATED_AT, decode_conversation};
use crate::history::conversation::projection::{TimestampFormatter, project_records};
use crate::history::conversation::service::ConversationStore;
use crate::history::core::errors::HistoryResult;
use crate::history::core::ids::{DocumentId, UserId};
use crate::history::core::types::{ChatMessage, ConversationRecord};
use crate::history::document::listener::SnapshotListener;
use crate::history::document::model::Document;
use crate::history::document::store::{Direction, Query};

/// Handle to a running history watch.
///
/// Dropping the handle stops the watch as well.
#[derive(Debug)]
pub struct WatchHandle {
    shutdown: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl WatchHandle {
    /// Stop the watch and wait for its task to finish.
    pub async fn cancel(mut self) {
        self.shutdown.notify_one();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(error = %err, "history watch task ended abnormally");
            }
        }
    }

    /// Whether the watch task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl ConversationStore {
    /// Keep `slot` equal to `[default_message, ...history]` for `user`.
    ///
    /// The slot is replaced wholesale on the initial snapshot and after every
    /// change to the history collection, so removed records disappear too.
    /// Read failures are logged and leave the slot untouched until the next
    /// change, except a failed first read, which publishes `[default_message]`.
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    /// Returns an error if the history path cannot be built for `user`.
    pub fn watch_messages(
        &self,
        user: &UserId,
        slot: watch::Sender<Vec<ChatMessage>>,
        default_message: ChatMessage,
    ) -> HistoryResult<WatchHandle> {
        let query = Query::collection(self.paths().history(user)?)
            .order_by(CREATED_AT, Direction::Ascending);
        let listener = SnapshotListener::new(self.document_store(), query);
        let shutdown = Arc::new(Notify::new());
        let formatter = self.formatter().clone();
        let user = user.clone();

        let task = tokio::spawn(run_watch(
            listener,
            Arc::clone(&shutdown),
            slot,
            default_message,
            formatter,
            user,
        ));

        Ok(WatchHandle {
            shutdown,
            task: Some(task),
        })
    }
}

async fn run_watch(
    mut listener: SnapshotListener,
    shutdown: Arc<Notify>,
    slot: watch::Sender<Vec<ChatMessage>>,
    default_message: ChatMessage,
    formatter: TimestampFormatter,
    user: UserId,
) {
    info!(%user, collection = %listener.query().collection, "history watch started");
    let mut published = false;
    loop {
        tokio::select! {
            () = shutdown.notified() => {
                debug!(%user, "history watch cancelled");
                break;
            }
            snapshot = listener.next_snapshot() => match snapshot {
                Some(Ok(docs)) => {
                    let records = decode_snapshot(&docs);
                    let messages = project_records(&records, &default_message, &formatter);
                    debug!(%user, messages = messages.len(), "history snapshot projected");
                    slot.send_replace(messages);
                    published = true;
                }
                Some(Err(err)) if !published => {
                    warn!(%user, error = %err, "initial history snapshot failed, showing default only");
                    slot.send_replace(vec![default_message.clone()]);
                    published = true;
                }
                Some(Err(err)) => {
                    warn!(%user, error = %err, "history snapshot failed, keeping last list");
                }
                None => {
                    info!(%user, "change feed closed, history watch stopped");
                    break;
                }
            },
        }
    }
}

fn decode_snapshot(docs: &[Document]) -> Vec<(DocumentId, ConversationRecord)> {
    docs.iter()
        .filter_map(|doc| match decode_conversation(doc) {
            Ok(record) => Some((doc.id.clone(), record)),
            Err(err) => {
                warn!(path = %doc.path, error = %err, "skipping malformed conversation record");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::broadcast;
    use tokio::time::timeout;

    use super::*;
    use crate::history::core::config::HistoryConfig;
    use crate::history::core::errors::HistoryError;
    use crate::history::core::types::{ChatPair, FeedbackKind, Sender};
    use crate::history::document::memory_store::InMemoryDocumentStore;
    use crate::history::document::model::WriteData;
    use crate::history::document::path::{CollectionPath, DocumentPath};
    use crate::history::document::store::{ChangeEvent, DocumentStore, StoreFuture};

    const WAIT: Duration = Duration::from_secs(2);

    fn setup() -> (ConversationStore, Arc<InMemoryDocumentStore>, UserId) {
        let backend = Arc::new(InMemoryDocumentStore::new());
        let store = ConversationStore::new(&HistoryConfig::default(), backend.clone()).unwrap();
        (store, backend, UserId::new("alice").unwrap())
    }

    #[tokio::test]
    async fn test_first_notification_is_default_only() {
        let (store, _, user) = setup();
        let welcome = ChatMessage::welcome("Hello!");
        let (tx, mut rx) = watch::channel(Vec::new());
        let handle = store.watch_messages(&user, tx, welcome.clone()).unwrap();

        let list = timeout(WAIT, rx.wait_for(|list| !list.is_empty()))
            .await
            .unwrap()
            .unwrap()
            .clone();
        assert_eq!(list, vec![welcome]);
        handle.cancel().await;
    }

    #[tokio::test]
    async fn test_appends_and_removals_replace_the_list() {
        let (store, backend, user) = setup();
        let welcome = ChatMessage::welcome("Hello!");
        let (tx, mut rx) = watch::channel(Vec::new());
        let handle = store.watch_messages(&user, tx, welcome.clone()).unwrap();

        let id = store
            .append_exchange(&user, &[ChatPair::new("q1", "a1").with_metadata("m")])
            .await
            .unwrap();
        let list = timeout(WAIT, rx.wait_for(|list| list.len() == 3))
            .await
            .unwrap()
            .unwrap()
            .clone();
        assert_eq!(list[0], welcome);
        assert_eq!(list[1].sender, Sender::User);
        assert_eq!(list[1].text, "q1");
        assert_eq!(list[2].sender, Sender::Ai);
        assert_eq!(list[2].docid, Some(id.clone()));
        assert!(list[2].created_at.is_some());

        store
            .append_exchange(&user, &[ChatPair::new("q2", "a2")])
            .await
            .unwrap();
        let list = timeout(WAIT, rx.wait_for(|list| list.len() == 5))
            .await
            .unwrap()
            .unwrap()
            .clone();
        assert_eq!(
            list.iter().filter(|msg| **msg == welcome).count(),
            1,
            "default message appears exactly once"
        );
        assert_eq!(list[3].text, "q2");

        backend
            .delete(store.paths().history_record(&user, &id).unwrap())
            .await
            .unwrap();
        let list = timeout(WAIT, rx.wait_for(|list| list.len() == 3))
            .await
            .unwrap()
            .unwrap()
            .clone();
        assert_eq!(list[1].text, "q2");

        handle.cancel().await;
    }

    #[tokio::test]
    async fn test_record_feedback_field_reaches_ai_message() {
        let (store, backend, user) = setup();
        backend
            .add(
                store.paths().history(&user).unwrap(),
                WriteData::new()
                    .field("messagePairs", serde_json::json!([{"user": "q", "ai": "a"}]))
                    .field("feedback", "like")
                    .server_timestamp("createdAt"),
            )
            .await
            .unwrap();

        let (tx, mut rx) = watch::channel(Vec::new());
        let handle = store
            .watch_messages(&user, tx, ChatMessage::welcome("hi"))
            .unwrap();
        let list = timeout(WAIT, rx.wait_for(|list| list.len() == 3))
            .await
            .unwrap()
            .unwrap()
            .clone();
        assert_eq!(list[1].feedback, None);
        assert_eq!(list[2].feedback, Some(FeedbackKind::Like));
        handle.cancel().await;
    }

    #[tokio::test]
    async fn test_malformed_records_are_skipped() {
        let (store, backend, user) = setup();
        let history = store.paths().history(&user).unwrap();
        backend
            .add(history.clone(), WriteData::new().field("messagePairs", 42))
            .await
            .unwrap();
        store
            .append_exchange(&user, &[ChatPair::new("q", "a")])
            .await
            .unwrap();

        let (tx, mut rx) = watch::channel(Vec::new());
        let handle = store
            .watch_messages(&user, tx, ChatMessage::welcome("hi"))
            .unwrap();
        let list = timeout(WAIT, rx.wait_for(|list| !list.is_empty()))
            .await
            .unwrap()
            .unwrap()
            .clone();
        assert_eq!(list.len(), 3);
        handle.cancel().await;
    }

    /// Delegates writes to an in-memory store while every query fails.
    struct UnreadableStore {
        inner: InMemoryDocumentStore,
    }

    impl DocumentStore for UnreadableStore {
        fn add(
            &self,
            collection: CollectionPath,
            data: WriteData,
        ) -> StoreFuture<'_, HistoryResult<DocumentId>> {
            self.inner.add(collection, data)
        }

        fn set(&self, path: DocumentPath, data: WriteData) -> StoreFuture<'_, HistoryResult<()>> {
            self.inner.set(path, data)
        }

        fn get(&self, path: DocumentPath) -> StoreFuture<'_, HistoryResult<Option<Document>>> {
            self.inner.get(path)
        }

        fn delete(&self, path: DocumentPath) -> StoreFuture<'_, HistoryResult<()>> {
            self.inner.delete(path)
        }

        fn query(&self, _query: Query) -> StoreFuture<'_, HistoryResult<Vec<Document>>> {
            Box::pin(async {
                Err::<Vec<Document>, _>(HistoryError::Backend("unavailable".into()))
            })
        }

        fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
            self.inner.changes()
        }
    }

    #[tokio::test]
    async fn test_failed_first_read_still_shows_default() {
        let backend = Arc::new(UnreadableStore {
            inner: InMemoryDocumentStore::new(),
        });
        let store = ConversationStore::new(&HistoryConfig::default(), backend).unwrap();
        let user = UserId::new("alice").unwrap();
        let welcome = ChatMessage::welcome("Hello!");
        let (tx, mut rx) = watch::channel(Vec::new());
        let handle = store.watch_messages(&user, tx, welcome.clone()).unwrap();

        let list = timeout(WAIT, rx.wait_for(|list| !list.is_empty()))
            .await
            .unwrap()
            .unwrap()
            .clone();
        assert_eq!(list, vec![welcome.clone()]);

        // Later failures keep the list as it was.
        store
            .append_exchange(&user, &[ChatPair::new("q", "a")])
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*rx.borrow(), vec![welcome]);
        assert!(!handle.is_finished());
        handle.cancel().await;
    }

    #[tokio::test]
    async fn test_cancel_stops_updates() {
        let (store, _, user) = setup();
        let (tx, mut rx) = watch::channel(Vec::new());
        let handle = store
            .watch_messages(&user, tx, ChatMessage::welcome("hi"))
            .unwrap();
        timeout(WAIT, rx.wait_for(|list| list.len() == 1))
            .await
            .unwrap()
            .unwrap();

        handle.cancel().await;
        store
            .append_exchange(&user, &[ChatPair::new("q", "a")])
            .await
            .unwrap();

        // The sender was dropped with the task, so the channel reports closed.
        assert!(rx.changed().await.is_err());
        assert_eq!(rx.borrow().len(), 1);
    }
}
