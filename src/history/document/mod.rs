//! Hierarchical document store layer.
//!
//! - `path`: collection and document addresses
//! - `model`: documents, writes and the server timestamp codec
//! - `store`: the `DocumentStore` trait and backend selection
//! - `memory_store`, `sqlite_store`: backends
//! - `listener`: live snapshots of a query

pub mod listener;
pub mod memory_store;
pub mod model;
pub mod path;
pub mod sqlite_store;
pub mod store;

pub use listener::SnapshotListener;
pub use memory_store::{Clock, InMemoryDocumentStore};
pub use model::{Document, DocumentData, WriteData, decode_timestamp, encode_timestamp};
pub use path::{CollectionPath, DocumentPath};
pub use sqlite_store::SqliteDocumentStore;
pub use store::{
    ChangeEvent, ChangeKind, Direction, DocumentStore, OrderBy, Query, StoreFuture,
    open_document_store,
};
