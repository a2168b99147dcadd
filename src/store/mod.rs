//! ClinicDesk Document Store
//!
//! Named collections of schemaless JSON documents behind the
//! [`DocumentStore`] trait:
//!
//! - **document**: `Document`, typed `Record`/`Stored`/`Collection` helpers
//! - **memory**: in-process store (tests, demos, single-node deployments)
//! - **sqlite**: persistent store backed by a single SQLite file
//! - **error**: Error types
//!
//! The store offers only get-all / get / create / set / update / delete per
//! collection plus a change feed. There is no server-side querying,
//! pagination or transaction support; callers load whole collections and
//! work in memory.
//!
//! # Example
//!
//! ```rust,no_run
//! use clinicdesk::store::{DocumentStore, MemoryStore};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryStore::new();
//!     let fields = json!({"name": "Consultorio 1"}).as_object().cloned().unwrap();
//!     let id = store.create("offices", fields).await?;
//!     let office = store.get("offices", &id).await?;
//!     assert!(office.is_some());
//!     Ok(())
//! }
//! ```

pub mod document;
pub mod error;
pub mod memory;
pub mod sqlite;
#[cfg(test)]
pub(crate) mod testing;

pub use document::{to_fields, Collection, Document, Fields, Record, Stored};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast;

/// Capacity of the change feed channel
pub const CHANGE_FEED_CAPACITY: usize = 256;

/// Kind of change applied to a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// A change published on the store's change feed
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub collection: String,
    pub id: String,
    pub kind: ChangeKind,
    /// Document after the change (`None` for deletes)
    pub document: Option<Document>,
}

/// Generic document database operations per named collection
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch every document of a collection, in insertion order
    async fn get_all(&self, collection: &str) -> StoreResult<Vec<Document>>;

    /// Fetch one document
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    /// Insert a document under a fresh id and return the id
    async fn create(&self, collection: &str, fields: Fields) -> StoreResult<String>;

    /// Create or fully overwrite the document with the given id
    async fn set(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()>;

    /// Overwrite the given top-level fields of an existing document
    async fn update(&self, collection: &str, id: &str, patch: Fields) -> StoreResult<()>;

    /// Delete a document; returns whether it existed
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool>;

    /// Subscribe to changes across all collections
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;

    /// Short backend name for health reporting
    fn backend(&self) -> &'static str;
}

/// Generate a fresh document id
pub fn new_document_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Collection names are non-empty identifiers made of `[A-Za-z0-9_-]`
pub fn validate_collection(name: &str) -> StoreResult<()> {
    let valid = !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidCollection(name.to_string()))
    }
}
