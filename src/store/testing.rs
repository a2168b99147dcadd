//! Fault-injecting store for tests

use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::broadcast;

use super::{ChangeEvent, Document, DocumentStore, Fields, MemoryStore, StoreError, StoreResult};

/// Write operation a [`FlakyStore`] can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Create,
    Set,
    Update,
    Delete,
}

/// A [`MemoryStore`] that fails selected writes on demand
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    failures: Mutex<Vec<(WriteOp, String)>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every `op` on `collection` until cleared
    pub fn fail_on(&self, op: WriteOp, collection: &str) {
        self.failures
            .lock()
            .unwrap()
            .push((op, collection.to_string()));
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    fn check(&self, op: WriteOp, collection: &str) -> StoreResult<()> {
        let failing = self
            .failures
            .lock()
            .unwrap()
            .iter()
            .any(|(o, c)| *o == op && c == collection);

        if failing {
            Err(StoreError::Unavailable(format!(
                "injected {:?} failure on {}",
                op, collection
            )))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn get_all(&self, collection: &str) -> StoreResult<Vec<Document>> {
        self.inner.get_all(collection).await
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        self.inner.get(collection, id).await
    }

    async fn create(&self, collection: &str, fields: Fields) -> StoreResult<String> {
        self.check(WriteOp::Create, collection)?;
        self.inner.create(collection, fields).await
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()> {
        self.check(WriteOp::Set, collection)?;
        self.inner.set(collection, id, fields).await
    }

    async fn update(&self, collection: &str, id: &str, patch: Fields) -> StoreResult<()> {
        self.check(WriteOp::Update, collection)?;
        self.inner.update(collection, id, patch).await
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        self.check(WriteOp::Delete, collection)?;
        self.inner.delete(collection, id).await
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.inner.subscribe()
    }

    fn backend(&self) -> &'static str {
        "flaky"
    }
}
