//! In-memory document store
//!
//! Thread-safe via Tokio's async RwLock. Collections keep insertion order so
//! `get_all` is stable across calls.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

use super::document::{Document, Fields};
use super::error::{StoreError, StoreResult};
use super::{
    new_document_id, validate_collection, ChangeEvent, ChangeKind, DocumentStore,
    CHANGE_FEED_CAPACITY,
};

#[derive(Debug, Default)]
struct CollectionData {
    /// Ids in insertion order
    order: Vec<String>,
    docs: HashMap<String, Fields>,
}

impl CollectionData {
    fn insert(&mut self, id: &str, fields: Fields) -> bool {
        let existed = self.docs.insert(id.to_string(), fields).is_some();
        if !existed {
            self.order.push(id.to_string());
        }
        existed
    }

    fn remove(&mut self, id: &str) -> bool {
        if self.docs.remove(id).is_some() {
            self.order.retain(|existing| existing != id);
            true
        } else {
            false
        }
    }
}

/// Document store held entirely in process memory
pub struct MemoryStore {
    collections: RwLock<HashMap<String, CollectionData>>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            collections: RwLock::new(HashMap::new()),
            changes,
        }
    }

    /// Number of documents in a collection
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|c| c.docs.len())
            .unwrap_or(0)
    }

    fn publish(&self, collection: &str, id: &str, kind: ChangeKind, fields: Option<Fields>) {
        // No receivers is fine
        let _ = self.changes.send(ChangeEvent {
            collection: collection.to_string(),
            id: id.to_string(),
            kind,
            document: fields.map(|f| Document::new(id, f)),
        });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_all(&self, collection: &str) -> StoreResult<Vec<Document>> {
        validate_collection(collection)?;
        let collections = self.collections.read().await;

        let docs = match collections.get(collection) {
            Some(data) => data
                .order
                .iter()
                .filter_map(|id| {
                    data.docs
                        .get(id)
                        .map(|fields| Document::new(id.clone(), fields.clone()))
                })
                .collect(),
            None => Vec::new(),
        };

        Ok(docs)
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        validate_collection(collection)?;
        let collections = self.collections.read().await;

        Ok(collections
            .get(collection)
            .and_then(|data| data.docs.get(id))
            .map(|fields| Document::new(id, fields.clone())))
    }

    async fn create(&self, collection: &str, mut fields: Fields) -> StoreResult<String> {
        validate_collection(collection)?;
        fields.remove("id");
        let id = new_document_id();

        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(&id, fields.clone());

        tracing::debug!(collection = %collection, id = %id, "Document created");
        self.publish(collection, &id, ChangeKind::Created, Some(fields));
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, mut fields: Fields) -> StoreResult<()> {
        validate_collection(collection)?;
        fields.remove("id");

        let existed = self
            .collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id, fields.clone());

        let kind = if existed {
            ChangeKind::Updated
        } else {
            ChangeKind::Created
        };
        self.publish(collection, id, kind, Some(fields));
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, patch: Fields) -> StoreResult<()> {
        validate_collection(collection)?;

        let merged = {
            let mut collections = self.collections.write().await;
            let fields = collections
                .get_mut(collection)
                .and_then(|data| data.docs.get_mut(id))
                .ok_or_else(|| StoreError::not_found(collection, id))?;

            for (key, value) in patch {
                if key != "id" {
                    fields.insert(key, value);
                }
            }
            fields.clone()
        };

        self.publish(collection, id, ChangeKind::Updated, Some(merged));
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        validate_collection(collection)?;

        let existed = self
            .collections
            .write()
            .await
            .get_mut(collection)
            .map(|data| data.remove(id))
            .unwrap_or(false);

        if existed {
            tracing::debug!(collection = %collection, id = %id, "Document deleted");
            self.publish(collection, id, ChangeKind::Deleted, None);
        }
        Ok(existed)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
