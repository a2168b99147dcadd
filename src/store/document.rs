//! Documents and typed records
//!
//! A [`Document`] is a schemaless JSON object plus the id assigned by the
//! store. Typed records implement [`Record`] and are read back as
//! [`Stored<T>`], which carries the id next to the record body.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use super::error::{StoreError, StoreResult};
use super::DocumentStore;

/// Top-level fields of a document
pub type Fields = serde_json::Map<String, Value>;

/// A schemaless document as returned by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Store-assigned identifier
    pub id: String,
    /// Document body (never contains `id`)
    #[serde(flatten)]
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, mut fields: Fields) -> Self {
        fields.remove("id");
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Get a field value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Get a field as a string slice
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Decode into a typed record
    pub fn decode<T: DeserializeOwned>(self, collection: &str) -> StoreResult<Stored<T>> {
        let id = self.id;
        let record = serde_json::from_value(Value::Object(self.fields)).map_err(|e| {
            StoreError::InvalidDocument {
                collection: collection.to_string(),
                id: id.clone(),
                reason: e.to_string(),
            }
        })?;
        Ok(Stored { id, record })
    }
}

/// Serialize a value into document fields
///
/// Fails when the value does not serialize to a JSON object.
pub fn to_fields<T: Serialize>(value: &T) -> StoreResult<Fields> {
    match serde_json::to_value(value)? {
        Value::Object(mut map) => {
            map.remove("id");
            Ok(map)
        }
        other => Err(StoreError::Serialization(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A record type bound to a named collection
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection the record lives in
    const COLLECTION: &'static str;
}

/// A typed record together with its document id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stored<T> {
    pub id: String,
    #[serde(flatten)]
    pub record: T,
}

impl<T> Deref for Stored<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.record
    }
}

impl<T> DerefMut for Stored<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.record
    }
}

/// Typed view over one collection of a [`DocumentStore`]
pub struct Collection<T> {
    store: Arc<dyn DocumentStore>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _marker: PhantomData,
        }
    }
}

impl<T: Record> Collection<T> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        T::COLLECTION
    }

    /// Load every record; documents that do not decode are skipped
    pub async fn all(&self) -> StoreResult<Vec<Stored<T>>> {
        let docs = self.store.get_all(T::COLLECTION).await?;
        let mut records = Vec::with_capacity(docs.len());

        for doc in docs {
            match doc.decode::<T>(T::COLLECTION) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(error = %e, "Skipping malformed document"),
            }
        }

        Ok(records)
    }

    pub async fn get(&self, id: &str) -> StoreResult<Option<Stored<T>>> {
        match self.store.get(T::COLLECTION, id).await? {
            Some(doc) => Ok(Some(doc.decode(T::COLLECTION)?)),
            None => Ok(None),
        }
    }

    /// Get a record or fail with [`StoreError::NotFound`]
    pub async fn require(&self, id: &str) -> StoreResult<Stored<T>> {
        self.get(id)
            .await?
            .ok_or_else(|| StoreError::not_found(T::COLLECTION, id))
    }

    pub async fn create(&self, record: &T) -> StoreResult<String> {
        self.store.create(T::COLLECTION, to_fields(record)?).await
    }

    pub async fn set(&self, id: &str, record: &T) -> StoreResult<()> {
        self.store.set(T::COLLECTION, id, to_fields(record)?).await
    }

    pub async fn update(&self, id: &str, patch: Fields) -> StoreResult<()> {
        self.store.update(T::COLLECTION, id, patch).await
    }

    pub async fn delete(&self, id: &str) -> StoreResult<bool> {
        self.store.delete(T::COLLECTION, id).await
    }
}
