//! SQLite document store
//!
//! All collections share one `documents` table; bodies are stored as JSON
//! text. The connection sits behind a `std::sync::Mutex` because a SQLite
//! connection cannot be shared between threads; no lock is held across an
//! await point.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;

use super::document::{Document, Fields};
use super::error::{StoreError, StoreResult};
use super::{
    new_document_id, validate_collection, ChangeEvent, ChangeKind, DocumentStore,
    CHANGE_FEED_CAPACITY,
};

const SCHEMA: &str = "
    PRAGMA journal_mode = WAL;
    CREATE TABLE IF NOT EXISTS documents (
        seq        INTEGER PRIMARY KEY AUTOINCREMENT,
        collection TEXT NOT NULL,
        id         TEXT NOT NULL,
        body       TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (collection, id)
    );
    CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents (collection, seq);
";

/// Document store persisted in a SQLite database file
pub struct SqliteStore {
    conn: Mutex<Connection>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl SqliteStore {
    /// Open (or create) a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        tracing::info!(path = ?path, "Opened SQLite document store");
        Self::with_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);

        Ok(Self {
            conn: Mutex::new(conn),
            changes,
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }

    fn publish(&self, collection: &str, id: &str, kind: ChangeKind, fields: Option<Fields>) {
        let _ = self.changes.send(ChangeEvent {
            collection: collection.to_string(),
            id: id.to_string(),
            kind,
            document: fields.map(|f| Document::new(id, f)),
        });
    }
}

fn parse_body(collection: &str, id: &str, body: &str) -> StoreResult<Fields> {
    serde_json::from_str::<Fields>(body).map_err(|e| StoreError::InvalidDocument {
        collection: collection.to_string(),
        id: id.to_string(),
        reason: e.to_string(),
    })
}

fn read_body(conn: &Connection, collection: &str, id: &str) -> StoreResult<Option<Fields>> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id],
            |row| row.get(0),
        )
        .optional()?;

    body.map(|b| parse_body(collection, id, &b)).transpose()
}

fn upsert(conn: &Connection, collection: &str, id: &str, fields: &Fields) -> StoreResult<()> {
    let body = serde_json::to_string(fields)?;
    conn.execute(
        "INSERT INTO documents (collection, id, body, updated_at) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (collection, id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
        params![collection, id, body, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get_all(&self, collection: &str) -> StoreResult<Vec<Document>> {
        validate_collection(collection)?;
        let conn = self.lock()?;

        let mut stmt =
            conn.prepare("SELECT id, body FROM documents WHERE collection = ?1 ORDER BY seq")?;
        let rows = stmt
            .query_map(params![collection], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, body)| {
                let fields = parse_body(collection, &id, &body)?;
                Ok(Document::new(id, fields))
            })
            .collect()
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        validate_collection(collection)?;
        let conn = self.lock()?;

        Ok(read_body(&conn, collection, id)?.map(|fields| Document::new(id, fields)))
    }

    async fn create(&self, collection: &str, mut fields: Fields) -> StoreResult<String> {
        validate_collection(collection)?;
        fields.remove("id");
        let id = new_document_id();

        {
            let conn = self.lock()?;
            upsert(&conn, collection, &id, &fields)?;
        }

        tracing::debug!(collection = %collection, id = %id, "Document created");
        self.publish(collection, &id, ChangeKind::Created, Some(fields));
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, mut fields: Fields) -> StoreResult<()> {
        validate_collection(collection)?;
        fields.remove("id");

        let existed = {
            let conn = self.lock()?;
            let existed = read_body(&conn, collection, id)?.is_some();
            upsert(&conn, collection, id, &fields)?;
            existed
        };

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
            let conn = self.lock()?;
            let mut fields = read_body(&conn, collection, id)?
                .ok_or_else(|| StoreError::not_found(collection, id))?;

            for (key, value) in patch {
                if key != "id" {
                    fields.insert(key, value);
                }
            }
            upsert(&conn, collection, id, &fields)?;
            fields
        };

        self.publish(collection, id, ChangeKind::Updated, Some(merged));
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        validate_collection(collection)?;

        let affected = {
            let conn = self.lock()?;
            conn.execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
            )?
        };

        if affected > 0 {
            tracing::debug!(collection = %collection, id = %id, "Document deleted");
            self.publish(collection, id, ChangeKind::Deleted, None);
        }
        Ok(affected > 0)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_roundtrip_in_memory() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store
            .create("offices", fields(json!({"name": "Sala 2", "capacity": 4})))
            .await
            .unwrap();

        let doc = store.get("offices", &id).await.unwrap().unwrap();
        assert_eq!(doc.get_str("name"), Some("Sala 2"));
        assert_eq!(doc.get("capacity"), Some(&json!(4)));
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("clinic.db");

        let id = {
            let store = SqliteStore::open(&path).unwrap();
            store
                .create("patients", fields(json!({"title": "Ana"})))
                .await
                .unwrap()
        };

        let store = SqliteStore::open(&path).unwrap();
        let docs = store.get_all("patients").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, id);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store
            .create("invoices", fields(json!({"status": "pending", "total": 10})))
            .await
            .unwrap();

        store
            .update("invoices", &id, fields(json!({"status": "paid"})))
            .await
            .unwrap();
        let doc = store.get("invoices", &id).await.unwrap().unwrap();
        assert_eq!(doc.get_str("status"), Some("paid"));
        assert_eq!(doc.get("total"), Some(&json!(10)));

        assert!(store.delete("invoices", &id).await.unwrap());
        assert!(!store.delete("invoices", &id).await.unwrap());
        assert!(store
            .update("invoices", &id, Fields::new())
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_set_keeps_position() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("users", "a", fields(json!({"n": 1}))).await.unwrap();
        store.set("users", "b", fields(json!({"n": 2}))).await.unwrap();
        store.set("users", "a", fields(json!({"n": 3}))).await.unwrap();

        let ids: Vec<String> = store
            .get_all("users")
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
