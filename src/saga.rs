//! Multi-step writes with compensation
//!
//! A [`Saga`] runs a sequence of store writes and journals how to undo each
//! one. When a step fails, the journal is replayed in reverse and the
//! returned [`SagaError`] says which step failed and whether every earlier
//! step was rolled back.
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use clinicdesk::saga::{Saga, SagaError};
//! # use clinicdesk::store::{DocumentStore, Fields};
//! # async fn run(store: Arc<dyn DocumentStore>) -> Result<(), SagaError> {
//! let mut saga = Saga::new("register_payment", store);
//! let payment_id = saga.create("create_payment", "payments", Fields::new()).await?;
//! saga.update("mark_invoice_paid", "invoices", "inv-1", Fields::new()).await?;
//! saga.commit();
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use crate::store::{Document, DocumentStore, Fields, StoreError};

/// How to revert one applied step
#[derive(Debug, Clone, PartialEq)]
pub enum Undo {
    /// Remove a document the step created
    Delete { collection: String, id: String },
    /// Put back the document as it was before the step
    Restore {
        collection: String,
        document: Document,
    },
}

#[derive(Debug, Clone)]
struct JournalEntry {
    step: String,
    undo: Option<Undo>,
}

/// A compensation that could not be applied
#[derive(Debug, Clone, PartialEq)]
pub struct CompensationFailure {
    pub step: String,
    pub error: String,
}

/// A saga step failed
#[derive(Debug, thiserror::Error)]
#[error("Saga {saga} failed at step {step}: {source}")]
pub struct SagaError {
    pub saga: &'static str,
    /// Step that failed
    pub step: String,
    #[source]
    pub source: StoreError,
    /// Earlier steps that were rolled back, most recent first
    pub compensated: Vec<String>,
    /// Earlier steps whose rollback failed
    pub residue: Vec<CompensationFailure>,
}

impl SagaError {
    /// The store is back to its pre-saga state, so the whole saga may be retried
    pub fn is_retryable(&self) -> bool {
        self.residue.is_empty()
    }
}

/// Journaled sequence of document writes
pub struct Saga {
    name: &'static str,
    store: Arc<dyn DocumentStore>,
    journal: Vec<JournalEntry>,
}

impl Saga {
    pub fn new(name: &'static str, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            name,
            store,
            journal: Vec::new(),
        }
    }

    /// Create a document; compensated by deleting it
    pub async fn create(
        &mut self,
        step: &str,
        collection: &str,
        fields: Fields,
    ) -> Result<String, SagaError> {
        match self.store.create(collection, fields).await {
            Ok(id) => {
                self.record(
                    step,
                    Some(Undo::Delete {
                        collection: collection.to_string(),
                        id: id.clone(),
                    }),
                );
                Ok(id)
            }
            Err(e) => Err(self.abort(step, e).await),
        }
    }

    /// Merge fields into an existing document; compensated by restoring the snapshot
    pub async fn update(
        &mut self,
        step: &str,
        collection: &str,
        id: &str,
        patch: Fields,
    ) -> Result<(), SagaError> {
        let snapshot = match self.snapshot(collection, id).await {
            Ok(Some(doc)) => doc,
            Ok(None) => return Err(self.abort(step, StoreError::not_found(collection, id)).await),
            Err(e) => return Err(self.abort(step, e).await),
        };

        match self.store.update(collection, id, patch).await {
            Ok(()) => {
                self.record(
                    step,
                    Some(Undo::Restore {
                        collection: collection.to_string(),
                        document: snapshot,
                    }),
                );
                Ok(())
            }
            Err(e) => Err(self.abort(step, e).await),
        }
    }

    /// Delete a document; compensated by restoring the snapshot
    ///
    /// Returns whether the document existed. Deleting a missing document
    /// is not a failure.
    pub async fn delete(
        &mut self,
        step: &str,
        collection: &str,
        id: &str,
    ) -> Result<bool, SagaError> {
        let snapshot = match self.snapshot(collection, id).await {
            Ok(snapshot) => snapshot,
            Err(e) => return Err(self.abort(step, e).await),
        };

        match self.store.delete(collection, id).await {
            Ok(existed) => {
                let undo = snapshot.map(|document| Undo::Restore {
                    collection: collection.to_string(),
                    document,
                });
                self.record(step, undo);
                Ok(existed)
            }
            Err(e) => Err(self.abort(step, e).await),
        }
    }

    /// Finish the saga; returns the names of the applied steps
    pub fn commit(self) -> Vec<String> {
        let steps: Vec<String> = self.journal.into_iter().map(|e| e.step).collect();
        tracing::debug!(saga = %self.name, steps = steps.len(), "Saga committed");
        steps
    }

    fn record(&mut self, step: &str, undo: Option<Undo>) {
        self.journal.push(JournalEntry {
            step: step.to_string(),
            undo,
        });
    }

    async fn snapshot(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.store.get(collection, id).await
    }

    /// Roll back every journaled step in reverse order
    async fn abort(&mut self, step: &str, source: StoreError) -> SagaError {
        tracing::warn!(saga = %self.name, step = %step, error = %source, "Saga step failed, compensating");

        let mut compensated = Vec::new();
        let mut residue = Vec::new();

        while let Some(entry) = self.journal.pop() {
            let result = match &entry.undo {
                None => Ok(()),
                Some(Undo::Delete { collection, id }) => {
                    self.store.delete(collection, id).await.map(|_| ())
                }
                Some(Undo::Restore {
                    collection,
                    document,
                }) => {
                    self.store
                        .set(collection, &document.id, document.fields.clone())
                        .await
                }
            };

            match result {
                Ok(()) => compensated.push(entry.step),
                Err(e) => {
                    tracing::error!(
                        saga = %self.name,
                        step = %entry.step,
                        error = %e,
                        "Compensation failed"
                    );
                    residue.push(CompensationFailure {
                        step: entry.step,
                        error: e.to_string(),
                    });
                }
            }
        }

        SagaError {
            saga: self.name,
            step: step.to_string(),
            source,
            compensated,
            residue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::{FlakyStore, WriteOp};
    use serde_json::json;

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_commit_keeps_all_writes() {
        let store = Arc::new(FlakyStore::new());
        let invoice = store
            .create("invoices", fields(json!({"status": "pending"})))
            .await
            .unwrap();

        let mut saga = Saga::new("pay", store.clone());
        saga.create("payment", "payments", fields(json!({"amount": 10})))
            .await
            .unwrap();
        saga.update("invoice", "invoices", &invoice, fields(json!({"status": "paid"})))
            .await
            .unwrap();
        assert_eq!(saga.commit(), vec!["payment", "invoice"]);

        assert_eq!(store.inner.count("payments").await, 1);
        let doc = store.get("invoices", &invoice).await.unwrap().unwrap();
        assert_eq!(doc.get_str("status"), Some("paid"));
    }

    #[tokio::test]
    async fn test_failure_compensates_earlier_steps() {
        let store = Arc::new(FlakyStore::new());
        let invoice = store
            .create("invoices", fields(json!({"status": "pending"})))
            .await
            .unwrap();
        store.fail_on(WriteOp::Update, "consultations");

        let mut saga = Saga::new("pay", store.clone());
        saga.create("payment", "payments", fields(json!({"amount": 10})))
            .await
            .unwrap();
        saga.update("invoice", "invoices", &invoice, fields(json!({"status": "paid"})))
            .await
            .unwrap();
        let consultation = store
            .inner
            .create("consultations", Fields::new())
            .await
            .unwrap();
        let err = saga
            .update(
                "consultation",
                "consultations",
                &consultation,
                fields(json!({"paymentStatus": "paid"})),
            )
            .await
            .unwrap_err();

        assert_eq!(err.step, "consultation");
        assert_eq!(err.compensated, vec!["invoice", "payment"]);
        assert!(err.is_retryable());

        assert_eq!(store.inner.count("payments").await, 0);
        let doc = store.get("invoices", &invoice).await.unwrap().unwrap();
        assert_eq!(doc.get_str("status"), Some("pending"));
    }

    #[tokio::test]
    async fn test_failed_compensation_is_residue() {
        let store = Arc::new(FlakyStore::new());
        let mut saga = Saga::new("pay", store.clone());
        saga.create("payment", "payments", Fields::new())
            .await
            .unwrap();

        store.fail_on(WriteOp::Delete, "payments");
        let err = saga
            .update("invoice", "invoices", "missing", Fields::new())
            .await
            .unwrap_err();

        assert!(err.source.is_not_found());
        assert!(!err.is_retryable());
        assert_eq!(err.residue.len(), 1);
        assert_eq!(err.residue[0].step, "payment");
    }

    #[tokio::test]
    async fn test_deleted_document_restored() {
        let store = Arc::new(FlakyStore::new());
        let consultation = store
            .create("consultations", fields(json!({"patientName": "Ana"})))
            .await
            .unwrap();
        store.fail_on(WriteOp::Delete, "invoices");

        let mut saga = Saga::new("cascade", store.clone());
        assert!(saga
            .delete("consultation", "consultations", &consultation)
            .await
            .unwrap());
        let err = saga
            .delete("invoice", "invoices", "inv-1")
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        let restored = store
            .get("consultations", &consultation)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(restored.get_str("patientName"), Some("Ana"));
    }
}
