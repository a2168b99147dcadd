//! Payment registration
//!
//! Registering a payment touches up to three documents: the new payment,
//! the invoice it settles and the consultation linked to that invoice.
//! The writes run as a saga and the `invoice_paid` notification is only
//! emitted once all of them have been applied.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::invoices::{Invoice, InvoiceService, InvoiceStatus};
use crate::clinic::consultations::Consultation;
use crate::clinic::form::text;
use crate::clinic::notifications::NotificationType;
use crate::crud::{ServiceError, ServiceResult};
use crate::saga::Saga;
use crate::store::{to_fields, Collection, Fields, Record, Stored};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    Transfer,
    Check,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Transfer => "transfer",
            PaymentMethod::Check => "check",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentState {
    #[default]
    Completed,
    Refunded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub invoice_id: String,
    pub amount: f64,
    pub method: PaymentMethod,
    #[serde(default)]
    pub status: PaymentState,
    #[serde(default)]
    pub notes: String,
    pub payment_date: DateTime<Utc>,
    #[serde(default)]
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Record for Payment {
    const COLLECTION: &'static str = "payments";
}

/// Submitted payment; the amount defaults to the invoice total
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaymentForm {
    pub amount: Option<f64>,
    pub method: Option<PaymentMethod>,
    pub notes: Option<String>,
}

/// Outcome of a registered payment
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub payment: Stored<Payment>,
    pub invoice_id: String,
    pub invoice_number: String,
    /// Consultation marked as paid, if the invoice had one
    pub consultation_id: Option<String>,
}

impl InvoiceService {
    /// Payments recorded against an invoice, oldest first
    pub async fn payments_for(&self, invoice_id: &str) -> ServiceResult<Vec<Stored<Payment>>> {
        let payments: Collection<Payment> = Collection::new(self.ctx.store.clone());
        let mut items: Vec<_> = payments
            .all()
            .await?
            .into_iter()
            .filter(|p| p.invoice_id == invoice_id)
            .collect();
        items.sort_by_key(|p| p.payment_date);
        Ok(items)
    }

    /// Record a payment, mark the invoice paid and settle its consultation
    pub async fn register_payment(
        &self,
        invoice_id: &str,
        form: &PaymentForm,
        actor: &str,
    ) -> ServiceResult<PaymentReceipt> {
        let invoice = self.get(invoice_id).await?;
        if invoice.status == InvoiceStatus::Paid {
            return Err(ServiceError::invalid("status", "La factura ya está pagada"));
        }

        let amount = form.amount.unwrap_or(invoice.total);
        if amount <= 0.0 {
            return Err(ServiceError::invalid("amount", "El monto debe ser mayor a 0"));
        }
        let method = form.method.unwrap_or_default();

        let consultations: Collection<Consultation> = Collection::new(self.ctx.store.clone());
        let linked = consultations
            .all()
            .await?
            .into_iter()
            .find(|c| c.invoice_id.as_deref() == Some(invoice_id));

        let now = Utc::now();
        let payment = Payment {
            invoice_id: invoice_id.to_string(),
            amount,
            method,
            status: PaymentState::Completed,
            notes: text(&form.notes),
            payment_date: now,
            created_by: actor.to_string(),
            created_at: Some(now),
        };

        let mut saga = Saga::new("register_payment", self.ctx.store.clone());
        let payment_id = saga
            .create("create_payment", Payment::COLLECTION, to_fields(&payment)?)
            .await?;
        saga.update(
            "mark_invoice_paid",
            Invoice::COLLECTION,
            invoice_id,
            patch([
                ("status", json!(InvoiceStatus::Paid.as_str())),
                ("paidDate", json!(now)),
                ("updatedAt", json!(now)),
            ]),
        )
        .await?;
        if let Some(consultation) = &linked {
            saga.update(
                "settle_consultation",
                Consultation::COLLECTION,
                &consultation.id,
                patch([
                    ("paymentStatus", json!("paid")),
                    ("amount", json!(amount)),
                    ("paymentMethod", json!(method.as_str())),
                    ("updatedAt", json!(now)),
                ]),
            )
            .await?;
        }
        saga.commit();

        tracing::info!(
            invoice = %invoice_id,
            payment = %payment_id,
            amount,
            method = method.as_str(),
            consultation = ?linked.as_ref().map(|c| &c.id),
            "Payment registered"
        );

        self.ctx
            .notifications
            .notify(
                actor,
                NotificationType::InvoicePaid,
                "Factura pagada",
                &format!(
                    "La factura {} ha sido marcada como pagada.",
                    invoice.invoice_number
                ),
                Some(invoice_id),
            )
            .await;

        Ok(PaymentReceipt {
            payment: Stored {
                id: payment_id,
                record: payment,
            },
            invoice_id: invoice_id.to_string(),
            invoice_number: invoice.record.invoice_number,
            consultation_id: linked.map(|c| c.id),
        })
    }
}

pub(super) fn patch<const N: usize>(entries: [(&str, Value); N]) -> Fields {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::invoices::InvoiceForm;
    use crate::clinic::notifications::NotificationService;
    use crate::clinic::ServiceContext;
    use crate::store::testing::{FlakyStore, WriteOp};
    use crate::store::{DocumentStore, MemoryStore};
    use std::sync::Arc;

    fn invoice_form() -> InvoiceForm {
        serde_json::from_value(json!({
            "patientName": "Ana",
            "description": "Consulta",
            "amount": 1000,
            "issueDate": "2024-03-05",
            "dueDate": "2024-04-05"
        }))
        .unwrap()
    }

    async fn link_consultation(store: &dyn DocumentStore, invoice_id: &str) -> String {
        let fields = json!({
            "patientName": "Ana",
            "date": "2024-03-05T10:00:00Z",
            "duration": 60,
            "status": "completed",
            "invoiceId": invoice_id
        });
        store
            .create("consultations", fields.as_object().cloned().unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_payment_marks_invoice_and_consultation_paid() {
        let store = Arc::new(MemoryStore::new());
        let service = InvoiceService::new(ServiceContext::new(store.clone()));
        let invoice = service.create(&invoice_form(), "u1").await.unwrap();
        let consultation_id = link_consultation(store.as_ref(), &invoice.id).await;

        let form = PaymentForm {
            method: Some(PaymentMethod::Card),
            ..Default::default()
        };
        let receipt = service.register_payment(&invoice.id, &form, "u1").await.unwrap();
        assert_eq!(receipt.consultation_id.as_deref(), Some(consultation_id.as_str()));
        assert!((receipt.payment.amount - 1160.0).abs() < 1e-9);

        let paid = service.get(&invoice.id).await.unwrap();
        assert_eq!(paid.status, InvoiceStatus::Paid);
        assert!(paid.paid_date.is_some());

        let consultation = store
            .get("consultations", &consultation_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(consultation.get_str("paymentStatus"), Some("paid"));
        assert_eq!(consultation.get_str("paymentMethod"), Some("card"));

        assert_eq!(service.payments_for(&invoice.id).await.unwrap().len(), 1);

        let notifications = NotificationService::new(store.clone());
        let items = notifications.list_for_user("u1").await.unwrap();
        assert!(items.iter().any(|n| n.kind == NotificationType::InvoicePaid));

        let again = service.register_payment(&invoice.id, &form, "u1").await.unwrap_err();
        assert!(matches!(again, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_failed_settlement_rolls_back() {
        let store = Arc::new(FlakyStore::new());
        let service = InvoiceService::new(ServiceContext::new(store.clone()));
        let invoice = service.create(&invoice_form(), "u1").await.unwrap();
        link_consultation(store.as_ref(), &invoice.id).await;

        store.fail_on(WriteOp::Update, "consultations");
        let err = service
            .register_payment(&invoice.id, &PaymentForm::default(), "u1")
            .await
            .unwrap_err();
        match err {
            ServiceError::Saga(e) => {
                assert_eq!(e.step, "settle_consultation");
                assert_eq!(e.compensated, vec!["mark_invoice_paid", "create_payment"]);
                assert!(e.is_retryable());
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let invoice = service.get(&invoice.id).await.unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Pending);
        assert!(invoice.paid_date.is_none());
        assert!(service.payments_for(&invoice.id).await.unwrap().is_empty());

        let notifications = NotificationService::new(store.clone());
        let items = notifications.list_for_user("u1").await.unwrap();
        assert!(!items.iter().any(|n| n.kind == NotificationType::InvoicePaid));
    }

    #[tokio::test]
    async fn test_rejects_non_positive_amount() {
        let service = InvoiceService::new(ServiceContext::new(Arc::new(MemoryStore::new())));
        let invoice = service.create(&invoice_form(), "u1").await.unwrap();
        let form = PaymentForm {
            amount: Some(0.0),
            ..Default::default()
        };
        let err = service.register_payment(&invoice.id, &form, "u1").await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }
}
