//! Consultations
//!
//! A consultation is a dated encounter that may carry billing fields
//! (`amount`, `paymentStatus`, `invoiceId`) once it has been invoiced.
//! Deleting a consultation also deletes its linked invoice; both deletes
//! run as one saga so a failure leaves neither half applied.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

use super::form::{self, required_date, required_time, text};
use super::notifications::NotificationType;
use super::{list_records, Listed, ServiceContext};
use crate::crud::listing::{compare_f64, compare_text, matches_search};
use crate::crud::{ListQuery, Page, ServiceResult, SortDirection, ValidationErrors};
use crate::saga::Saga;
use crate::store::{Collection, Record, Stored};

/// Collection holding invoices; consultations only reference it by id
const INVOICES: &str = "invoices";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConsultationStatus {
    #[default]
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl ConsultationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConsultationStatus::Scheduled => "scheduled",
            ConsultationStatus::InProgress => "in-progress",
            ConsultationStatus::Completed => "completed",
            ConsultationStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Consultation {
    pub patient_name: String,
    pub date: DateTime<Utc>,
    /// Minutes
    pub duration: u32,
    #[serde(default)]
    pub status: ConsultationStatus,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub treatment_plan: String,
    #[serde(default)]
    pub next_session_goals: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_id: Option<String>,
    #[serde(default)]
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for Consultation {
    const COLLECTION: &'static str = "consultations";
}

impl Consultation {
    pub fn end(&self) -> DateTime<Utc> {
        self.date + chrono::Duration::minutes(i64::from(self.duration))
    }
}

/// Submitted consultation form
///
/// `patientName` doubles as the session title; `date` and `time` are
/// entered separately and combined into one instant.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConsultationForm {
    pub patient_name: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub duration: Option<f64>,
    pub status: Option<ConsultationStatus>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub diagnosis: Option<String>,
    pub treatment_plan: Option<String>,
    pub next_session_goals: Option<String>,
}

impl ConsultationForm {
    pub fn validate(&self, actor: &str) -> Result<Consultation, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let patient_name = text(&self.patient_name);
        errors.check(
            patient_name.is_empty(),
            "patientName",
            "El título de la sesión es obligatorio",
        );
        let date = required_date(&mut errors, "date", &self.date, "Campo Fecha obligatorio");
        let time = required_time(&mut errors, "time", &self.time, "Campo Hora obligatorio");

        // Stored as whole minutes, so it must round to at least 1
        let minutes = self.duration.unwrap_or(0.0).round();
        errors.check(
            !minutes.is_finite() || minutes < 1.0,
            "duration",
            "Duración debe ser mayor a 0",
        );

        errors.into_result()?;

        let (Some(date), Some(time)) = (date, time) else {
            return Err(ValidationErrors::new());
        };

        Ok(Consultation {
            patient_name,
            date: form::at(date, time),
            duration: minutes as u32,
            status: self.status.unwrap_or_default(),
            reason: text(&self.reason),
            notes: text(&self.notes),
            diagnosis: text(&self.diagnosis),
            treatment_plan: text(&self.treatment_plan),
            next_session_goals: text(&self.next_session_goals),
            amount: None,
            payment_method: None,
            payment_status: PaymentStatus::Pending,
            invoice_id: None,
            created_by: actor.to_string(),
            created_at: None,
            updated_at: None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsultationSort {
    Date,
    Patient,
    Status,
    Payment,
    Amount,
}

impl FromStr for ConsultationSort {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "date" => Ok(ConsultationSort::Date),
            "patient" => Ok(ConsultationSort::Patient),
            "status" => Ok(ConsultationSort::Status),
            "payment" => Ok(ConsultationSort::Payment),
            "amount" => Ok(ConsultationSort::Amount),
            _ => Err(()),
        }
    }
}

impl Listed for Consultation {
    type SortKey = ConsultationSort;

    const DEFAULT_SORT: ConsultationSort = ConsultationSort::Date;
    const DEFAULT_DIRECTION: SortDirection = SortDirection::Desc;

    fn matches(&self, needle: &str) -> bool {
        matches_search(
            needle,
            [
                self.patient_name.clone(),
                self.reason.clone(),
                self.status.as_str().to_string(),
                self.payment_status.as_str().to_string(),
                self.amount.map(|a| a.to_string()).unwrap_or_default(),
                form::long_date_es(&self.date),
                form::clock(&self.date),
            ],
        )
    }

    fn compare(&self, other: &Self, key: ConsultationSort) -> Ordering {
        match key {
            ConsultationSort::Date => self.date.cmp(&other.date),
            ConsultationSort::Patient => compare_text(&self.patient_name, &other.patient_name),
            ConsultationSort::Status => self.status.as_str().cmp(other.status.as_str()),
            ConsultationSort::Payment => {
                self.payment_status.as_str().cmp(other.payment_status.as_str())
            }
            ConsultationSort::Amount => {
                compare_f64(self.amount.unwrap_or(0.0), other.amount.unwrap_or(0.0))
            }
        }
    }
}

/// Counters shown above the consultation list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConsultationSummary {
    pub scheduled: usize,
    pub completed: usize,
    /// Completed but not yet paid
    pub unpaid: usize,
    pub paid: usize,
}

impl ConsultationSummary {
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a Consultation>,
    {
        records.into_iter().fold(Self::default(), |mut s, c| {
            match c.status {
                ConsultationStatus::Scheduled => s.scheduled += 1,
                ConsultationStatus::Completed => {
                    s.completed += 1;
                    if c.payment_status == PaymentStatus::Pending {
                        s.unpaid += 1;
                    }
                }
                _ => {}
            }
            if c.payment_status == PaymentStatus::Paid {
                s.paid += 1;
            }
            s
        })
    }
}

#[derive(Clone)]
pub struct ConsultationService {
    ctx: ServiceContext,
    consultations: Collection<Consultation>,
}

impl ConsultationService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self {
            consultations: Collection::new(ctx.store.clone()),
            ctx,
        }
    }

    pub async fn all(&self) -> ServiceResult<Vec<Stored<Consultation>>> {
        Ok(self.consultations.all().await?)
    }

    pub async fn list(&self, query: &ListQuery) -> ServiceResult<Page<Stored<Consultation>>> {
        Ok(list_records(self.all().await?, query, self.ctx.page_size))
    }

    pub async fn summary(&self) -> ServiceResult<ConsultationSummary> {
        let all = self.all().await?;
        Ok(ConsultationSummary::from_records(all.iter().map(|c| &c.record)))
    }

    pub async fn get(&self, id: &str) -> ServiceResult<Stored<Consultation>> {
        Ok(self.consultations.require(id).await?)
    }

    pub async fn create(
        &self,
        form: &ConsultationForm,
        actor: &str,
    ) -> ServiceResult<Stored<Consultation>> {
        let mut record = form.validate(actor)?;
        let now = Utc::now();
        record.created_at = Some(now);
        record.updated_at = Some(now);

        let id = self.consultations.create(&record).await?;
        tracing::info!(id = %id, actor = %actor, "Consultation created");

        self.ctx
            .notifications
            .notify(
                actor,
                NotificationType::ConsultationCreated,
                "Nueva sesión registrada",
                &format!(
                    "La sesión \"{}\" ha sido registrada exitosamente.",
                    record.patient_name
                ),
                Some(&id),
            )
            .await;

        Ok(Stored { id, record })
    }

    /// Replace the submitted fields; billing fields and authorship are kept
    pub async fn update(
        &self,
        id: &str,
        form: &ConsultationForm,
        actor: &str,
    ) -> ServiceResult<Stored<Consultation>> {
        let existing = self.get(id).await?.record;
        let submitted = form.validate(actor)?;

        let record = Consultation {
            amount: existing.amount,
            payment_method: existing.payment_method,
            payment_status: existing.payment_status,
            invoice_id: existing.invoice_id,
            created_by: existing.created_by,
            created_at: existing.created_at,
            updated_at: Some(Utc::now()),
            ..submitted
        };

        self.consultations.set(id, &record).await?;
        tracing::info!(id = %id, actor = %actor, "Consultation updated");

        self.ctx
            .notifications
            .notify(
                actor,
                NotificationType::ConsultationUpdated,
                "Sesión actualizada",
                &format!(
                    "La sesión \"{}\" ha sido actualizada exitosamente.",
                    record.patient_name
                ),
                Some(id),
            )
            .await;

        Ok(Stored {
            id: id.to_string(),
            record,
        })
    }

    /// Delete a consultation together with its linked invoice
    pub async fn delete(&self, id: &str, actor: &str) -> ServiceResult<()> {
        let existing = self.get(id).await?;

        let mut saga = Saga::new("delete_consultation", self.ctx.store.clone());
        if let Some(invoice_id) = existing.invoice_id.as_deref() {
            saga.delete("delete_invoice", INVOICES, invoice_id).await?;
        }
        saga.delete("delete_consultation", Consultation::COLLECTION, id)
            .await?;
        saga.commit();

        tracing::info!(
            id = %id,
            invoice = ?existing.invoice_id,
            actor = %actor,
            "Consultation deleted"
        );

        self.ctx
            .notifications
            .notify(
                actor,
                NotificationType::ConsultationDeleted,
                "Consulta eliminada",
                &format!(
                    "La consulta con {} ha sido eliminada del sistema.",
                    existing.patient_name
                ),
                Some(id),
            )
            .await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crud::ServiceError;
    use crate::store::testing::{FlakyStore, WriteOp};
    use crate::store::{DocumentStore, MemoryStore};
    use serde_json::json;
    use std::sync::Arc;

    fn form(value: serde_json::Value) -> ConsultationForm {
        serde_json::from_value(value).unwrap()
    }

    fn sample(name: &str, date: &str, time: &str) -> ConsultationForm {
        form(json!({"patientName": name, "date": date, "time": time, "duration": 60}))
    }

    #[test]
    fn test_validate_messages() {
        let errors = form(json!({"duration": 0})).validate("u1").unwrap_err();
        assert_eq!(
            errors.get("patientName"),
            Some("El título de la sesión es obligatorio")
        );
        assert_eq!(errors.get("date"), Some("Campo Fecha obligatorio"));
        assert_eq!(errors.get("time"), Some("Campo Hora obligatorio"));
        assert_eq!(errors.get("duration"), Some("Duración debe ser mayor a 0"));
    }

    #[test]
    fn test_fractional_duration_rounds_to_whole_minutes() {
        let mut short = sample("Ana", "2024-03-05", "09:00");
        short.duration = Some(0.4);
        let errors = short.validate("u1").unwrap_err();
        assert_eq!(errors.get("duration"), Some("Duración debe ser mayor a 0"));

        let mut half = sample("Ana", "2024-03-05", "09:00");
        half.duration = Some(0.5);
        let c = half.validate("u1").unwrap();
        assert_eq!(c.duration, 1);
        assert!(c.end() > c.date);

        let mut odd = sample("Ana", "2024-03-05", "09:00");
        odd.duration = Some(44.6);
        assert_eq!(odd.validate("u1").unwrap().duration, 45);
    }

    #[test]
    fn test_date_and_time_combined() {
        let c = sample("Ana", "2024-03-05", "09:30").validate("u1").unwrap();
        assert_eq!(c.date.to_rfc3339(), "2024-03-05T09:30:00+00:00");
        assert_eq!(c.end().to_rfc3339(), "2024-03-05T10:30:00+00:00");
        assert_eq!(c.status, ConsultationStatus::Scheduled);
        assert_eq!(c.payment_status, PaymentStatus::Pending);
    }

    #[test]
    fn test_status_wire_names() {
        let status: ConsultationStatus = serde_json::from_value(json!("in-progress")).unwrap();
        assert_eq!(status, ConsultationStatus::InProgress);
    }

    #[tokio::test]
    async fn test_search_by_spanish_date_and_default_sort() {
        let service = ConsultationService::new(ServiceContext::new(Arc::new(MemoryStore::new())));
        service.create(&sample("Ana", "2024-03-05", "09:30"), "u1").await.unwrap();
        service.create(&sample("Luis", "2024-04-01", "11:00"), "u1").await.unwrap();

        let page = service
            .list(&ListQuery {
                search: Some("MARZO".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total_items, 1);
        assert_eq!(page.items[0].patient_name, "Ana");

        let page = service.list(&ListQuery::default()).await.unwrap();
        assert_eq!(page.items[0].patient_name, "Luis");
    }

    #[tokio::test]
    async fn test_summary() {
        let service = ConsultationService::new(ServiceContext::new(Arc::new(MemoryStore::new())));
        let mut done = sample("Ana", "2024-03-05", "09:30");
        done.status = Some(ConsultationStatus::Completed);
        service.create(&done, "u1").await.unwrap();
        service.create(&sample("Luis", "2024-03-06", "09:30"), "u1").await.unwrap();

        let summary = service.summary().await.unwrap();
        assert_eq!(
            summary,
            ConsultationSummary {
                scheduled: 1,
                completed: 1,
                unpaid: 1,
                paid: 0
            }
        );
    }

    #[tokio::test]
    async fn test_delete_cascades_to_invoice() {
        let store = Arc::new(MemoryStore::new());
        let service = ConsultationService::new(ServiceContext::new(store.clone()));

        let created = service.create(&sample("Ana", "2024-03-05", "09:30"), "u1").await.unwrap();
        let invoice_id = store
            .create(INVOICES, json!({"invoiceNumber": "FAC-1"}).as_object().cloned().unwrap())
            .await
            .unwrap();
        let mut patch = crate::store::Fields::new();
        patch.insert("invoiceId".to_string(), json!(invoice_id));
        service.consultations.update(&created.id, patch).await.unwrap();

        service.delete(&created.id, "u1").await.unwrap();

        assert!(store.get(INVOICES, &invoice_id).await.unwrap().is_none());
        assert!(store
            .get(Consultation::COLLECTION, &created.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_failed_cascade_restores_invoice() {
        let store = Arc::new(FlakyStore::default());
        let service = ConsultationService::new(ServiceContext::new(store.clone()));

        let created = service.create(&sample("Ana", "2024-03-05", "09:30"), "u1").await.unwrap();
        let invoice_id = store
            .create(INVOICES, json!({"invoiceNumber": "FAC-1"}).as_object().cloned().unwrap())
            .await
            .unwrap();
        let mut patch = crate::store::Fields::new();
        patch.insert("invoiceId".to_string(), json!(invoice_id));
        service.consultations.update(&created.id, patch).await.unwrap();

        store.fail_on(WriteOp::Delete, Consultation::COLLECTION);
        let err = service.delete(&created.id, "u1").await.unwrap_err();
        match err {
            ServiceError::Saga(e) => {
                assert_eq!(e.step, "delete_consultation");
                assert!(e.is_retryable());
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(store.get(INVOICES, &invoice_id).await.unwrap().is_some());
        assert!(store
            .get(Consultation::COLLECTION, &created.id)
            .await
            .unwrap()
            .is_some());
    }
}
