//! Invoices

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::cmp::Ordering;
use std::str::FromStr;

use super::numbering::InvoiceNumbering;
use super::payments::patch;
use super::totals::{InvoiceTotals, DEFAULT_TAX_RATE};
use crate::clinic::consultations::Consultation;
use crate::clinic::form::{self, required_date, required_text, text};
use crate::clinic::notifications::NotificationType;
use crate::clinic::{list_records, Listed, ServiceContext};
use crate::crud::listing::{compare_f64, compare_text, matches_search};
use crate::crud::{ListQuery, Page, ServiceError, ServiceResult, SortDirection, ValidationErrors};
use crate::saga::Saga;
use crate::store::{to_fields, Collection, Record, Stored};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    #[default]
    Pending,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "Pendiente",
            InvoiceStatus::Paid => "Pagada",
            InvoiceStatus::Overdue => "Vencida",
            InvoiceStatus::Cancelled => "Cancelada",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItem {
    pub description: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub invoice_number: String,
    #[serde(default)]
    pub patient_id: Option<String>,
    pub patient_name: String,
    /// Consultation this invoice bills; deleting it deletes the invoice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consultation_id: Option<String>,
    #[serde(default)]
    pub items: Vec<InvoiceItem>,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
    #[serde(default)]
    pub status: InvoiceStatus,
    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for Invoice {
    const COLLECTION: &'static str = "invoices";
}

/// Submitted invoice form
///
/// `taxRate` is a percentage; when missing the service default applies.
/// `consultationId` links the invoice to a consultation on creation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvoiceForm {
    pub consultation_id: Option<String>,
    pub patient_name: Option<String>,
    pub description: Option<String>,
    pub amount: Option<f64>,
    pub tax_rate: Option<f64>,
    pub issue_date: Option<String>,
    pub due_date: Option<String>,
    pub notes: Option<String>,
}

impl InvoiceForm {
    /// Validate and price the invoice; the number and status are set by the caller
    fn check(&self, default_rate: f64, actor: &str) -> Result<Invoice, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let patient_name = required_text(
            &mut errors,
            "patientName",
            &self.patient_name,
            "El nombre del cliente es obligatorio",
        );
        let description = required_text(
            &mut errors,
            "description",
            &self.description,
            "El campo Descripción es obligatorio",
        );
        let amount = self.amount.unwrap_or(-1.0);
        errors.check(amount < 0.0, "amount", "El monto debe ser mayor o igual a 0");

        let rate = self.tax_rate.unwrap_or(default_rate);
        errors.check(
            !(0.0..=100.0).contains(&rate),
            "taxRate",
            "La tasa de impuesto debe estar entre 0 y 100",
        );

        let issue_date = required_date(
            &mut errors,
            "issueDate",
            &self.issue_date,
            "El campo Fecha de Emisión es obligatorio",
        );
        let due_date = required_date(
            &mut errors,
            "dueDate",
            &self.due_date,
            "El campo Fecha de Vencimiento es obligatorio",
        );

        errors.into_result()?;
        let (Some(issue_date), Some(due_date)) = (issue_date, due_date) else {
            return Err(ValidationErrors::new());
        };

        let totals = InvoiceTotals::compute(amount, rate);
        Ok(Invoice {
            invoice_number: String::new(),
            patient_id: None,
            patient_name,
            consultation_id: None,
            items: vec![InvoiceItem {
                description,
                quantity: 1,
                unit_price: amount,
                total: amount,
            }],
            subtotal: totals.subtotal,
            tax: totals.tax,
            total: totals.total,
            status: InvoiceStatus::Pending,
            issue_date: form::start_of_day(issue_date),
            due_date: form::start_of_day(due_date),
            paid_date: None,
            notes: text(&self.notes),
            created_by: actor.to_string(),
            created_at: None,
            updated_at: None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceSort {
    Number,
    Patient,
    Date,
    Total,
    Status,
}

impl FromStr for InvoiceSort {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "number" => Ok(InvoiceSort::Number),
            "patient" => Ok(InvoiceSort::Patient),
            "date" => Ok(InvoiceSort::Date),
            "total" => Ok(InvoiceSort::Total),
            "status" => Ok(InvoiceSort::Status),
            _ => Err(()),
        }
    }
}

impl Listed for Invoice {
    type SortKey = InvoiceSort;

    const DEFAULT_SORT: InvoiceSort = InvoiceSort::Date;
    const DEFAULT_DIRECTION: SortDirection = SortDirection::Desc;

    fn matches(&self, needle: &str) -> bool {
        matches_search(
            needle,
            [
                self.invoice_number.clone(),
                self.patient_name.clone(),
                self.status.as_str().to_string(),
                self.total.to_string(),
                form::short_date_es(&self.issue_date.date_naive()),
            ],
        )
    }

    fn compare(&self, other: &Self, key: InvoiceSort) -> Ordering {
        match key {
            InvoiceSort::Number => compare_text(&self.invoice_number, &other.invoice_number),
            InvoiceSort::Patient => compare_text(&self.patient_name, &other.patient_name),
            InvoiceSort::Date => self.issue_date.cmp(&other.issue_date),
            InvoiceSort::Total => compare_f64(self.total, other.total),
            InvoiceSort::Status => self.status.as_str().cmp(other.status.as_str()),
        }
    }
}

/// Totals shown above the invoice list
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceSummary {
    pub pending_total: f64,
    pub paid_total: f64,
    pub count: usize,
}

impl InvoiceSummary {
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a Invoice>,
    {
        records.into_iter().fold(Self::default(), |mut s, inv| {
            match inv.status {
                InvoiceStatus::Pending => s.pending_total += inv.total,
                InvoiceStatus::Paid => s.paid_total += inv.total,
                _ => {}
            }
            s.count += 1;
            s
        })
    }
}

#[derive(Clone)]
pub struct InvoiceService {
    pub(super) ctx: ServiceContext,
    pub(super) invoices: Collection<Invoice>,
    numbering: InvoiceNumbering,
    tax_rate: f64,
}

impl InvoiceService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self {
            invoices: Collection::new(ctx.store.clone()),
            ctx,
            numbering: InvoiceNumbering::default(),
            tax_rate: DEFAULT_TAX_RATE,
        }
    }

    pub fn with_numbering(mut self, numbering: InvoiceNumbering) -> Self {
        self.numbering = numbering;
        self
    }

    /// Default tax rate in percent
    pub fn with_tax_rate(mut self, rate_percent: f64) -> Self {
        self.tax_rate = rate_percent;
        self
    }

    pub fn tax_rate(&self) -> f64 {
        self.tax_rate
    }

    pub async fn all(&self) -> ServiceResult<Vec<Stored<Invoice>>> {
        Ok(self.invoices.all().await?)
    }

    pub async fn list(&self, query: &ListQuery) -> ServiceResult<Page<Stored<Invoice>>> {
        Ok(list_records(self.all().await?, query, self.ctx.page_size))
    }

    pub async fn summary(&self) -> ServiceResult<InvoiceSummary> {
        let all = self.all().await?;
        Ok(InvoiceSummary::from_records(all.iter().map(|i| &i.record)))
    }

    pub async fn get(&self, id: &str) -> ServiceResult<Stored<Invoice>> {
        Ok(self.invoices.require(id).await?)
    }

    /// Next free invoice number
    pub async fn next_number(&self) -> ServiceResult<String> {
        let all = self.all().await?;
        Ok(self
            .numbering
            .next(all.iter().map(|i| i.invoice_number.as_str())))
    }

    /// Create an invoice, linking it to `consultationId` when given
    ///
    /// The invoice and the consultation's `invoiceId`/`amount` are written
    /// as one saga.
    pub async fn create(&self, form: &InvoiceForm, actor: &str) -> ServiceResult<Stored<Invoice>> {
        let mut record = form.check(self.tax_rate, actor)?;
        let consultation = self.billable_consultation(form).await?;

        record.invoice_number = self.next_number().await?;
        record.consultation_id = consultation.as_ref().map(|c| c.id.clone());
        let now = Utc::now();
        record.created_at = Some(now);
        record.updated_at = Some(now);

        let id = match &consultation {
            None => self.invoices.create(&record).await?,
            Some(consultation) => {
                let mut saga = Saga::new("create_invoice", self.ctx.store.clone());
                let id = saga
                    .create("create_invoice", Invoice::COLLECTION, to_fields(&record)?)
                    .await?;
                saga.update(
                    "link_consultation",
                    Consultation::COLLECTION,
                    &consultation.id,
                    patch([
                        ("invoiceId", json!(id)),
                        ("amount", json!(record.total)),
                        ("updatedAt", json!(now)),
                    ]),
                )
                .await?;
                saga.commit();
                id
            }
        };
        tracing::info!(
            id = %id,
            number = %record.invoice_number,
            total = record.total,
            consultation = ?record.consultation_id,
            "Invoice created"
        );

        self.ctx
            .notifications
            .notify(
                actor,
                NotificationType::InvoiceCreated,
                "Nueva factura registrada",
                &format!(
                    "La factura {} ha sido registrada exitosamente.",
                    record.invoice_number
                ),
                Some(&id),
            )
            .await;

        Ok(Stored { id, record })
    }

    /// Consultation named by the form, which must exist and not be invoiced yet
    async fn billable_consultation(
        &self,
        form: &InvoiceForm,
    ) -> ServiceResult<Option<Stored<Consultation>>> {
        let Some(consultation_id) = form.consultation_id.as_deref().map(str::trim) else {
            return Ok(None);
        };
        if consultation_id.is_empty() {
            return Ok(None);
        }

        let consultations: Collection<Consultation> = Collection::new(self.ctx.store.clone());
        let consultation = consultations
            .get(consultation_id)
            .await?
            .ok_or_else(|| ServiceError::Reference("Consulta no encontrada".to_string()))?;
        if consultation.invoice_id.is_some() {
            return Err(ServiceError::invalid(
                "consultationId",
                "La consulta ya tiene una factura",
            ));
        }
        Ok(Some(consultation))
    }

    /// Re-price an invoice; its number, status, payment date and
    /// consultation link are kept
    pub async fn update(
        &self,
        id: &str,
        form: &InvoiceForm,
        actor: &str,
    ) -> ServiceResult<Stored<Invoice>> {
        let existing = self.get(id).await?.record;
        let submitted = form.check(self.tax_rate, actor)?;

        let record = Invoice {
            invoice_number: existing.invoice_number,
            patient_id: existing.patient_id,
            consultation_id: existing.consultation_id,
            status: existing.status,
            paid_date: existing.paid_date,
            created_at: existing.created_at,
            updated_at: Some(Utc::now()),
            ..submitted
        };

        self.invoices.set(id, &record).await?;
        tracing::info!(id = %id, number = %record.invoice_number, "Invoice updated");

        self.ctx
            .notifications
            .notify(
                actor,
                NotificationType::InvoiceUpdated,
                "Factura actualizada",
                &format!(
                    "La factura {} ha sido actualizada exitosamente.",
                    record.invoice_number
                ),
                Some(id),
            )
            .await;

        Ok(Stored {
            id: id.to_string(),
            record,
        })
    }

    pub async fn delete(&self, id: &str, actor: &str) -> ServiceResult<()> {
        let existing = self.get(id).await?;
        if !self.invoices.delete(id).await? {
            return Err(ServiceError::not_found(Invoice::COLLECTION, id));
        }
        tracing::info!(id = %id, number = %existing.invoice_number, "Invoice deleted");

        self.ctx
            .notifications
            .notify(
                actor,
                NotificationType::InvoiceDeleted,
                "Factura eliminada",
                &format!(
                    "La factura {} ha sido eliminada del sistema.",
                    existing.invoice_number
                ),
                Some(id),
            )
            .await;

        Ok(())
    }
}
