//! Patients
//!
//! The `patients` collection holds general-purpose records: contact data,
//! numeric fields, dates, category/priority/status selections and flags.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

use super::form::{self, required_date, required_text, text};
use super::notifications::NotificationType;
use super::{list_records, Listed, ServiceContext};
use crate::crud::listing::{compare_text, matches_search};
use crate::crud::{ListQuery, Page, ServiceError, ServiceResult, SortDirection, ValidationErrors};
use crate::store::{Collection, Record, Stored};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "category-a")]
    A,
    #[serde(rename = "category-b")]
    B,
    #[serde(rename = "category-c")]
    C,
    #[serde(rename = "category-d")]
    D,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::A => "Categoría A",
            Category::B => "Categoría B",
            Category::C => "Categoría C",
            Category::D => "Categoría D",
        }
    }
}

/// Ordered `low < medium < high < urgent`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn label(self) -> &'static str {
        match self {
            Priority::Low => "Baja",
            Priority::Medium => "Media",
            Priority::High => "Alta",
            Priority::Urgent => "Urgente",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatientStatus {
    Active,
    Completed,
    Inactive,
    Pending,
}

impl PatientStatus {
    pub fn label(self) -> &'static str {
        match self {
            PatientStatus::Active => "Activo",
            PatientStatus::Inactive => "Inactivo",
            PatientStatus::Pending => "Pendiente",
            PatientStatus::Completed => "Completado",
        }
    }
}

fn default_rating() -> f64 {
    5.0
}

fn default_true() -> bool {
    true
}

fn default_color() -> String {
    "#3b82f6".to_string()
}

fn default_kind() -> String {
    "option-1".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub code: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub price: f64,
    #[serde(default = "default_rating")]
    pub rating: f64,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub appointment_time: String,
    pub category: Category,
    pub priority: Priority,
    pub status: PatientStatus,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub has_attachments: bool,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub file_reference: String,
    #[serde(default)]
    pub attached_file: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for Patient {
    const COLLECTION: &'static str = "patients";
}

/// Submitted patient form
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatientForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub code: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub quantity: Option<f64>,
    pub price: Option<f64>,
    pub rating: Option<f64>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub appointment_time: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
    pub has_attachments: Option<bool>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub color: Option<String>,
    pub file_reference: Option<String>,
    pub attached_file: Option<String>,
    pub notes: Option<String>,
    pub comments: Option<String>,
}

/// Parse a required selection, reporting a missing or unknown value
fn required_choice<T: serde::de::DeserializeOwned>(
    errors: &mut ValidationErrors,
    field: &str,
    value: &Option<String>,
    label: &str,
) -> Option<T> {
    let raw = text(value);
    if raw.is_empty() {
        errors.add(field, format!("El campo {} es obligatorio", label));
        return None;
    }
    let parsed = serde_json::from_value(serde_json::Value::String(raw)).ok();
    errors.check(parsed.is_none(), field, format!("Opción inválida para {}", label));
    parsed
}

impl PatientForm {
    /// Validate and build the record to store
    pub fn validate(&self, actor: &str) -> Result<Patient, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let title = required_text(&mut errors, "title", &self.title, "El campo Título es obligatorio");
        let code = required_text(&mut errors, "code", &self.code, "El campo Código es obligatorio");
        let email = required_text(&mut errors, "email", &self.email, "El campo Email es obligatorio");
        if !email.is_empty() && !form::is_valid_email(&email) {
            errors.add("email", "Email inválido");
        }

        let start_date = required_date(
            &mut errors,
            "startDate",
            &self.start_date,
            "El campo Fecha de Inicio es obligatorio",
        );
        let category = required_choice(&mut errors, "category", &self.category, "Categoría");
        let priority = required_choice(&mut errors, "priority", &self.priority, "Prioridad");
        let status = required_choice(&mut errors, "status", &self.status, "Estado");

        let quantity = self.quantity.unwrap_or(0.0);
        let price = self.price.unwrap_or(0.0);
        let rating = self.rating.unwrap_or_else(default_rating);
        errors.check(quantity < 0.0, "quantity", "La cantidad no puede ser negativa");
        errors.check(price < 0.0, "price", "El precio no puede ser negativo");
        errors.check(
            !(1.0..=5.0).contains(&rating),
            "rating",
            "La calificación debe estar entre 1 y 5",
        );

        let website = text(&self.website);
        errors.check(
            !website.is_empty() && !form::is_valid_url(&website),
            "website",
            "URL inválida (debe comenzar con http:// o https://)",
        );

        let end_raw = text(&self.end_date);
        let end_date = if end_raw.is_empty() {
            None
        } else {
            let parsed = form::parse_date(&end_raw);
            errors.check(parsed.is_none(), "endDate", "Fecha inválida (AAAA-MM-DD)");
            parsed
        };
        if let (Some(start), Some(end)) = (start_date, end_date) {
            errors.check(
                end < start,
                "endDate",
                "La fecha de fin debe ser posterior a la fecha de inicio",
            );
        }

        errors.into_result()?;

        match (start_date, category, priority, status) {
            (Some(start_date), Some(category), Some(priority), Some(status)) => Ok(Patient {
                title,
                description: text(&self.description),
                code,
                email,
                phone: text(&self.phone),
                website,
                quantity,
                price,
                rating,
                start_date,
                end_date,
                appointment_time: text(&self.appointment_time),
                category,
                priority,
                status,
                is_active: self.is_active.unwrap_or(true),
                is_featured: self.is_featured.unwrap_or(false),
                has_attachments: self.has_attachments.unwrap_or(false),
                kind: self.kind.clone().unwrap_or_else(default_kind),
                color: self.color.clone().unwrap_or_else(default_color),
                file_reference: text(&self.file_reference),
                attached_file: text(&self.attached_file),
                notes: text(&self.notes),
                comments: text(&self.comments),
                created_by: actor.to_string(),
                created_at: None,
                updated_at: None,
            }),
            _ => Err(ValidationErrors::new()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatientSort {
    Title,
    Category,
    Priority,
    Status,
}

impl FromStr for PatientSort {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "title" => Ok(PatientSort::Title),
            "category" => Ok(PatientSort::Category),
            "priority" => Ok(PatientSort::Priority),
            "status" => Ok(PatientSort::Status),
            _ => Err(()),
        }
    }
}

impl Listed for Patient {
    type SortKey = PatientSort;

    const DEFAULT_SORT: PatientSort = PatientSort::Title;
    const DEFAULT_DIRECTION: SortDirection = SortDirection::Asc;

    fn matches(&self, needle: &str) -> bool {
        matches_search(
            needle,
            [
                self.title.as_str(),
                self.code.as_str(),
                self.description.as_str(),
                self.category.label(),
                self.priority.label(),
                self.status.label(),
            ],
        )
    }

    fn compare(&self, other: &Self, key: PatientSort) -> Ordering {
        match key {
            PatientSort::Title => compare_text(&self.title, &other.title),
            PatientSort::Category => self.category.cmp(&other.category),
            PatientSort::Priority => self.priority.cmp(&other.priority),
            PatientSort::Status => self.status.cmp(&other.status),
        }
    }
}

/// CRUD over `patients`
#[derive(Clone)]
pub struct PatientService {
    ctx: ServiceContext,
    patients: Collection<Patient>,
}

impl PatientService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self {
            patients: Collection::new(ctx.store.clone()),
            ctx,
        }
    }

    pub async fn all(&self) -> ServiceResult<Vec<Stored<Patient>>> {
        Ok(self.patients.all().await?)
    }

    pub async fn list(&self, query: &ListQuery) -> ServiceResult<Page<Stored<Patient>>> {
        Ok(list_records(self.all().await?, query, self.ctx.page_size))
    }

    pub async fn get(&self, id: &str) -> ServiceResult<Stored<Patient>> {
        Ok(self.patients.require(id).await?)
    }

    pub async fn create(&self, form: &PatientForm, actor: &str) -> ServiceResult<Stored<Patient>> {
        let mut record = form.validate(actor)?;
        let now = Utc::now();
        record.created_at = Some(now);
        record.updated_at = Some(now);

        let id = self.patients.create(&record).await?;
        tracing::info!(id = %id, actor = %actor, "Patient created");

        self.ctx
            .notifications
            .notify(
                actor,
                NotificationType::RecordCreated,
                "Nuevo registro creado",
                &format!("El registro \"{}\" ha sido creado exitosamente.", record.title),
                Some(&id),
            )
            .await;

        Ok(Stored { id, record })
    }

    pub async fn update(
        &self,
        id: &str,
        form: &PatientForm,
        actor: &str,
    ) -> ServiceResult<Stored<Patient>> {
        let existing = self.get(id).await?;
        let mut record = form.validate(actor)?;
        record.created_at = existing.created_at;
        record.updated_at = Some(Utc::now());

        self.patients.set(id, &record).await?;
        tracing::info!(id = %id, actor = %actor, "Patient updated");

        self.ctx
            .notifications
            .notify(
                actor,
                NotificationType::RecordUpdated,
                "Registro actualizado",
                &format!("El registro \"{}\" ha sido actualizado exitosamente.", record.title),
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
        if !self.patients.delete(id).await? {
            return Err(ServiceError::not_found(Patient::COLLECTION, id));
        }
        tracing::info!(id = %id, actor = %actor, "Patient deleted");

        self.ctx
            .notifications
            .notify(
                actor,
                NotificationType::RecordDeleted,
                "Registro eliminado",
                &format!(
                    "El registro \"{}\" ha sido eliminado del sistema.",
                    existing.title
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
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn form(value: serde_json::Value) -> PatientForm {
        serde_json::from_value(value).unwrap()
    }

    fn valid(title: &str, priority: &str) -> PatientForm {
        form(json!({
            "title": title,
            "code": "P-001",
            "email": "ana@clinica.mx",
            "startDate": "2024-01-10",
            "category": "category-b",
            "priority": priority,
            "status": "active"
        }))
    }

    fn service() -> PatientService {
        PatientService::new(ServiceContext::new(Arc::new(MemoryStore::new())))
    }

    #[test]
    fn test_validate_reports_each_field() {
        let errors = form(json!({
            "email": "nope",
            "startDate": "2024-05-01",
            "endDate": "2024-04-01",
            "quantity": -1,
            "rating": 6,
            "website": "clinica.mx",
            "priority": "someday"
        }))
        .validate("u1")
        .unwrap_err();

        assert_eq!(errors.get("title"), Some("El campo Título es obligatorio"));
        assert_eq!(errors.get("email"), Some("Email inválido"));
        assert_eq!(errors.get("category"), Some("El campo Categoría es obligatorio"));
        assert_eq!(errors.get("priority"), Some("Opción inválida para Prioridad"));
        assert!(errors.contains("quantity"));
        assert!(errors.contains("rating"));
        assert!(errors.contains("website"));
        assert_eq!(
            errors.get("endDate"),
            Some("La fecha de fin debe ser posterior a la fecha de inicio")
        );
    }

    #[test]
    fn test_validate_applies_defaults() {
        let patient = valid("Ana", "high").validate("u1").unwrap();
        assert_eq!(patient.rating, 5.0);
        assert!(patient.is_active);
        assert_eq!(patient.color, "#3b82f6");
        assert_eq!(patient.created_by, "u1");
    }

    #[tokio::test]
    async fn test_search_uses_spanish_labels() {
        let service = service();
        service.create(&valid("Ana", "urgent"), "u1").await.unwrap();
        service.create(&valid("Luis", "low"), "u1").await.unwrap();

        let page = service
            .list(&ListQuery {
                search: Some("URGENTE".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total_items, 1);
        assert_eq!(page.items[0].title, "Ana");
    }

    #[tokio::test]
    async fn test_sort_by_priority_rank() {
        let service = service();
        for (title, priority) in [("a", "urgent"), ("b", "low"), ("c", "high"), ("d", "medium")] {
            service.create(&valid(title, priority), "u1").await.unwrap();
        }

        let page = service
            .list(&ListQuery {
                sort: Some("priority".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        let titles: Vec<&str> = page.items.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["b", "d", "c", "a"]);
    }

    #[tokio::test]
    async fn test_crud_emits_notifications() {
        let service = service();
        let created = service.create(&valid("Ana", "low"), "u1").await.unwrap();
        service
            .update(&created.id, &valid("Ana María", "low"), "u1")
            .await
            .unwrap();
        assert_eq!(service.get(&created.id).await.unwrap().title, "Ana María");

        service.delete(&created.id, "u1").await.unwrap();
        assert!(matches!(
            service.get(&created.id).await,
            Err(ServiceError::NotFound { .. })
        ));

        let notes = service.ctx.notifications.list_for_user("u1").await.unwrap();
        let kinds: Vec<NotificationType> = notes.iter().map(|n| n.kind).collect();
        assert_eq!(kinds.len(), 3);
        assert!(kinds.contains(&NotificationType::RecordCreated));
        assert!(kinds.contains(&NotificationType::RecordUpdated));
        assert!(kinds.contains(&NotificationType::RecordDeleted));
    }
}
