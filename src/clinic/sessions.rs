//! Clinical session notes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

use super::appointments::MIN_DURATION;
use super::form::{self, required_date, required_text, required_time, text};
use super::notifications::NotificationType;
use super::patients::Patient;
use super::users::UserService;
use super::{list_records, Listed, ServiceContext};
use crate::crud::listing::{compare_text, matches_search};
use crate::crud::{ListQuery, Page, ServiceError, ServiceResult, SortDirection, ValidationErrors};
use crate::store::{Collection, Record, Stored};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub patient_id: String,
    #[serde(default)]
    pub patient_name: String,
    #[serde(default)]
    pub psychologist_id: String,
    #[serde(default)]
    pub psychologist_name: String,
    pub date: DateTime<Utc>,
    pub duration: u32,
    pub notes: String,
    #[serde(default)]
    pub progress: String,
    #[serde(default)]
    pub next_objectives: String,
    #[serde(default)]
    pub attachments: Vec<String>,
    #[serde(default)]
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for Session {
    const COLLECTION: &'static str = "sessions";
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionForm {
    pub patient_id: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub duration: Option<f64>,
    pub notes: Option<String>,
    pub progress: Option<String>,
    pub next_objectives: Option<String>,
}

impl SessionForm {
    /// Field checks; patient and psychologist names are filled in by the service
    fn check(&self, actor: &str) -> Result<Session, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let patient_id = required_text(
            &mut errors,
            "patientId",
            &self.patient_id,
            "El campo Paciente es obligatorio",
        );
        let date = required_date(&mut errors, "date", &self.date, "El campo Fecha es obligatorio");
        let time = required_time(&mut errors, "time", &self.time, "El campo Hora es obligatorio");
        let duration = self.duration.unwrap_or(0.0);
        errors.check(
            duration < f64::from(MIN_DURATION),
            "duration",
            "La duración mínima es 15 minutos",
        );
        let notes = required_text(&mut errors, "notes", &self.notes, "El campo Notas es obligatorio");

        errors.into_result()?;
        let (Some(date), Some(time)) = (date, time) else {
            return Err(ValidationErrors::new());
        };

        Ok(Session {
            patient_id,
            patient_name: String::new(),
            psychologist_id: actor.to_string(),
            psychologist_name: String::new(),
            date: form::at(date, time),
            duration: duration as u32,
            notes,
            progress: text(&self.progress),
            next_objectives: text(&self.next_objectives),
            attachments: Vec::new(),
            created_by: actor.to_string(),
            created_at: None,
            updated_at: None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSort {
    Date,
    Patient,
    Duration,
}

impl FromStr for SessionSort {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "date" => Ok(SessionSort::Date),
            "patient" => Ok(SessionSort::Patient),
            "duration" => Ok(SessionSort::Duration),
            _ => Err(()),
        }
    }
}

impl Listed for Session {
    type SortKey = SessionSort;

    const DEFAULT_SORT: SessionSort = SessionSort::Date;
    const DEFAULT_DIRECTION: SortDirection = SortDirection::Desc;

    fn matches(&self, needle: &str) -> bool {
        matches_search(
            needle,
            [
                &self.patient_name,
                &self.psychologist_name,
                &self.notes,
                &self.progress,
                &self.next_objectives,
            ],
        )
    }

    fn compare(&self, other: &Self, key: SessionSort) -> Ordering {
        match key {
            SessionSort::Date => self.date.cmp(&other.date),
            SessionSort::Patient => compare_text(&self.patient_name, &other.patient_name),
            SessionSort::Duration => self.duration.cmp(&other.duration),
        }
    }
}

#[derive(Clone)]
pub struct SessionService {
    ctx: ServiceContext,
    sessions: Collection<Session>,
    patients: Collection<Patient>,
    users: UserService,
}

impl SessionService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self {
            sessions: Collection::new(ctx.store.clone()),
            patients: Collection::new(ctx.store.clone()),
            users: UserService::new(ctx.clone()),
            ctx,
        }
    }

    pub async fn all(&self) -> ServiceResult<Vec<Stored<Session>>> {
        Ok(self.sessions.all().await?)
    }

    pub async fn list(&self, query: &ListQuery) -> ServiceResult<Page<Stored<Session>>> {
        Ok(list_records(self.all().await?, query, self.ctx.page_size))
    }

    pub async fn get(&self, id: &str) -> ServiceResult<Stored<Session>> {
        Ok(self.sessions.require(id).await?)
    }

    async fn build(&self, form: &SessionForm, actor: &str) -> ServiceResult<Session> {
        let mut session = form.check(actor)?;
        let patient = self
            .patients
            .get(&session.patient_id)
            .await?
            .ok_or_else(|| ServiceError::Reference("Paciente no encontrado".to_string()))?;

        session.patient_name = patient.record.title;
        session.psychologist_name = self.users.display_name(actor).await;
        Ok(session)
    }

    pub async fn create(&self, form: &SessionForm, actor: &str) -> ServiceResult<Stored<Session>> {
        let mut record = self.build(form, actor).await?;
        let now = Utc::now();
        record.created_at = Some(now);
        record.updated_at = Some(now);

        let id = self.sessions.create(&record).await?;
        tracing::info!(id = %id, patient = %record.patient_id, "Session created");

        self.ctx
            .notifications
            .notify(
                actor,
                NotificationType::RecordCreated,
                "Nueva sesión clínica",
                &format!(
                    "La sesión con {} del {} ha sido registrada.",
                    record.patient_name,
                    form::long_date_es(&record.date)
                ),
                Some(&id),
            )
            .await;

        Ok(Stored { id, record })
    }

    /// Overwrite a session; attachments and authorship are kept
    pub async fn update(
        &self,
        id: &str,
        form: &SessionForm,
        actor: &str,
    ) -> ServiceResult<Stored<Session>> {
        let existing = self.get(id).await?.record;
        let mut record = self.build(form, actor).await?;
        record.attachments = existing.attachments;
        record.created_by = existing.created_by;
        record.created_at = existing.created_at;
        record.updated_at = Some(Utc::now());

        self.sessions.set(id, &record).await?;
        tracing::info!(id = %id, actor = %actor, "Session updated");

        self.ctx
            .notifications
            .notify(
                actor,
                NotificationType::RecordUpdated,
                "Sesión clínica actualizada",
                &format!("La sesión con {} ha sido actualizada.", record.patient_name),
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
        self.sessions.delete(id).await?;
        tracing::info!(id = %id, actor = %actor, "Session deleted");

        self.ctx
            .notifications
            .notify(
                actor,
                NotificationType::RecordDeleted,
                "Sesión clínica eliminada",
                &format!("La sesión con {} ha sido eliminada.", existing.patient_name),
                Some(id),
            )
            .await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DocumentStore, MemoryStore};
    use serde_json::json;
    use std::sync::Arc;

    fn form(value: serde_json::Value) -> SessionForm {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_notes_required() {
        let errors = form(json!({
            "patientId": "p1", "date": "2024-03-05", "time": "10:00",
            "duration": 45, "notes": "  "
        }))
        .check("u1")
        .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get("notes"), Some("El campo Notas es obligatorio"));
    }

    #[tokio::test]
    async fn test_patient_must_exist() {
        let store = Arc::new(MemoryStore::new());
        let service = SessionService::new(ServiceContext::new(store.clone()));
        let submitted = json!({
            "patientId": "p1", "date": "2024-03-05", "time": "10:00",
            "duration": 45, "notes": "Buena evolución"
        });

        let err = service.create(&form(submitted.clone()), "u1").await.unwrap_err();
        assert!(matches!(err, ServiceError::Reference(_)));

        store
            .set(
                "patients",
                "p1",
                json!({
                    "title": "Luis Pérez", "code": "P-9", "email": "l@x.mx",
                    "startDate": "2024-01-01", "category": "category-b",
                    "priority": "low", "status": "active"
                })
                .as_object()
                .cloned()
                .unwrap(),
            )
            .await
            .unwrap();

        let created = service.create(&form(submitted), "u1").await.unwrap();
        assert_eq!(created.patient_name, "Luis Pérez");
        assert_eq!(created.psychologist_id, "u1");
    }
}
