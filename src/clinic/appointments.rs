//! Appointments
//!
//! Bookings of a patient into an office. Patient and office names are
//! copied onto the appointment when it is saved, so later renames do not
//! propagate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

use super::form::{self, required_date, required_text, required_time, text};
use super::notifications::NotificationType;
use super::offices::Office;
use super::patients::Patient;
use super::users::UserService;
use super::{list_records, Listed, ServiceContext};
use crate::crud::listing::{compare_text, matches_search};
use crate::crud::{ListQuery, Page, ServiceError, ServiceResult, SortDirection, ValidationErrors};
use crate::store::{Collection, Record, Stored};

/// Shortest bookable slot, in minutes
pub const MIN_DURATION: u32 = 15;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentType {
    Initial,
    #[default]
    Followup,
    Emergency,
    Group,
}

impl AppointmentType {
    pub fn label(self) -> &'static str {
        match self {
            AppointmentType::Initial => "Primera Consulta",
            AppointmentType::Followup => "Seguimiento",
            AppointmentType::Emergency => "Emergencia",
            AppointmentType::Group => "Grupal",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::InProgress => "in_progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "Programada",
            AppointmentStatus::Confirmed => "Confirmada",
            AppointmentStatus::InProgress => "En Progreso",
            AppointmentStatus::Completed => "Completada",
            AppointmentStatus::Cancelled => "Cancelada",
            AppointmentStatus::NoShow => "No Asistió",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub patient_id: String,
    #[serde(default)]
    pub patient_name: String,
    pub office_id: String,
    #[serde(default)]
    pub office_name: String,
    #[serde(default)]
    pub psychologist_id: String,
    #[serde(default)]
    pub psychologist_name: String,
    pub date: DateTime<Utc>,
    pub duration: u32,
    #[serde(rename = "type", default)]
    pub kind: AppointmentType,
    #[serde(default)]
    pub status: AppointmentStatus,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for Appointment {
    const COLLECTION: &'static str = "appointments";
}

impl Appointment {
    pub fn end(&self) -> DateTime<Utc> {
        self.date + chrono::Duration::minutes(i64::from(self.duration))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppointmentForm {
    pub patient_id: Option<String>,
    pub office_id: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub duration: Option<f64>,
    #[serde(rename = "type")]
    pub kind: Option<AppointmentType>,
    pub status: Option<AppointmentStatus>,
    pub notes: Option<String>,
}

/// Checked form values, before names are resolved
#[derive(Debug, Clone)]
struct ValidAppointment {
    patient_id: String,
    office_id: String,
    date: DateTime<Utc>,
    duration: u32,
}

impl AppointmentForm {
    fn check(&self) -> Result<ValidAppointment, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let patient_id = required_text(
            &mut errors,
            "patientId",
            &self.patient_id,
            "El campo Paciente es obligatorio",
        );
        let office_id = required_text(
            &mut errors,
            "officeId",
            &self.office_id,
            "El campo Consultorio es obligatorio",
        );
        let date = required_date(&mut errors, "date", &self.date, "El campo Fecha es obligatorio");
        let time = required_time(&mut errors, "time", &self.time, "El campo Hora es obligatorio");

        let duration = self.duration.unwrap_or(0.0);
        errors.check(
            duration < f64::from(MIN_DURATION),
            "duration",
            "La duración mínima es 15 minutos",
        );

        errors.into_result()?;
        match (date, time) {
            (Some(date), Some(time)) => Ok(ValidAppointment {
                patient_id,
                office_id,
                date: form::at(date, time),
                duration: duration as u32,
            }),
            _ => Err(ValidationErrors::new()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentSort {
    Date,
    Patient,
    Office,
    Status,
}

impl FromStr for AppointmentSort {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "date" => Ok(AppointmentSort::Date),
            "patient" => Ok(AppointmentSort::Patient),
            "office" => Ok(AppointmentSort::Office),
            "status" => Ok(AppointmentSort::Status),
            _ => Err(()),
        }
    }
}

impl Listed for Appointment {
    type SortKey = AppointmentSort;

    const DEFAULT_SORT: AppointmentSort = AppointmentSort::Date;
    const DEFAULT_DIRECTION: SortDirection = SortDirection::Asc;

    fn matches(&self, needle: &str) -> bool {
        matches_search(
            needle,
            [
                self.patient_name.as_str(),
                self.office_name.as_str(),
                self.psychologist_name.as_str(),
                self.kind.label(),
                self.status.label(),
                self.notes.as_str(),
            ],
        )
    }

    fn compare(&self, other: &Self, key: AppointmentSort) -> Ordering {
        match key {
            AppointmentSort::Date => self.date.cmp(&other.date),
            AppointmentSort::Patient => compare_text(&self.patient_name, &other.patient_name),
            AppointmentSort::Office => compare_text(&self.office_name, &other.office_name),
            AppointmentSort::Status => self.status.label().cmp(other.status.label()),
        }
    }
}

#[derive(Clone)]
pub struct AppointmentService {
    ctx: ServiceContext,
    appointments: Collection<Appointment>,
    patients: Collection<Patient>,
    offices: Collection<Office>,
    users: UserService,
}

impl AppointmentService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self {
            appointments: Collection::new(ctx.store.clone()),
            patients: Collection::new(ctx.store.clone()),
            offices: Collection::new(ctx.store.clone()),
            users: UserService::new(ctx.clone()),
            ctx,
        }
    }

    pub async fn all(&self) -> ServiceResult<Vec<Stored<Appointment>>> {
        Ok(self.appointments.all().await?)
    }

    pub async fn list(&self, query: &ListQuery) -> ServiceResult<Page<Stored<Appointment>>> {
        Ok(list_records(self.all().await?, query, self.ctx.page_size))
    }

    pub async fn get(&self, id: &str) -> ServiceResult<Stored<Appointment>> {
        Ok(self.appointments.require(id).await?)
    }

    /// Validate the form and resolve patient, office and psychologist names
    async fn build(&self, form: &AppointmentForm, actor: &str) -> ServiceResult<Appointment> {
        let valid = form.check()?;

        let patient = self.patients.get(&valid.patient_id).await?;
        let office = self.offices.get(&valid.office_id).await?;
        let (Some(patient), Some(office)) = (patient, office) else {
            return Err(ServiceError::Reference(
                "Paciente u oficina no encontrados".to_string(),
            ));
        };

        Ok(Appointment {
            patient_id: valid.patient_id,
            patient_name: patient.record.title,
            office_id: valid.office_id,
            office_name: office.record.name,
            psychologist_id: actor.to_string(),
            psychologist_name: self.users.display_name(actor).await,
            date: valid.date,
            duration: valid.duration,
            kind: form.kind.unwrap_or_default(),
            status: form.status.unwrap_or_default(),
            notes: text(&form.notes),
            created_by: actor.to_string(),
            created_at: None,
            updated_at: None,
        })
    }

    pub async fn create(
        &self,
        form: &AppointmentForm,
        actor: &str,
    ) -> ServiceResult<Stored<Appointment>> {
        let mut record = self.build(form, actor).await?;
        let now = Utc::now();
        record.created_at = Some(now);
        record.updated_at = Some(now);

        let id = self.appointments.create(&record).await?;
        tracing::info!(id = %id, patient = %record.patient_id, office = %record.office_id, "Appointment created");

        self.ctx
            .notifications
            .notify(
                actor,
                NotificationType::RecordCreated,
                "Nueva cita registrada",
                &format!(
                    "La cita de {} el {} a las {} ha sido registrada.",
                    record.patient_name,
                    form::long_date_es(&record.date),
                    form::clock(&record.date)
                ),
                Some(&id),
            )
            .await;

        Ok(Stored { id, record })
    }

    pub async fn update(
        &self,
        id: &str,
        form: &AppointmentForm,
        actor: &str,
    ) -> ServiceResult<Stored<Appointment>> {
        let existing = self.get(id).await?;
        let mut record = self.build(form, actor).await?;
        record.created_by = existing.record.created_by;
        record.created_at = existing.record.created_at;
        record.updated_at = Some(Utc::now());

        self.appointments.set(id, &record).await?;
        tracing::info!(id = %id, actor = %actor, "Appointment updated");

        self.ctx
            .notifications
            .notify(
                actor,
                NotificationType::RecordUpdated,
                "Cita actualizada",
                &format!("La cita de {} ha sido actualizada.", record.patient_name),
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
        self.appointments.delete(id).await?;
        tracing::info!(id = %id, actor = %actor, "Appointment deleted");

        self.ctx
            .notifications
            .notify(
                actor,
                NotificationType::RecordDeleted,
                "Cita eliminada",
                &format!("La cita de {} ha sido eliminada.", existing.patient_name),
                Some(id),
            )
            .await;

        Ok(())
    }
}
