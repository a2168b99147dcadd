//! Record Routes
//!
//! The clinic record types share one set of CRUD handlers:
//!
//! - GET /api/v1/{records} - List (search, sort, page)
//! - POST /api/v1/{records} - Create
//! - GET /api/v1/{records}/:id - Get
//! - PUT /api/v1/{records}/:id - Update
//! - DELETE /api/v1/{records}/:id - Delete
//!
//! for patients, offices, consultations, appointments, sessions and
//! invoices.

use axum::{
    async_trait,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

use crate::api::actor::Actor;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::billing::{Invoice, InvoiceForm, InvoiceService};
use crate::clinic::{
    Appointment, AppointmentForm, AppointmentService, Consultation, ConsultationForm,
    ConsultationService, Office, OfficeForm, OfficeService, Patient, PatientForm, PatientService,
    Session, SessionForm, SessionService,
};
use crate::crud::{ListQuery, Page, ServiceResult};
use crate::store::Stored;

/// A clinic service reachable through the shared record handlers
#[async_trait]
pub trait RecordRoutes: Send + Sync + 'static {
    type Record: Serialize + Send;
    type Form: DeserializeOwned + Send + Sync + 'static;

    const LOAD_ERROR: &'static str;
    const SAVE_ERROR: &'static str;
    const DELETE_ERROR: &'static str;

    fn of(state: &AppState) -> &Self;

    async fn list(&self, query: &ListQuery) -> ServiceResult<Page<Stored<Self::Record>>>;
    async fn get(&self, id: &str) -> ServiceResult<Stored<Self::Record>>;
    async fn create(&self, form: &Self::Form, actor: &str) -> ServiceResult<Stored<Self::Record>>;
    async fn update(
        &self,
        id: &str,
        form: &Self::Form,
        actor: &str,
    ) -> ServiceResult<Stored<Self::Record>>;
    async fn delete(&self, id: &str, actor: &str) -> ServiceResult<()>;
}

macro_rules! record_routes {
    ($service:ty, $record:ty, $form:ty, $field:ident, $load:literal, $save:literal, $delete:literal) => {
        #[async_trait]
        impl RecordRoutes for $service {
            type Record = $record;
            type Form = $form;

            const LOAD_ERROR: &'static str = $load;
            const SAVE_ERROR: &'static str = $save;
            const DELETE_ERROR: &'static str = $delete;

            fn of(state: &AppState) -> &Self {
                &state.$field
            }

            async fn list(&self, query: &ListQuery) -> ServiceResult<Page<Stored<$record>>> {
                <$service>::list(self, query).await
            }

            async fn get(&self, id: &str) -> ServiceResult<Stored<$record>> {
                <$service>::get(self, id).await
            }

            async fn create(&self, form: &$form, actor: &str) -> ServiceResult<Stored<$record>> {
                <$service>::create(self, form, actor).await
            }

            async fn update(
                &self,
                id: &str,
                form: &$form,
                actor: &str,
            ) -> ServiceResult<Stored<$record>> {
                <$service>::update(self, id, form, actor).await
            }

            async fn delete(&self, id: &str, actor: &str) -> ServiceResult<()> {
                <$service>::delete(self, id, actor).await
            }
        }
    };
}

record_routes!(
    PatientService, Patient, PatientForm, patients,
    "Error al cargar pacientes", "Error al guardar paciente", "Error al eliminar paciente"
);
record_routes!(
    OfficeService, Office, OfficeForm, offices,
    "Error al cargar consultorios", "Error al guardar consultorio", "Error al eliminar consultorio"
);
record_routes!(
    ConsultationService, Consultation, ConsultationForm, consultations,
    "Error al cargar consultas", "Error al guardar consulta", "Error al eliminar consulta"
);
record_routes!(
    AppointmentService, Appointment, AppointmentForm, appointments,
    "Error al cargar citas", "Error al guardar cita", "Error al eliminar cita"
);
record_routes!(
    SessionService, Session, SessionForm, sessions,
    "Error al cargar sesiones", "Error al guardar sesión", "Error al eliminar sesión"
);
record_routes!(
    InvoiceService, Invoice, InvoiceForm, invoices,
    "Error al cargar facturas", "Error al guardar factura", "Error al eliminar factura"
);

pub async fn list<S: RecordRoutes>(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Page<Stored<S::Record>>>> {
    let page = S::of(&state)
        .list(&query)
        .await
        .map_err(ApiError::service(S::LOAD_ERROR))?;
    Ok(Json(page))
}

pub async fn get<S: RecordRoutes>(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Stored<S::Record>>> {
    let record = S::of(&state)
        .get(&id)
        .await
        .map_err(ApiError::service(S::LOAD_ERROR))?;
    Ok(Json(record))
}

pub async fn create<S: RecordRoutes>(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(form): Json<S::Form>,
) -> ApiResult<(StatusCode, Json<Stored<S::Record>>)> {
    let record = S::of(&state)
        .create(&form, actor.uid())
        .await
        .map_err(ApiError::service(S::SAVE_ERROR))?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn update<S: RecordRoutes>(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    actor: Actor,
    Json(form): Json<S::Form>,
) -> ApiResult<Json<Stored<S::Record>>> {
    let record = S::of(&state)
        .update(&id, &form, actor.uid())
        .await
        .map_err(ApiError::service(S::SAVE_ERROR))?;
    Ok(Json(record))
}

pub async fn delete<S: RecordRoutes>(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    actor: Actor,
) -> ApiResult<StatusCode> {
    S::of(&state)
        .delete(&id, actor.uid())
        .await
        .map_err(ApiError::service(S::DELETE_ERROR))?;
    Ok(StatusCode::NO_CONTENT)
}
