//! Consultation extras
//!
//! - GET /api/v1/consultations/calendar?day=YYYY-MM-DD - Calendar events with conflicts
//! - GET /api/v1/consultations/summary - Status and payment counters

use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use crate::api::dto::CalendarQuery;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::calendar::CalendarEvent;
use crate::clinic::consultations::ConsultationSummary;
use crate::clinic::form::parse_date;

const CALENDAR_ERROR: &str = "Error al cargar el calendario";

/// GET /api/v1/consultations/calendar
///
/// Consultations and appointments as calendar events. Overlaps are
/// detected across the whole calendar even when one day is requested.
pub async fn calendar(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CalendarQuery>,
) -> ApiResult<Json<Vec<CalendarEvent>>> {
    let events = match query.day.as_deref() {
        Some(raw) => {
            let day = parse_date(raw)
                .ok_or_else(|| ApiError::BadRequest("Fecha inválida (AAAA-MM-DD)".to_string()))?;
            state.calendar.day(day).await
        }
        None => state.calendar.events().await,
    }
    .map_err(ApiError::service(CALENDAR_ERROR))?;

    Ok(Json(events))
}

/// GET /api/v1/consultations/summary
pub async fn summary(State(state): State<Arc<AppState>>) -> ApiResult<Json<ConsultationSummary>> {
    let summary = state
        .consultations
        .summary()
        .await
        .map_err(ApiError::service("Error al cargar consultas"))?;
    Ok(Json(summary))
}
