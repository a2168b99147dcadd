//! Report Routes
//!
//! - GET /api/v1/reports - Practice totals and rates
//! - GET /api/v1/insights - Rule-based hints
//! - GET /api/v1/dashboard - Counters and distributions over patients
//!
//! Every request recomputes from the current collections.

use axum::{extract::State, Json};
use chrono::Utc;
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::reports::{Dashboard, Insight, Report};

pub async fn report(State(state): State<Arc<AppState>>) -> ApiResult<Json<Report>> {
    let report = state
        .reports
        .report(Utc::now())
        .await
        .map_err(ApiError::service("Error al generar el reporte"))?;
    Ok(Json(report))
}

pub async fn insights(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Insight>>> {
    let insights = state
        .reports
        .insights(Utc::now())
        .await
        .map_err(ApiError::service("Error al generar insights"))?;
    Ok(Json(insights))
}

pub async fn dashboard(State(state): State<Arc<AppState>>) -> ApiResult<Json<Dashboard>> {
    let dashboard = state
        .reports
        .dashboard()
        .await
        .map_err(ApiError::service("Error al cargar el dashboard"))?;
    Ok(Json(dashboard))
}
