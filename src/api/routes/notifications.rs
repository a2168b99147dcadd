//! Notification Routes
//!
//! All routes act on the caller's own notifications.
//!
//! - GET /api/v1/notifications - Newest first
//! - GET /api/v1/notifications/unread-count
//! - POST /api/v1/notifications/:id/read
//! - POST /api/v1/notifications/read-all

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::actor::Actor;
use crate::api::dto::{MarkAllReadResponse, UnreadCountResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::clinic::Notification;
use crate::store::Stored;

const LOAD_ERROR: &str = "Error al cargar notificaciones";
const UPDATE_ERROR: &str = "Error al actualizar notificaciones";

pub async fn list(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> ApiResult<Json<Vec<Stored<Notification>>>> {
    let items = state
        .notifications
        .list_for_user(actor.uid())
        .await
        .map_err(ApiError::service(LOAD_ERROR))?;
    Ok(Json(items))
}

pub async fn unread_count(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> ApiResult<Json<UnreadCountResponse>> {
    let count = state
        .notifications
        .unread_count(actor.uid())
        .await
        .map_err(ApiError::service(LOAD_ERROR))?;
    Ok(Json(UnreadCountResponse { count }))
}

pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    _actor: Actor,
) -> ApiResult<StatusCode> {
    state
        .notifications
        .mark_read(&id)
        .await
        .map_err(ApiError::service(UPDATE_ERROR))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> ApiResult<Json<MarkAllReadResponse>> {
    let updated = state
        .notifications
        .mark_all_read(actor.uid())
        .await
        .map_err(ApiError::service(UPDATE_ERROR))?;
    tracing::debug!(user = %actor.uid(), updated, "Notifications marked read");
    Ok(Json(MarkAllReadResponse { updated }))
}
