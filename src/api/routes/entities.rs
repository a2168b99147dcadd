//! Entity Routes
//!
//! Generic CRUD over the entities declared in the project configuration.
//!
//! - GET /api/v1/entities/:entity - List (search, sort, page)
//! - POST /api/v1/entities/:entity - Create
//! - GET /api/v1/entities/:entity/blank - Empty record with field defaults
//! - GET /api/v1/entities/:entity/export - All records as CSV
//! - GET /api/v1/entities/:entity/:id - Get
//! - PUT /api/v1/entities/:entity/:id - Overwrite
//! - DELETE /api/v1/entities/:entity/:id - Delete

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use std::sync::Arc;

use crate::api::actor::Actor;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::crud::{EntityEngine, ListQuery, Page};
use crate::store::{Document, Fields};

const LOAD_ERROR: &str = "Error al cargar registros";
const SAVE_ERROR: &str = "Error al guardar registro";
const DELETE_ERROR: &str = "Error al eliminar registro";
const EXPORT_ERROR: &str = "Error al exportar registros";

fn engine<'a>(state: &'a AppState, entity: &str) -> ApiResult<&'a EntityEngine> {
    state
        .entity(entity)
        .ok_or_else(|| ApiError::NotFound(format!("entity {}", entity)))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Path(entity): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Page<Document>>> {
    let page = engine(&state, &entity)?
        .list(&query)
        .await
        .map_err(ApiError::service(LOAD_ERROR))?;
    Ok(Json(page))
}

pub async fn blank(
    State(state): State<Arc<AppState>>,
    Path(entity): Path<String>,
) -> ApiResult<Json<Fields>> {
    Ok(Json(engine(&state, &entity)?.blank_record()))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path((entity, id)): Path<(String, String)>,
) -> ApiResult<Json<Document>> {
    let record = engine(&state, &entity)?
        .get(&id)
        .await
        .map_err(ApiError::service(LOAD_ERROR))?;
    Ok(Json(record))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Path(entity): Path<String>,
    actor: Actor,
    Json(record): Json<Fields>,
) -> ApiResult<(StatusCode, Json<Document>)> {
    let saved = engine(&state, &entity)?
        .save(None, record, actor.uid())
        .await
        .map_err(ApiError::service(SAVE_ERROR))?;
    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Path((entity, id)): Path<(String, String)>,
    actor: Actor,
    Json(record): Json<Fields>,
) -> ApiResult<Json<Document>> {
    let saved = engine(&state, &entity)?
        .save(Some(&id), record, actor.uid())
        .await
        .map_err(ApiError::service(SAVE_ERROR))?;
    Ok(Json(saved))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path((entity, id)): Path<(String, String)>,
    _actor: Actor,
) -> ApiResult<StatusCode> {
    engine(&state, &entity)?
        .remove(&id)
        .await
        .map_err(ApiError::service(DELETE_ERROR))?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/entities/:entity/export
///
/// Download every record of the entity as a CSV attachment.
pub async fn export(
    State(state): State<Arc<AppState>>,
    Path(entity): Path<String>,
) -> ApiResult<Response> {
    let body = engine(&state, &entity)?
        .export_csv()
        .await
        .map_err(ApiError::service(EXPORT_ERROR))?;

    let filename = format!("{}_{}.csv", entity, Utc::now().format("%Y%m%d_%H%M%S"));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        Body::from(body),
    )
        .into_response())
}
