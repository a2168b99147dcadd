//! User Routes
//!
//! - GET /api/v1/users - All users by display name
//! - POST /api/v1/users - Provision a user under the uid given in the body
//! - GET /api/v1/users/:uid
//! - PUT /api/v1/users/:uid
//! - DELETE /api/v1/users/:uid

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::actor::Actor;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::clinic::{User, UserForm};
use crate::store::Stored;

const LOAD_ERROR: &str = "Error al cargar usuarios";
const SAVE_ERROR: &str = "Error al guardar usuario";
const DELETE_ERROR: &str = "Error al eliminar usuario";

pub async fn list(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Stored<User>>>> {
    let users = state
        .users
        .all()
        .await
        .map_err(ApiError::service(LOAD_ERROR))?;
    Ok(Json(users))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
) -> ApiResult<Json<Stored<User>>> {
    let user = state
        .users
        .get(&uid)
        .await
        .map_err(ApiError::service(LOAD_ERROR))?;
    Ok(Json(user))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(form): Json<UserForm>,
) -> ApiResult<(StatusCode, Json<Stored<User>>)> {
    let user = state
        .users
        .create(&form, actor.uid())
        .await
        .map_err(ApiError::service(SAVE_ERROR))?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
    actor: Actor,
    Json(form): Json<UserForm>,
) -> ApiResult<Json<Stored<User>>> {
    let user = state
        .users
        .update(&uid, &form, actor.uid())
        .await
        .map_err(ApiError::service(SAVE_ERROR))?;
    Ok(Json(user))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
    actor: Actor,
) -> ApiResult<StatusCode> {
    state
        .users
        .delete(&uid, actor.uid())
        .await
        .map_err(ApiError::service(DELETE_ERROR))?;
    Ok(StatusCode::NO_CONTENT)
}
