//! Project Config Route
//!
//! - GET /api/v1/config - Branding, menu and entity declarations
//!
//! With an `x-user-id` header the menu is narrowed to the entries the
//! user's permissions allow; anonymous callers (the login screen) get the
//! full menu.

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::api::actor::Actor;
use crate::api::dto::ConfigResponse;
use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::crud::ServiceError;

pub async fn get_config(
    State(state): State<Arc<AppState>>,
    actor: Option<Actor>,
) -> ApiResult<Json<ConfigResponse>> {
    let project = state.project.as_ref();

    let menu = match actor {
        Some(actor) => match state.users.get(actor.uid()).await {
            Ok(user) => project.menu_for(|name| user.permissions.has(name)),
            Err(ServiceError::NotFound { .. }) => project.menu_for(|_| false),
            Err(e) => return Err(e.into()),
        },
        None => project.menu_items.clone(),
    };

    Ok(Json(ConfigResponse::new(project, menu)))
}
