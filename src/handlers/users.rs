use crate::{
    auth::AdminUser,
    errors::ApiError,
    handlers::common::{map_service_error, success_message, success_response},
    AppState,
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{delete, get, put},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: String,
}

/// Admin-only account management.
pub fn users_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_users))
        .route("/:id/role", put(set_role))
        .route("/:id", delete(delete_user))
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, ApiError> {
    let users = state
        .services
        .users
        .list_users()
        .await
        .map_err(map_service_error)?;
    Ok(success_response(users))
}

async fn set_role(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetRoleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .services
        .users
        .set_role(id, &payload.role)
        .await
        .map_err(map_service_error)?;
    Ok(success_message("Role updated", user))
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .users
        .delete_user(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_message("User deleted", ()))
}
