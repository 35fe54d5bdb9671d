use crate::{
    auth::AuthenticatedUser,
    errors::ApiError,
    handlers::common::{
        created_message, map_service_error, success_message, success_response, validate_input,
    },
    services::profiles::{AddressInput, UpdateProfileInput},
    AppState,
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{10}$").expect("valid regex"));
static ZIP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{6}$").expect("valid regex"));

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, message = "Name cannot be blank"))]
    pub name: Option<String>,
    #[validate(email(message = "A valid email is required"))]
    pub email: Option<String>,
    #[validate(regex(path = "PHONE_RE", message = "Phone must be 10 digits"))]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddressRequest {
    #[validate(length(min = 1, message = "Street is required"))]
    pub street: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "State is required"))]
    pub state: String,
    #[validate(regex(path = "ZIP_RE", message = "Zip must be 6 digits"))]
    pub zip: String,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub new_password: String,
}

impl From<AddressRequest> for AddressInput {
    fn from(req: AddressRequest) -> Self {
        AddressInput {
            street: req.street,
            city: req.city,
            state: req.state,
            zip: req.zip,
            is_default: req.is_default,
        }
    }
}

pub fn profile_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_profile).put(update_profile))
        .route("/password", put(change_password))
        .route("/address", post(add_address))
        .route("/address/:id", put(update_address).delete(delete_address))
}

async fn get_profile(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state
        .services
        .profiles
        .get_profile(user.user_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(profile))
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let profile = state
        .services
        .profiles
        .update_profile(
            user.user_id,
            UpdateProfileInput {
                name: payload.name,
                email: payload.email,
                phone: payload.phone,
            },
        )
        .await
        .map_err(map_service_error)?;
    Ok(success_message("Profile updated", profile))
}

async fn change_password(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    state
        .services
        .users
        .change_password(user.user_id, &payload.current_password, &payload.new_password)
        .await
        .map_err(map_service_error)?;
    Ok(success_message("Password changed", ()))
}

async fn add_address(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<AddressRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let profile = state
        .services
        .profiles
        .add_address(user.user_id, payload.into())
        .await
        .map_err(map_service_error)?;
    Ok(created_message("Address added", profile))
}

async fn update_address(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddressRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let profile = state
        .services
        .profiles
        .update_address(user.user_id, id, payload.into())
        .await
        .map_err(map_service_error)?;
    Ok(success_message("Address updated", profile))
}

async fn delete_address(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state
        .services
        .profiles
        .delete_address(user.user_id, id)
        .await
        .map_err(map_service_error)?;
    Ok(success_message("Address deleted", profile))
}
