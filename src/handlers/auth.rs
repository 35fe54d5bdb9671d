use crate::{
    errors::ApiError,
    handlers::common::{created_response, map_service_error, success_response, validate_input},
    services::users::SignupInput,
    AppState,
};
use axum::{extract::State, response::IntoResponse, routing::post, Json, Router};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{10}$").expect("valid regex"));

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(regex(path = "PHONE_RE", message = "Phone must be 10 digits"))]
    pub phone: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

pub fn auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
}

async fn signup(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let response = state
        .services
        .users
        .signup(SignupInput {
            name: payload.name,
            email: payload.email,
            password: payload.password,
            phone: payload.phone,
        })
        .await
        .map_err(map_service_error)?;

    Ok(created_response(response))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let response = state
        .services
        .users
        .login(&payload.email, &payload.password)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(response))
}
