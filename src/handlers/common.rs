use crate::errors::{ApiError, ServiceError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use validator::Validate;

/// 200 with the payload serialized as-is.
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(data)).into_response()
}

/// 201 with the payload serialized as-is.
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(data)).into_response()
}

/// 200 with a `{ message, data }` envelope.
pub fn success_message<T: Serialize>(message: &str, data: T) -> Response {
    (
        StatusCode::OK,
        Json(json!({ "message": message, "data": data })),
    )
        .into_response()
}

/// 201 with a `{ message, data }` envelope.
pub fn created_message<T: Serialize>(message: &str, data: T) -> Response {
    (
        StatusCode::CREATED,
        Json(json!({ "message": message, "data": data })),
    )
        .into_response()
}

/// Runs the derive-based validation on a request body.
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ApiError> {
    input
        .validate()
        .map_err(|e| ApiError::ValidationError(e.to_string()))
}

/// Lifts a service failure into the response layer.
pub fn map_service_error(err: ServiceError) -> ApiError {
    ApiError::ServiceError(err)
}
