use crate::{
    auth::AuthenticatedUser,
    errors::ApiError,
    handlers::common::{created_message, map_service_error},
    AppState,
};
use axum::{
    extract::{FromRequest, Multipart, Path, Request, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUrlRequest {
    pub image_url: String,
}

pub fn images_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(upload_image))
        .route("/:id", get(serve_image))
}

/// Accepts either a multipart upload (field `image`) or a JSON body with
/// an `imageUrl` to fetch, switching on the request content type.
async fn upload_image(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    request: Request,
) -> Result<impl IntoResponse, ApiError> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let meta = if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?;

        let mut stored = None;
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
        {
            if field.name() != Some("image") {
                continue;
            }
            let filename = field.file_name().unwrap_or("image").to_string();
            let mime_type = field.content_type().unwrap_or_default().to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?
                .to_vec();
            stored = Some(
                state
                    .services
                    .images
                    .store(data, filename, mime_type)
                    .await
                    .map_err(map_service_error)?,
            );
            break;
        }
        stored.ok_or_else(|| ApiError::BadRequest("Missing 'image' field".to_string()))?
    } else {
        let Json(payload) = Json::<ImageUrlRequest>::from_request(request, &())
            .await
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))?;
        state
            .services
            .images
            .store_from_url(&payload.image_url)
            .await
            .map_err(map_service_error)?
    };

    Ok(created_message("Image stored", meta))
}

/// Serves the raw blob. Public so storefront image tags can load it
/// without a token.
async fn serve_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let image = state
        .services
        .images
        .get_image(id)
        .await
        .map_err(map_service_error)?;

    Ok((
        [
            (header::CONTENT_TYPE, image.mime_type),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", image.filename),
            ),
        ],
        image.data,
    ))
}
