use crate::{
    entities::image,
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

pub const ALLOWED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif"];

static URL_EXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(jpeg|jpg|png|gif)$").expect("valid regex"));

/// Stored-image metadata returned to clients (the blob stays server-side).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMeta {
    pub id: Uuid,
    pub filename: String,
    pub mime_type: String,
    pub size: i64,
}

/// Image blob storage. Accepts direct uploads and remote URLs; both paths
/// go through the same MIME whitelist.
#[derive(Clone)]
pub struct ImageService {
    db: Arc<DatabaseConnection>,
    http: reqwest::Client,
    event_sender: Arc<EventSender>,
}

impl ImageService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db,
            http: reqwest::Client::new(),
            event_sender,
        }
    }

    /// Persists an uploaded blob after checking the MIME whitelist.
    #[instrument(skip(self, data), fields(filename = %filename, size = data.len()))]
    pub async fn store(
        &self,
        data: Vec<u8>,
        filename: String,
        mime_type: String,
    ) -> Result<ImageMeta, ServiceError> {
        check_mime(&mime_type)?;
        if data.is_empty() {
            return Err(ServiceError::ValidationError(
                "Image data is empty".to_string(),
            ));
        }

        let size = data.len() as i64;
        let model = image::ActiveModel {
            id: Set(Uuid::new_v4()),
            data: Set(data),
            filename: Set(filename),
            mime_type: Set(mime_type),
            size: Set(size),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;

        self.event_sender
            .send_or_log(Event::ImageStored(model.id))
            .await;
        info!("Stored image {} ({} bytes)", model.id, model.size);

        Ok(ImageMeta {
            id: model.id,
            filename: model.filename,
            mime_type: model.mime_type,
            size: model.size,
        })
    }

    /// Fetches an image by URL. The URL path must end in a known image
    /// extension and the response content-type must pass the whitelist.
    #[instrument(skip(self))]
    pub async fn store_from_url(&self, raw_url: &str) -> Result<ImageMeta, ServiceError> {
        let url = reqwest::Url::parse(raw_url)
            .map_err(|_| ServiceError::ValidationError("Invalid image URL".to_string()))?;
        if !URL_EXT_RE.is_match(url.path()) {
            return Err(ServiceError::ValidationError(
                "Image URL must end in .jpeg, .jpg, .png or .gif".to_string(),
            ));
        }

        let filename = url
            .path_segments()
            .and_then(|segments| segments.last())
            .unwrap_or("image")
            .to_string();

        let response = self.http.get(url).send().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!("Failed to fetch image: {}", e))
        })?;
        if !response.status().is_success() {
            return Err(ServiceError::ExternalServiceError(format!(
                "Image fetch returned status {}",
                response.status()
            )));
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(';').next().unwrap_or(value).trim().to_string())
            .unwrap_or_default();
        check_mime(&mime_type)?;

        let data = response
            .bytes()
            .await
            .map_err(|e| {
                ServiceError::ExternalServiceError(format!("Failed to read image body: {}", e))
            })?
            .to_vec();

        self.store(data, filename, mime_type).await
    }

    /// Loads an image with its blob for serving.
    #[instrument(skip(self))]
    pub async fn get_image(&self, id: Uuid) -> Result<image::Model, ServiceError> {
        image::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Image not found".to_string()))
    }
}

fn check_mime(mime_type: &str) -> Result<(), ServiceError> {
    if !ALLOWED_MIME_TYPES.contains(&mime_type) {
        return Err(ServiceError::ValidationError(
            "Only JPEG, PNG and GIF images are allowed".to_string(),
        ));
    }
    Ok(())
}
