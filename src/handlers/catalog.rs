use crate::{
    auth::{AdminUser, AuthenticatedUser},
    errors::ApiError,
    handlers::common::{
        created_message, map_service_error, success_message, success_response, validate_input,
    },
    services::catalog::CatalogEntryInput,
    AppState,
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntryRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    pub description: Option<String>,
}

impl From<CatalogEntryRequest> for CatalogEntryInput {
    fn from(req: CatalogEntryRequest) -> Self {
        CatalogEntryInput {
            name: req.name,
            description: req.description,
        }
    }
}

/// One route group per lookup type. Reads need any authenticated user,
/// mutations need the admin role.
macro_rules! catalog_handlers {
    ($create:ident, $list:ident, $update:ident, $delete:ident,
     $created_msg:expr, $updated_msg:expr, $deleted_msg:expr) => {
        async fn $create(
            State(state): State<Arc<AppState>>,
            _admin: AdminUser,
            Json(payload): Json<CatalogEntryRequest>,
        ) -> Result<impl IntoResponse, ApiError> {
            validate_input(&payload)?;
            let entry = state
                .services
                .catalog
                .$create(payload.into())
                .await
                .map_err(map_service_error)?;
            Ok(created_message($created_msg, entry))
        }

        async fn $list(
            State(state): State<Arc<AppState>>,
            _user: AuthenticatedUser,
        ) -> Result<impl IntoResponse, ApiError> {
            let entries = state
                .services
                .catalog
                .$list()
                .await
                .map_err(map_service_error)?;
            Ok(success_response(entries))
        }

        async fn $update(
            State(state): State<Arc<AppState>>,
            _admin: AdminUser,
            Path(id): Path<Uuid>,
            Json(payload): Json<CatalogEntryRequest>,
        ) -> Result<impl IntoResponse, ApiError> {
            validate_input(&payload)?;
            let entry = state
                .services
                .catalog
                .$update(id, payload.into())
                .await
                .map_err(map_service_error)?;
            Ok(success_message($updated_msg, entry))
        }

        async fn $delete(
            State(state): State<Arc<AppState>>,
            _admin: AdminUser,
            Path(id): Path<Uuid>,
        ) -> Result<impl IntoResponse, ApiError> {
            state
                .services
                .catalog
                .$delete(id)
                .await
                .map_err(map_service_error)?;
            Ok(success_message($deleted_msg, ()))
        }
    };
}

catalog_handlers!(
    create_category,
    list_categories,
    update_category,
    delete_category,
    "Category created",
    "Category updated",
    "Category deleted"
);
catalog_handlers!(
    create_flavor,
    list_flavors,
    update_flavor,
    delete_flavor,
    "Flavor created",
    "Flavor updated",
    "Flavor deleted"
);
catalog_handlers!(
    create_size,
    list_sizes,
    update_size,
    delete_size,
    "Size created",
    "Size updated",
    "Size deleted"
);
catalog_handlers!(
    create_tag,
    list_tags,
    update_tag,
    delete_tag,
    "Tag created",
    "Tag updated",
    "Tag deleted"
);
catalog_handlers!(
    create_sponge_type,
    list_sponge_types,
    update_sponge_type,
    delete_sponge_type,
    "Sponge type created",
    "Sponge type updated",
    "Sponge type deleted"
);
catalog_handlers!(
    create_shape,
    list_shapes,
    update_shape,
    delete_shape,
    "Shape created",
    "Shape updated",
    "Shape deleted"
);
catalog_handlers!(
    create_availability,
    list_availabilities,
    update_availability,
    delete_availability,
    "Availability created",
    "Availability updated",
    "Availability deleted"
);
catalog_handlers!(
    create_delivery_option,
    list_delivery_options,
    update_delivery_option,
    delete_delivery_option,
    "Delivery option created",
    "Delivery option updated",
    "Delivery option deleted"
);
catalog_handlers!(
    create_dietary_preference,
    list_dietary_preferences,
    update_dietary_preference,
    delete_dietary_preference,
    "Dietary preference created",
    "Dietary preference updated",
    "Dietary preference deleted"
);

pub fn catalog_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/:id",
            put(update_category).delete(delete_category),
        )
        .route("/flavors", get(list_flavors).post(create_flavor))
        .route("/flavors/:id", put(update_flavor).delete(delete_flavor))
        .route("/sizes", get(list_sizes).post(create_size))
        .route("/sizes/:id", put(update_size).delete(delete_size))
        .route("/tags", get(list_tags).post(create_tag))
        .route("/tags/:id", put(update_tag).delete(delete_tag))
        .route(
            "/sponge-types",
            get(list_sponge_types).post(create_sponge_type),
        )
        .route(
            "/sponge-types/:id",
            put(update_sponge_type).delete(delete_sponge_type),
        )
        .route("/shapes", get(list_shapes).post(create_shape))
        .route("/shapes/:id", put(update_shape).delete(delete_shape))
        .route(
            "/availabilities",
            get(list_availabilities).post(create_availability),
        )
        .route(
            "/availabilities/:id",
            put(update_availability).delete(delete_availability),
        )
        .route(
            "/delivery-options",
            get(list_delivery_options).post(create_delivery_option),
        )
        .route(
            "/delivery-options/:id",
            put(update_delivery_option).delete(delete_delivery_option),
        )
        .route(
            "/dietary-preferences",
            get(list_dietary_preferences).post(create_dietary_preference),
        )
        .route(
            "/dietary-preferences/:id",
            put(update_dietary_preference).delete(delete_dietary_preference),
        )
}
