use crate::{
    auth::{AdminUser, AuthenticatedUser},
    errors::ApiError,
    handlers::common::{
        created_message, map_service_error, success_message, success_response, validate_input,
    },
    services::cakes::CakeInput,
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CakeRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    pub stock: Option<i32>,
    pub category_id: Uuid,
    pub sponge_type_id: Uuid,
    pub shape_id: Uuid,
    pub availability_id: Uuid,
    pub image_ids: Vec<Uuid>,
    #[serde(default)]
    pub tag_ids: Vec<Uuid>,
    pub flavor_ids: Vec<Uuid>,
    pub size_ids: Vec<Uuid>,
    #[serde(default)]
    pub dietary_preference_ids: Vec<Uuid>,
    pub delivery_option_ids: Vec<Uuid>,
}

impl From<CakeRequest> for CakeInput {
    fn from(req: CakeRequest) -> Self {
        CakeInput {
            name: req.name,
            description: req.description,
            price: req.price,
            stock: req.stock,
            category_id: req.category_id,
            sponge_type_id: req.sponge_type_id,
            shape_id: req.shape_id,
            availability_id: req.availability_id,
            image_ids: req.image_ids,
            tag_ids: req.tag_ids,
            flavor_ids: req.flavor_ids,
            size_ids: req.size_ids,
            dietary_preference_ids: req.dietary_preference_ids,
            delivery_option_ids: req.delivery_option_ids,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListCakesQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_page() -> u64 {
    1
}

fn default_limit() -> u64 {
    6
}

pub fn cakes_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_cakes).post(create_cake))
        .route("/:id", get(get_cake).put(update_cake).delete(delete_cake))
}

async fn list_cakes(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Query(query): Query<ListCakesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .services
        .cakes
        .list_cakes(query.page, query.limit)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(page))
}

async fn get_cake(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let cake = state
        .services
        .cakes
        .get_cake(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(cake))
}

async fn create_cake(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Json(payload): Json<CakeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let cake = state
        .services
        .cakes
        .create_cake(admin.0.user_id, payload.into())
        .await
        .map_err(map_service_error)?;
    Ok(created_message("Cake created", cake))
}

async fn update_cake(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CakeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let cake = state
        .services
        .cakes
        .update_cake(id, payload.into())
        .await
        .map_err(map_service_error)?;
    Ok(success_message("Cake updated", cake))
}

async fn delete_cake(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .cakes
        .delete_cake(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_message("Cake deleted", ()))
}
