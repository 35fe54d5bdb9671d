use crate::{
    auth::AuthenticatedUser,
    errors::ApiError,
    handlers::common::{map_service_error, success_message, success_response},
    services::carts::{AddToCartInput, Customization},
    AppState,
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub cake_id: Uuid,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    pub sponge_type_id: Uuid,
    pub shape_id: Uuid,
    pub size_id: Uuid,
    pub flavor_id: Uuid,
    #[serde(default)]
    pub inscription: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartItemRequest {
    pub quantity: i32,
    pub sponge_type_id: Uuid,
    pub shape_id: Uuid,
    pub size_id: Uuid,
    pub flavor_id: Uuid,
    #[serde(default)]
    pub inscription: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveCartItemRequest {
    pub sponge_type_id: Uuid,
    pub shape_id: Uuid,
    pub size_id: Uuid,
    pub flavor_id: Uuid,
    #[serde(default)]
    pub inscription: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyCouponRequest {
    pub coupon_code: String,
}

pub fn cart_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_cart).post(add_item))
        .route("/count", get(count_items))
        .route("/apply-coupon", post(apply_coupon))
        .route("/:cake_id", put(update_item).delete(remove_item))
}

async fn add_item(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<AddToCartRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state
        .services
        .carts
        .add_item(
            user.user_id,
            AddToCartInput {
                cake_id: payload.cake_id,
                quantity: payload.quantity,
                customization: Customization {
                    sponge_type_id: payload.sponge_type_id,
                    shape_id: payload.shape_id,
                    size_id: payload.size_id,
                    flavor_id: payload.flavor_id,
                    inscription: payload.inscription,
                },
            },
        )
        .await
        .map_err(map_service_error)?;
    Ok(success_message("Item added to cart", cart))
}

async fn get_cart(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state
        .services
        .carts
        .get_cart(user.user_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(cart))
}

async fn count_items(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let count = state
        .services
        .carts
        .count(user.user_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({ "count": count })))
}

async fn update_item(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(cake_id): Path<Uuid>,
    Json(payload): Json<UpdateCartItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state
        .services
        .carts
        .update_item(
            user.user_id,
            cake_id,
            payload.quantity,
            Customization {
                sponge_type_id: payload.sponge_type_id,
                shape_id: payload.shape_id,
                size_id: payload.size_id,
                flavor_id: payload.flavor_id,
                inscription: payload.inscription,
            },
        )
        .await
        .map_err(map_service_error)?;
    Ok(success_message("Cart item updated", cart))
}

async fn remove_item(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(cake_id): Path<Uuid>,
    Json(payload): Json<RemoveCartItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state
        .services
        .carts
        .remove_item(
            user.user_id,
            cake_id,
            Customization {
                sponge_type_id: payload.sponge_type_id,
                shape_id: payload.shape_id,
                size_id: payload.size_id,
                flavor_id: payload.flavor_id,
                inscription: payload.inscription,
            },
        )
        .await
        .map_err(map_service_error)?;
    Ok(success_message("Cart item removed", cart))
}

/// Preview only. The discount is re-evaluated inside the order transaction
/// when the order is actually placed.
async fn apply_coupon(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<ApplyCouponRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state
        .services
        .carts
        .get_cart(user.user_id)
        .await
        .map_err(map_service_error)?;
    if cart.items.is_empty() {
        return Err(ApiError::BadRequest("Cart is empty".to_string()));
    }

    let (_, evaluation) = state
        .services
        .coupons
        .evaluate_code(
            state.db.as_ref(),
            user.user_id,
            &payload.coupon_code,
            cart.subtotal,
        )
        .await
        .map_err(map_service_error)?;
    Ok(success_response(json!({
        "coupon": {
            "code": evaluation.code,
            "discountAmount": evaluation.discount_amount,
        },
        "totalAfterDiscount": evaluation.total_after_discount,
    })))
}
