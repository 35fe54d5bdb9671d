use crate::{
    auth::AuthenticatedUser,
    errors::ApiError,
    handlers::common::{created_message, map_service_error, success_response},
    services::orders::{PlaceOrderInput, ShippingAddressInput},
    AppState,
};
use axum::{
    extract::State,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddressRequest {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub address_id: Option<Uuid>,
    pub shipping_address: Option<ShippingAddressRequest>,
    pub coupon_code: Option<String>,
}

pub fn orders_routes() -> Router<Arc<AppState>> {
    Router::new().route("/", post(place_order).get(list_orders))
}

async fn place_order(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<PlaceOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .place_order(
            user.user_id,
            PlaceOrderInput {
                address_id: payload.address_id,
                shipping_address: payload.shipping_address.map(|a| ShippingAddressInput {
                    street: a.street,
                    city: a.city,
                    state: a.state,
                    zip: a.zip,
                }),
                coupon_code: payload.coupon_code,
            },
        )
        .await
        .map_err(map_service_error)?;
    Ok(created_message("Order placed", order))
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let orders = state
        .services
        .orders
        .list_orders(user.user_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(orders))
}
