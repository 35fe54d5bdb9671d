use crate::{
    auth::AdminUser,
    entities::coupon::DiscountType,
    errors::ApiError,
    handlers::common::{
        created_message, map_service_error, success_message, success_response, validate_input,
    },
    services::coupons::CouponInput,
    AppState,
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CouponRequest {
    #[validate(length(min = 1, message = "Code is required"))]
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    #[serde(default)]
    pub min_order_amount: Decimal,
    pub max_discount_amount: Option<Decimal>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub usage_limit: Option<i32>,
}

fn default_active() -> bool {
    true
}

impl From<CouponRequest> for CouponInput {
    fn from(req: CouponRequest) -> Self {
        CouponInput {
            code: req.code,
            discount_type: req.discount_type,
            discount_value: req.discount_value,
            min_order_amount: req.min_order_amount,
            max_discount_amount: req.max_discount_amount,
            is_active: req.is_active,
            valid_from: req.valid_from,
            valid_until: req.valid_until,
            usage_limit: req.usage_limit,
        }
    }
}

/// Admin-only coupon management. Redemption happens through order placement.
pub fn coupons_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_coupons).post(create_coupon))
        .route("/:id", axum::routing::put(update_coupon).delete(delete_coupon))
}

async fn list_coupons(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, ApiError> {
    let coupons = state
        .services
        .coupons
        .list_coupons()
        .await
        .map_err(map_service_error)?;
    Ok(success_response(coupons))
}

async fn create_coupon(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(payload): Json<CouponRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let coupon = state
        .services
        .coupons
        .create_coupon(payload.into())
        .await
        .map_err(map_service_error)?;
    Ok(created_message("Coupon created", coupon))
}

async fn update_coupon(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CouponRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let coupon = state
        .services
        .coupons
        .update_coupon(id, payload.into())
        .await
        .map_err(map_service_error)?;
    Ok(success_message("Coupon updated", coupon))
}

async fn delete_coupon(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .coupons
        .delete_coupon(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_message("Coupon deleted", ()))
}
