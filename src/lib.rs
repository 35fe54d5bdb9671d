//! Cakeshop API Library
//!
//! This crate provides the backend for a cake storefront: accounts and
//! profiles, the cake catalog with its lookup tables, image storage,
//! per-customization carts, coupons and order placement.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod services;

use axum::{extract::State, response::Json, routing::get, Router};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use std::sync::Arc;

use services::{
    cakes::CakeService, carts::CartService, catalog::CatalogService, coupons::CouponService,
    images::ImageService, orders::OrderService, profiles::ProfileService, users::UserService,
};

/// Shared handles for every request handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: Arc<events::EventSender>,
    pub services: AppServices,
}

#[derive(Clone)]
pub struct AppServices {
    pub auth: Arc<auth::AuthService>,
    pub users: Arc<UserService>,
    pub profiles: Arc<ProfileService>,
    pub catalog: Arc<CatalogService>,
    pub cakes: Arc<CakeService>,
    pub images: Arc<ImageService>,
    pub carts: Arc<CartService>,
    pub coupons: Arc<CouponService>,
    pub orders: Arc<OrderService>,
}

impl AppServices {
    /// Wires every service against one database handle and event channel.
    pub fn build(
        db: Arc<DatabaseConnection>,
        config: &config::AppConfig,
        event_sender: Arc<events::EventSender>,
    ) -> Self {
        let auth = Arc::new(auth::AuthService::new(
            config.jwt_secret.clone(),
            config.jwt_expiration,
            config.auth_issuer.clone(),
            config.auth_audience.clone(),
        ));
        let coupons = Arc::new(CouponService::new(db.clone(), event_sender.clone()));

        Self {
            users: Arc::new(UserService::new(
                db.clone(),
                auth.clone(),
                event_sender.clone(),
            )),
            profiles: Arc::new(ProfileService::new(db.clone())),
            catalog: Arc::new(CatalogService::new(db.clone())),
            cakes: Arc::new(CakeService::new(db.clone(), event_sender.clone())),
            images: Arc::new(ImageService::new(db.clone(), event_sender.clone())),
            carts: Arc::new(CartService::new(db.clone(), event_sender.clone())),
            orders: Arc::new(OrderService::new(
                db,
                event_sender,
                coupons.clone(),
            )),
            coupons,
            auth,
        }
    }
}

/// Everything under `/api`. Signup, login and image serving are public;
/// the rest requires a bearer token via the handler extractors.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(handlers::auth::auth_routes())
        .nest("/users", handlers::users::users_routes())
        .nest("/profile", handlers::profile::profile_routes())
        .merge(handlers::catalog::catalog_routes())
        .nest("/cakes", handlers::cakes::cakes_routes())
        .nest("/images", handlers::images::images_routes())
        .nest("/cart", handlers::carts::cart_routes())
        .nest("/coupons", handlers::coupons::coupons_routes())
        .nest("/orders", handlers::orders::orders_routes())
        .route("/health", get(health_check))
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    Json(json!({
        "status": db_status,
        "checks": { "database": db_status },
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
