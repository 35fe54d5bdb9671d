use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use cakeshop_api::{
    auth::ROLE_ADMIN,
    config::AppConfig,
    db,
    events::{self, EventSender},
    AppServices, AppState,
};

/// Test harness: the full router over an in-memory SQLite database with
/// migrations applied and default catalog entries seeded.
pub struct TestApp {
    router: Router,
    pub state: Arc<AppState>,
    _event_task: tokio::task::JoinHandle<()>,
}

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test_secret_key_for_testing_purposes_only_32chars".to_string(),
        jwt_expiration: 3600,
        auth_issuer: "cakeshop-api".to_string(),
        auth_audience: "cakeshop-clients".to_string(),
        host: "127.0.0.1".to_string(),
        port: 18_080,
        environment: "test".to_string(),
        log_level: "warn".to_string(),
        log_json: false,
        auto_migrate: true,
        // A single connection keeps the in-memory database alive and shared.
        db_max_connections: 1,
        db_min_connections: 1,
        cors_allowed_origins: None,
        cors_allow_credentials: false,
    }
}

impl TestApp {
    pub async fn new() -> Self {
        let cfg = test_config();

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let services = AppServices::build(db_arc.clone(), &cfg, event_sender.clone());
        services
            .catalog
            .seed_defaults()
            .await
            .expect("failed to seed catalog defaults");

        let state = Arc::new(AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        });

        let router = Router::new()
            .nest("/api", cakeshop_api::api_routes())
            .with_state(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    /// Sends a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Sends a request with an arbitrary body and content type.
    #[allow(dead_code)]
    pub async fn request_raw(
        &self,
        method: Method,
        uri: &str,
        content_type: &str,
        body: Vec<u8>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", content_type);
        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }
        let request = builder.body(Body::from(body)).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Registers a storefront user and returns `(user_id, token)`.
    pub async fn signup_user(&self, name: &str, email: &str) -> (Uuid, String) {
        let response = self
            .request(
                Method::POST,
                "/api/signup",
                Some(json!({
                    "name": name,
                    "email": email,
                    "password": "password1",
                    "phone": "9876543210",
                })),
                None,
            )
            .await;
        assert_eq!(response.status(), 201, "signup should succeed");

        let body = response_json(response).await;
        let user_id = body["user"]["id"]
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .expect("signup response carries the user id");
        let token = body["token"].as_str().expect("token").to_string();
        (user_id, token)
    }

    /// Mints an admin bearer token without going through signup.
    pub fn admin_token(&self) -> String {
        self.state
            .services
            .auth
            .generate_token(Uuid::new_v4(), ROLE_ADMIN)
            .expect("token generation")
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Ids for a ready-to-order cake with one valid customization choice per
/// lookup, created through the service layer.
#[allow(dead_code)]
pub struct CakeFixture {
    pub cake_id: Uuid,
    pub sponge_type_id: Uuid,
    pub shape_id: Uuid,
    pub size_id: Uuid,
    pub flavor_id: Uuid,
}

/// Creates the catalog rows and a cake priced at 500.0 with the given
/// stock. Prices stay on binary-exact fractions so decimal comparisons
/// survive the SQLite round-trip.
#[allow(dead_code)]
pub async fn create_cake_fixture(app: &TestApp, name: &str, stock: Option<i32>) -> CakeFixture {
    use cakeshop_api::services::{cakes::CakeInput, catalog::CatalogEntryInput};
    use rust_decimal_macros::dec;

    let services = &app.state.services;

    let sponge_types = services
        .catalog
        .list_sponge_types()
        .await
        .expect("seeded sponge types");
    let shapes = services.catalog.list_shapes().await.expect("seeded shapes");

    let category = services
        .catalog
        .create_category(CatalogEntryInput {
            name: format!("{} category", name),
            description: None,
        })
        .await
        .expect("category");
    let flavor = services
        .catalog
        .create_flavor(CatalogEntryInput {
            name: format!("{} flavor", name),
            description: None,
        })
        .await
        .expect("flavor");
    let size = services
        .catalog
        .create_size(CatalogEntryInput {
            name: format!("{} size", name),
            description: None,
        })
        .await
        .expect("size");
    let availability = services
        .catalog
        .create_availability(CatalogEntryInput {
            name: format!("{} availability", name),
            description: None,
        })
        .await
        .expect("availability");
    let delivery = services
        .catalog
        .create_delivery_option(CatalogEntryInput {
            name: format!("{} delivery", name),
            description: None,
        })
        .await
        .expect("delivery option");

    let image = services
        .images
        .store(
            vec![0x89, 0x50, 0x4e, 0x47],
            format!("{}.png", name),
            "image/png".to_string(),
        )
        .await
        .expect("image");

    let cake = services
        .cakes
        .create_cake(
            Uuid::new_v4(),
            CakeInput {
                name: name.to_string(),
                description: "A test cake".to_string(),
                price: dec!(500.0),
                stock,
                category_id: category.id,
                sponge_type_id: sponge_types[0].id,
                shape_id: shapes[0].id,
                availability_id: availability.id,
                image_ids: vec![image.id],
                tag_ids: vec![],
                flavor_ids: vec![flavor.id],
                size_ids: vec![size.id],
                dietary_preference_ids: vec![],
                delivery_option_ids: vec![delivery.id],
            },
        )
        .await
        .expect("cake");

    CakeFixture {
        cake_id: cake.id,
        sponge_type_id: sponge_types[0].id,
        shape_id: shapes[0].id,
        size_id: size.id,
        flavor_id: flavor.id,
    }
}
