//! Signup, login and profile access over the HTTP surface.

mod common;

use axum::http::Method;
use common::{response_json, TestApp};
use serde_json::json;

#[tokio::test]
async fn signup_returns_token_and_user_view() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/signup",
            Some(json!({
                "name": "Asha",
                "email": "asha@example.com",
                "password": "secret99",
                "phone": "9876543210",
            })),
            None,
        )
        .await;
    assert_eq!(response.status(), 201);

    let body = response_json(response).await;
    assert!(body["token"].as_str().is_some());
    assert_eq!(body["user"]["email"], "asha@example.com");
    assert_eq!(body["user"]["role"], "user");
    assert!(
        body["user"].get("passwordHash").is_none() && body["user"].get("password_hash").is_none(),
        "password hash must never leave the server"
    );
}

#[tokio::test]
async fn signup_rejects_duplicate_email() {
    let app = TestApp::new().await;
    app.signup_user("First", "dup@example.com").await;

    let response = app
        .request(
            Method::POST,
            "/api/signup",
            Some(json!({
                "name": "Second",
                "email": "dup@example.com",
                "password": "secret99",
                "phone": "9876543210",
            })),
            None,
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn signup_validates_password_and_phone() {
    let app = TestApp::new().await;

    let short_password = app
        .request(
            Method::POST,
            "/api/signup",
            Some(json!({
                "name": "A",
                "email": "short@example.com",
                "password": "abc",
                "phone": "9876543210",
            })),
            None,
        )
        .await;
    assert_eq!(short_password.status(), 400);

    let bad_phone = app
        .request(
            Method::POST,
            "/api/signup",
            Some(json!({
                "name": "A",
                "email": "phone@example.com",
                "password": "secret99",
                "phone": "12345",
            })),
            None,
        )
        .await;
    assert_eq!(bad_phone.status(), 400);
}

#[tokio::test]
async fn login_distinguishes_unknown_email_from_bad_password() {
    let app = TestApp::new().await;
    app.signup_user("Asha", "login@example.com").await;

    let unknown = app
        .request(
            Method::POST,
            "/api/login",
            Some(json!({ "email": "nobody@example.com", "password": "password1" })),
            None,
        )
        .await;
    assert_eq!(unknown.status(), 404);

    let wrong_password = app
        .request(
            Method::POST,
            "/api/login",
            Some(json!({ "email": "login@example.com", "password": "wrongpass" })),
            None,
        )
        .await;
    assert_eq!(wrong_password.status(), 400);

    let ok = app
        .request(
            Method::POST,
            "/api/login",
            Some(json!({ "email": "login@example.com", "password": "password1" })),
            None,
        )
        .await;
    assert_eq!(ok.status(), 200);
    let body = response_json(ok).await;
    assert!(body["token"].as_str().is_some());
}

#[tokio::test]
async fn profile_requires_bearer_token() {
    let app = TestApp::new().await;

    let anonymous = app.request(Method::GET, "/api/profile", None, None).await;
    assert_eq!(anonymous.status(), 401);

    let (_, token) = app.signup_user("Asha", "profile@example.com").await;
    let authed = app
        .request(Method::GET, "/api/profile", None, Some(&token))
        .await;
    assert_eq!(authed.status(), 200);

    let body = response_json(authed).await;
    assert_eq!(body["email"], "profile@example.com");
    assert_eq!(body["addresses"].as_array().map(|a| a.len()), Some(0));
}

#[tokio::test]
async fn admin_routes_reject_regular_users() {
    let app = TestApp::new().await;
    let (_, token) = app.signup_user("Asha", "notadmin@example.com").await;

    let forbidden = app
        .request(Method::GET, "/api/users", None, Some(&token))
        .await;
    assert_eq!(forbidden.status(), 403);

    let allowed = app
        .request(Method::GET, "/api/users", None, Some(&app.admin_token()))
        .await;
    assert_eq!(allowed.status(), 200);
}

#[tokio::test]
async fn address_book_roundtrip() {
    let app = TestApp::new().await;
    let (_, token) = app.signup_user("Asha", "addr@example.com").await;

    let added = app
        .request(
            Method::POST,
            "/api/profile/address",
            Some(json!({
                "street": "12 MG Road",
                "city": "Bengaluru",
                "state": "KA",
                "zip": "560001",
                "isDefault": true,
            })),
            Some(&token),
        )
        .await;
    assert_eq!(added.status(), 201);

    let body = response_json(added).await;
    let addresses = body["data"]["addresses"].as_array().expect("addresses");
    assert_eq!(addresses.len(), 1);
    assert_eq!(addresses[0]["is_default"], true);

    let bad_zip = app
        .request(
            Method::POST,
            "/api/profile/address",
            Some(json!({
                "street": "12 MG Road",
                "city": "Bengaluru",
                "state": "KA",
                "zip": "1234",
            })),
            Some(&token),
        )
        .await;
    assert_eq!(bad_zip.status(), 400);
}
