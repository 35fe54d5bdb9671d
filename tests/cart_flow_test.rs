//! Cart behavior: line identity is the full customization tuple, identical
//! lines merge, and stock bounds are enforced.

mod common;

use axum::http::Method;
use common::{create_cake_fixture, response_json, CakeFixture, TestApp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::str::FromStr;

fn add_payload(fixture: &CakeFixture, quantity: i32, inscription: &str) -> Value {
    json!({
        "cakeId": fixture.cake_id,
        "quantity": quantity,
        "spongeTypeId": fixture.sponge_type_id,
        "shapeId": fixture.shape_id,
        "sizeId": fixture.size_id,
        "flavorId": fixture.flavor_id,
        "inscription": inscription,
    })
}

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("not a decimal value: {other:?}"),
    }
}

#[tokio::test]
async fn identical_lines_merge_and_distinct_inscriptions_stay_separate() {
    let app = TestApp::new().await;
    let fixture = create_cake_fixture(&app, "Merge Cake", Some(50)).await;
    let (_, token) = app.signup_user("Asha", "merge@example.com").await;

    let first = app
        .request(
            Method::POST,
            "/api/cart",
            Some(add_payload(&fixture, 1, "Happy Birthday")),
            Some(&token),
        )
        .await;
    assert_eq!(first.status(), 200);

    // Same cake, same customization: quantities merge into one line.
    let second = app
        .request(
            Method::POST,
            "/api/cart",
            Some(add_payload(&fixture, 2, "Happy Birthday")),
            Some(&token),
        )
        .await;
    assert_eq!(second.status(), 200);

    let cart = response_json(second).await;
    let items = cart["data"]["items"].as_array().expect("items");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], 3);

    // Same cake, different inscription: a separate line.
    let third = app
        .request(
            Method::POST,
            "/api/cart",
            Some(add_payload(&fixture, 1, "Congrats")),
            Some(&token),
        )
        .await;
    let cart = response_json(third).await;
    let items = cart["data"]["items"].as_array().expect("items");
    assert_eq!(items.len(), 2);

    let count = app
        .request(Method::GET, "/api/cart/count", None, Some(&token))
        .await;
    let body = response_json(count).await;
    assert_eq!(body["count"], 4);
}

#[tokio::test]
async fn cart_view_joins_names_and_subtotal() {
    let app = TestApp::new().await;
    let fixture = create_cake_fixture(&app, "View Cake", Some(10)).await;
    let (_, token) = app.signup_user("Asha", "view@example.com").await;

    app.request(
        Method::POST,
        "/api/cart",
        Some(add_payload(&fixture, 2, "")),
        Some(&token),
    )
    .await;

    let response = app.request(Method::GET, "/api/cart", None, Some(&token)).await;
    assert_eq!(response.status(), 200);

    let cart = response_json(response).await;
    let items = cart["items"].as_array().expect("items");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["name"], "View Cake");
    assert_eq!(items[0]["flavor"], "View Cake flavor");
    assert!(items[0]["imageUrl"]
        .as_str()
        .expect("image url")
        .starts_with("/api/images/"));
    assert_eq!(decimal(&cart["subtotal"]), dec!(1000.0));
}

#[tokio::test]
async fn stock_bounds_are_enforced_on_add_and_update() {
    let app = TestApp::new().await;
    let fixture = create_cake_fixture(&app, "Scarce Cake", Some(3)).await;
    let (_, token) = app.signup_user("Asha", "stock@example.com").await;

    let too_many = app
        .request(
            Method::POST,
            "/api/cart",
            Some(add_payload(&fixture, 4, "")),
            Some(&token),
        )
        .await;
    assert_eq!(too_many.status(), 400);

    let ok = app
        .request(
            Method::POST,
            "/api/cart",
            Some(add_payload(&fixture, 2, "")),
            Some(&token),
        )
        .await;
    assert_eq!(ok.status(), 200);

    // Merging 2 more would exceed the stock of 3.
    let merge_overflow = app
        .request(
            Method::POST,
            "/api/cart",
            Some(add_payload(&fixture, 2, "")),
            Some(&token),
        )
        .await;
    assert_eq!(merge_overflow.status(), 400);

    let update_overflow = app
        .request(
            Method::PUT,
            &format!("/api/cart/{}", fixture.cake_id),
            Some(add_payload(&fixture, 9, "")),
            Some(&token),
        )
        .await;
    assert_eq!(update_overflow.status(), 400);

    let update_ok = app
        .request(
            Method::PUT,
            &format!("/api/cart/{}", fixture.cake_id),
            Some(add_payload(&fixture, 3, "")),
            Some(&token),
        )
        .await;
    assert_eq!(update_ok.status(), 200);
    let cart = response_json(update_ok).await;
    assert_eq!(cart["data"]["items"][0]["quantity"], 3);
}

#[tokio::test]
async fn untracked_stock_allows_any_quantity() {
    let app = TestApp::new().await;
    let fixture = create_cake_fixture(&app, "Endless Cake", None).await;
    let (_, token) = app.signup_user("Asha", "endless@example.com").await;

    let response = app
        .request(
            Method::POST,
            "/api/cart",
            Some(add_payload(&fixture, 500, "")),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn remove_targets_the_matching_line_only() {
    let app = TestApp::new().await;
    let fixture = create_cake_fixture(&app, "Remove Cake", Some(20)).await;
    let (_, token) = app.signup_user("Asha", "remove@example.com").await;

    app.request(
        Method::POST,
        "/api/cart",
        Some(add_payload(&fixture, 1, "Keep me")),
        Some(&token),
    )
    .await;
    app.request(
        Method::POST,
        "/api/cart",
        Some(add_payload(&fixture, 1, "Drop me")),
        Some(&token),
    )
    .await;

    let removed = app
        .request(
            Method::DELETE,
            &format!("/api/cart/{}", fixture.cake_id),
            Some(json!({
                "spongeTypeId": fixture.sponge_type_id,
                "shapeId": fixture.shape_id,
                "sizeId": fixture.size_id,
                "flavorId": fixture.flavor_id,
                "inscription": "Drop me",
            })),
            Some(&token),
        )
        .await;
    assert_eq!(removed.status(), 200);

    let cart = response_json(removed).await;
    let items = cart["data"]["items"].as_array().expect("items");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["inscription"], "Keep me");

    // Removing a line that no longer matches is a 404.
    let missing = app
        .request(
            Method::DELETE,
            &format!("/api/cart/{}", fixture.cake_id),
            Some(json!({
                "spongeTypeId": fixture.sponge_type_id,
                "shapeId": fixture.shape_id,
                "sizeId": fixture.size_id,
                "flavorId": fixture.flavor_id,
                "inscription": "Drop me",
            })),
            Some(&token),
        )
        .await;
    assert_eq!(missing.status(), 404);
}

#[tokio::test]
async fn inscription_length_is_bounded() {
    let app = TestApp::new().await;
    let fixture = create_cake_fixture(&app, "Long Cake", Some(5)).await;
    let (_, token) = app.signup_user("Asha", "long@example.com").await;

    let response = app
        .request(
            Method::POST,
            "/api/cart",
            Some(add_payload(&fixture, 1, &"x".repeat(101))),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 400);
}
