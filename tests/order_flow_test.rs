//! Order placement: one transaction covering totals, stock, cart clearing
//! and coupon redemption.

mod common;

use axum::http::Method;
use common::{create_cake_fixture, response_json, CakeFixture, TestApp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::str::FromStr;

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("not a decimal value: {other:?}"),
    }
}

fn inline_address() -> Value {
    json!({
        "street": "12 MG Road",
        "city": "Bengaluru",
        "state": "KA",
        "zip": "560001",
    })
}

async fn fill_cart(app: &TestApp, fixture: &CakeFixture, token: &str, quantity: i32) {
    let response = app
        .request(
            Method::POST,
            "/api/cart",
            Some(json!({
                "cakeId": fixture.cake_id,
                "quantity": quantity,
                "spongeTypeId": fixture.sponge_type_id,
                "shapeId": fixture.shape_id,
                "sizeId": fixture.size_id,
                "flavorId": fixture.flavor_id,
                "inscription": "Happy Birthday",
            })),
            Some(token),
        )
        .await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn placing_an_order_snapshots_items_and_clears_the_cart() {
    let app = TestApp::new().await;
    let fixture = create_cake_fixture(&app, "Order Cake", Some(10)).await;
    let (_, token) = app.signup_user("Asha", "order@example.com").await;
    fill_cart(&app, &fixture, &token, 2).await;

    let response = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({ "shippingAddress": inline_address() })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 201);

    let body = response_json(response).await;
    let order = &body["data"];
    assert_eq!(order["status"], "pending");
    assert_eq!(decimal(&order["total"]), dec!(1000.0));
    assert_eq!(decimal(&order["finalTotal"]), dec!(1000.0));
    assert_eq!(order["shippingAddress"]["zip"], "560001");

    let items = order["items"].as_array().expect("items");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["name"], "Order Cake");
    assert_eq!(items[0]["quantity"], 2);
    assert_eq!(items[0]["inscription"], "Happy Birthday");

    // Stock dropped from 10 to 8.
    let cake = app
        .state
        .services
        .cakes
        .get_cake(fixture.cake_id)
        .await
        .expect("cake");
    assert_eq!(cake.stock, Some(8));

    // The cart is now empty.
    let cart = app.request(Method::GET, "/api/cart", None, Some(&token)).await;
    let cart = response_json(cart).await;
    assert_eq!(cart["items"].as_array().map(|a| a.len()), Some(0));

    // The order shows up in history with the inline address merged into
    // the address book.
    let orders = app
        .request(Method::GET, "/api/orders", None, Some(&token))
        .await;
    let orders = response_json(orders).await;
    assert_eq!(orders.as_array().map(|a| a.len()), Some(1));

    let profile = app
        .request(Method::GET, "/api/profile", None, Some(&token))
        .await;
    let profile = response_json(profile).await;
    assert_eq!(profile["addresses"].as_array().map(|a| a.len()), Some(1));
}

#[tokio::test]
async fn an_empty_cart_or_missing_address_rejects_the_order() {
    let app = TestApp::new().await;
    let (_, token) = app.signup_user("Asha", "noitems@example.com").await;

    let no_address = app
        .request(Method::POST, "/api/orders", Some(json!({})), Some(&token))
        .await;
    assert_eq!(no_address.status(), 400);

    let empty_cart = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({ "shippingAddress": inline_address() })),
            Some(&token),
        )
        .await;
    assert_eq!(empty_cart.status(), 400);

    let unknown_address = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({ "addressId": uuid::Uuid::new_v4() })),
            Some(&token),
        )
        .await;
    assert_eq!(unknown_address.status(), 400);
}

#[tokio::test]
async fn a_coupon_is_redeemed_once_per_user() {
    let app = TestApp::new().await;
    let fixture = create_cake_fixture(&app, "Coupon Order Cake", Some(10)).await;
    let (_, token) = app.signup_user("Asha", "redeem@example.com").await;

    let created = app
        .request(
            Method::POST,
            "/api/coupons",
            Some(json!({
                "code": "FLAT100",
                "discountType": "fixed",
                "discountValue": "100.0",
            })),
            Some(&app.admin_token()),
        )
        .await;
    assert_eq!(created.status(), 201);

    fill_cart(&app, &fixture, &token, 2).await;
    let first = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({
                "shippingAddress": inline_address(),
                "couponCode": "FLAT100",
            })),
            Some(&token),
        )
        .await;
    assert_eq!(first.status(), 201);

    let body = response_json(first).await;
    assert_eq!(body["data"]["couponCode"], "FLAT100");
    assert_eq!(decimal(&body["data"]["discountAmount"]), dec!(100.0));
    assert_eq!(decimal(&body["data"]["finalTotal"]), dec!(900.0));

    // Second order with the same code fails before anything mutates.
    fill_cart(&app, &fixture, &token, 1).await;
    let second = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({
                "shippingAddress": inline_address(),
                "couponCode": "FLAT100",
            })),
            Some(&token),
        )
        .await;
    assert_eq!(second.status(), 400);

    // The failed attempt left the cart and stock untouched.
    let cart = app.request(Method::GET, "/api/cart", None, Some(&token)).await;
    let cart = response_json(cart).await;
    assert_eq!(cart["items"].as_array().map(|a| a.len()), Some(1));
}

#[tokio::test]
async fn a_discount_exceeding_the_subtotal_rejects_the_order() {
    let app = TestApp::new().await;
    let fixture = create_cake_fixture(&app, "Overdrawn Cake", Some(5)).await;
    let (_, token) = app.signup_user("Asha", "overdrawn@example.com").await;

    let created = app
        .request(
            Method::POST,
            "/api/coupons",
            Some(json!({
                "code": "FLAT600",
                "discountType": "fixed",
                "discountValue": "600.0",
            })),
            Some(&app.admin_token()),
        )
        .await;
    assert_eq!(created.status(), 201);

    // Subtotal 500.0, fixed discount 600.0: the final amount would go
    // negative, so nothing may be persisted.
    fill_cart(&app, &fixture, &token, 1).await;
    let response = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({
                "shippingAddress": inline_address(),
                "couponCode": "FLAT600",
            })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 400);

    let orders = app
        .request(Method::GET, "/api/orders", None, Some(&token))
        .await;
    let orders = response_json(orders).await;
    assert_eq!(orders.as_array().map(|a| a.len()), Some(0));

    let cake = app
        .state
        .services
        .cakes
        .get_cake(fixture.cake_id)
        .await
        .expect("cake");
    assert_eq!(cake.stock, Some(5), "rejected order must not touch stock");

    let cart = app.request(Method::GET, "/api/cart", None, Some(&token)).await;
    let cart = response_json(cart).await;
    assert_eq!(cart["items"].as_array().map(|a| a.len()), Some(1));
}

#[tokio::test]
async fn insufficient_stock_aborts_the_whole_order() {
    let app = TestApp::new().await;
    let fixture = create_cake_fixture(&app, "Race Cake", Some(3)).await;
    let (_, first_token) = app.signup_user("First", "first@example.com").await;
    let (_, second_token) = app.signup_user("Second", "second@example.com").await;

    fill_cart(&app, &fixture, &first_token, 2).await;
    fill_cart(&app, &fixture, &second_token, 2).await;

    let first = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({ "shippingAddress": inline_address() })),
            Some(&first_token),
        )
        .await;
    assert_eq!(first.status(), 201);

    // Only one unit left; the second buyer's order must fail whole.
    let second = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({ "shippingAddress": inline_address() })),
            Some(&second_token),
        )
        .await;
    assert_eq!(second.status(), 400);

    let cake = app
        .state
        .services
        .cakes
        .get_cake(fixture.cake_id)
        .await
        .expect("cake");
    assert_eq!(cake.stock, Some(1), "failed order must not touch stock");

    let orders = app
        .request(Method::GET, "/api/orders", None, Some(&second_token))
        .await;
    let orders = response_json(orders).await;
    assert_eq!(orders.as_array().map(|a| a.len()), Some(0));

    let cart = app
        .request(Method::GET, "/api/cart", None, Some(&second_token))
        .await;
    let cart = response_json(cart).await;
    assert_eq!(
        cart["items"].as_array().map(|a| a.len()),
        Some(1),
        "failed order keeps the cart intact"
    );
}
