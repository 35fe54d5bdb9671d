//! Catalog lookup CRUD and the cake listing surface.

mod common;

use axum::http::Method;
use common::{create_cake_fixture, response_json, TestApp};
use serde_json::json;

#[tokio::test]
async fn defaults_are_seeded_once() {
    let app = TestApp::new().await;
    let (_, token) = app.signup_user("Asha", "seed@example.com").await;

    let sponge_types = app
        .request(Method::GET, "/api/sponge-types", None, Some(&token))
        .await;
    assert_eq!(sponge_types.status(), 200);
    let body = response_json(sponge_types).await;
    let names: Vec<&str> = body
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|e| e["name"].as_str())
        .collect();
    assert!(names.contains(&"Vanilla"));
    assert!(names.contains(&"Red Velvet"));
    assert_eq!(names.len(), 5);

    // Seeding again must not duplicate rows.
    app.state
        .services
        .catalog
        .seed_defaults()
        .await
        .expect("second seed run");
    let shapes = app
        .request(Method::GET, "/api/shapes", None, Some(&token))
        .await;
    let body = response_json(shapes).await;
    assert_eq!(body.as_array().map(|a| a.len()), Some(5));
}

#[tokio::test]
async fn catalog_mutations_are_admin_gated_and_names_unique() {
    let app = TestApp::new().await;
    let (_, token) = app.signup_user("Asha", "catalog@example.com").await;
    let admin = app.admin_token();

    let forbidden = app
        .request(
            Method::POST,
            "/api/flavors",
            Some(json!({ "name": "Mango" })),
            Some(&token),
        )
        .await;
    assert_eq!(forbidden.status(), 403);

    let created = app
        .request(
            Method::POST,
            "/api/flavors",
            Some(json!({ "name": "Mango", "description": "Alphonso only" })),
            Some(&admin),
        )
        .await;
    assert_eq!(created.status(), 201);

    let duplicate = app
        .request(
            Method::POST,
            "/api/flavors",
            Some(json!({ "name": "Mango" })),
            Some(&admin),
        )
        .await;
    assert_eq!(duplicate.status(), 400);

    let blank = app
        .request(
            Method::POST,
            "/api/flavors",
            Some(json!({ "name": "" })),
            Some(&admin),
        )
        .await;
    assert_eq!(blank.status(), 400);
}

#[tokio::test]
async fn cake_listing_paginates_with_a_default_of_six() {
    let app = TestApp::new().await;
    for i in 0..8 {
        create_cake_fixture(&app, &format!("Paged Cake {}", i), Some(5)).await;
    }
    let (_, token) = app.signup_user("Asha", "paging@example.com").await;

    let first_page = app
        .request(Method::GET, "/api/cakes", None, Some(&token))
        .await;
    assert_eq!(first_page.status(), 200);
    let body = response_json(first_page).await;
    assert_eq!(body["total"], 8);
    assert_eq!(body["page"], 1);
    assert_eq!(body["limit"], 6);
    assert_eq!(body["cakes"].as_array().map(|a| a.len()), Some(6));

    let second_page = app
        .request(Method::GET, "/api/cakes?page=2&limit=6", None, Some(&token))
        .await;
    let body = response_json(second_page).await;
    assert_eq!(body["cakes"].as_array().map(|a| a.len()), Some(2));
}

#[tokio::test]
async fn cake_detail_joins_lookups_and_rejects_unknown_ids() {
    let app = TestApp::new().await;
    let fixture = create_cake_fixture(&app, "Joined Cake", Some(5)).await;
    let (_, token) = app.signup_user("Asha", "joined@example.com").await;

    let detail = app
        .request(
            Method::GET,
            &format!("/api/cakes/{}", fixture.cake_id),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(detail.status(), 200);
    let body = response_json(detail).await;
    assert_eq!(body["name"], "Joined Cake");
    assert_eq!(body["flavors"][0]["name"], "Joined Cake flavor");
    assert!(body["images"][0]["url"]
        .as_str()
        .expect("image url")
        .starts_with("/api/images/"));

    let missing = app
        .request(
            Method::GET,
            &format!("/api/cakes/{}", uuid::Uuid::new_v4()),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(missing.status(), 404);
}

#[tokio::test]
async fn cake_creation_validates_references() {
    let app = TestApp::new().await;
    let fixture = create_cake_fixture(&app, "Ref Cake", Some(5)).await;
    let admin = app.admin_token();

    let cake = app
        .state
        .services
        .cakes
        .get_cake(fixture.cake_id)
        .await
        .expect("cake");

    let response = app
        .request(
            Method::POST,
            "/api/cakes",
            Some(json!({
                "name": "Broken Cake",
                "description": "refs a missing flavor",
                "price": "100.0",
                "categoryId": cake.category.as_ref().map(|c| c.id),
                "spongeTypeId": fixture.sponge_type_id,
                "shapeId": fixture.shape_id,
                "availabilityId": cake.availability.as_ref().map(|a| a.id),
                "imageIds": [cake.images[0].id],
                "flavorIds": [uuid::Uuid::new_v4()],
                "sizeIds": [fixture.size_id],
                "deliveryOptionIds": [cake.delivery_options[0].id],
            })),
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), 400);
}
