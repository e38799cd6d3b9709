//! Integration tests for the API server.

use std::sync::OnceLock;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use store::MemoryStore;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> Router {
    let state = api::create_state(MemoryStore::new());
    api::create_app(state, get_metrics_handle())
}

fn bearer() -> String {
    format!("Bearer {}", uuid::Uuid::new_v4())
}

async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    auth: Option<&str>,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    let request = builder
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn send_get(app: &Router, uri: &str, auth: Option<&str>) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().uri(uri);
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    let request = builder.body(Body::empty()).unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Creates a genre and a book in it, returning (genre_id, book_id).
async fn seed_book(app: &Router, auth: &str, title: &str, stock: u32) -> (String, String) {
    let (status, genre) = send_json(
        app,
        "POST",
        "/genres",
        Some(auth),
        serde_json::json!({ "name": format!("Genre for {title}") }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let genre_id = genre["data"]["id"].as_str().unwrap().to_string();

    let (status, book) = send_json(
        app,
        "POST",
        "/books",
        Some(auth),
        serde_json::json!({
            "title": title,
            "writer": "Stephen King",
            "publisher": "Viking Press",
            "publication_year": 1986,
            "price_cents": 1500,
            "stock_quantity": stock,
            "genre_id": genre_id,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let book_id = book["data"]["id"].as_str().unwrap().to_string();
    (genre_id, book_id)
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();
    let (status, json) = send_get(&app, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_mutations_require_auth() {
    let app = setup();

    let (status, json) = send_json(
        &app,
        "POST",
        "/genres",
        None,
        serde_json::json!({ "name": "Horror" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["success"], false);

    let (status, _) = send_json(
        &app,
        "POST",
        "/genres",
        Some("Bearer not-a-uuid"),
        serde_json::json!({ "name": "Horror" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send_get(&app, "/orders", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_genre_crud() {
    let app = setup();
    let auth = bearer();

    let (status, json) = send_json(
        &app,
        "POST",
        "/genres",
        Some(&auth),
        serde_json::json!({ "name": "Horror" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["success"], true);
    let genre_id = json["data"]["id"].as_str().unwrap().to_string();

    // Duplicate name is rejected.
    let (status, _) = send_json(
        &app,
        "POST",
        "/genres",
        Some(&auth),
        serde_json::json!({ "name": "Horror" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Too-short name is rejected.
    let (status, _) = send_json(
        &app,
        "POST",
        "/genres",
        Some(&auth),
        serde_json::json!({ "name": "X" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Rename, fetch, delete.
    let (status, json) = send_json(
        &app,
        "PATCH",
        &format!("/genres/{genre_id}"),
        Some(&auth),
        serde_json::json!({ "name": "Gothic Horror" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["name"], "Gothic Horror");

    let (status, json) = send_get(&app, &format!("/genres/{genre_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["name"], "Gothic Horror");

    let (status, _) = send_json(
        &app,
        "DELETE",
        &format!("/genres/{genre_id}"),
        Some(&auth),
        serde_json::Value::Null,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send_get(&app, &format!("/genres/{genre_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_genre_with_books_cannot_be_deleted() {
    let app = setup();
    let auth = bearer();
    let (genre_id, _) = seed_book(&app, &auth, "It", 5).await;

    let (status, json) = send_json(
        &app,
        "DELETE",
        &format!("/genres/{genre_id}"),
        Some(&auth),
        serde_json::Value::Null,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_create_book_with_unknown_genre() {
    let app = setup();
    let auth = bearer();

    let (status, _) = send_json(
        &app,
        "POST",
        "/books",
        Some(&auth),
        serde_json::json!({
            "title": "Orphan",
            "writer": "Nobody",
            "publisher": "Nowhere Press",
            "publication_year": 2001,
            "price_cents": 1000,
            "stock_quantity": 1,
            "genre_id": uuid::Uuid::new_v4().to_string(),
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_book_metadata_roundtrip_and_search() {
    let app = setup();
    let auth = bearer();
    let (genre_id, _) = seed_book(&app, &auth, "It", 5).await;

    let (status, json) = send_json(
        &app,
        "POST",
        "/books",
        Some(&auth),
        serde_json::json!({
            "title": "Neuromancer",
            "writer": "William Gibson",
            "publisher": "Ace Books",
            "publication_year": 1984,
            "description": "Console cowboys and corporate AIs.",
            "price_cents": 800,
            "stock_quantity": 5,
            "genre_id": genre_id,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["writer"], "William Gibson");
    assert_eq!(json["data"]["publisher"], "Ace Books");
    assert_eq!(json["data"]["publication_year"], 1984);
    assert_eq!(
        json["data"]["description"],
        "Console cowboys and corporate AIs."
    );
    let book_id = json["data"]["id"].as_str().unwrap().to_string();

    // Search spans writer and publisher, not just the title.
    let (status, json) = send_get(&app, "/books?search=gibson", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
    assert_eq!(json["data"][0]["title"], "Neuromancer");

    // Out-of-range publication year is rejected.
    let (status, _) = send_json(
        &app,
        "PATCH",
        &format!("/books/{book_id}"),
        Some(&auth),
        serde_json::json!({ "publication_year": 999 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send_json(
        &app,
        "PATCH",
        &format!("/books/{book_id}"),
        Some(&auth),
        serde_json::json!({ "writer": "W. Gibson" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["writer"], "W. Gibson");
}

#[tokio::test]
async fn test_book_listing_with_meta() {
    let app = setup();
    let auth = bearer();
    let (genre_id, _) = seed_book(&app, &auth, "It", 5).await;
    for i in 0..3 {
        let (status, _) = send_json(
            &app,
            "POST",
            "/books",
            Some(&auth),
            serde_json::json!({
                "title": format!("Book {i}"),
                "writer": format!("Writer {i}"),
                "publisher": "Viking Press",
                "publication_year": 1990 + i,
                "price_cents": 1000 + i,
                "stock_quantity": 1,
                "genre_id": genre_id,
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, json) = send_get(&app, "/books?page=1&limit=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().unwrap().len(), 2);
    assert_eq!(json["meta"]["total"], 4);
    assert_eq!(json["meta"]["next_page"], 2);
    assert_eq!(json["meta"]["prev_page"], serde_json::Value::Null);

    // Genre-scoped listing wraps the genre alongside its books.
    let (status, json) = send_get(&app, &format!("/books/genre/{genre_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["genre"]["id"], genre_id);
    assert_eq!(json["data"]["books"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_place_order_decrements_stock() {
    let app = setup();
    let auth = bearer();
    let (_, book_id) = seed_book(&app, &auth, "It", 5).await;

    let (status, json) = send_json(
        &app,
        "POST",
        "/orders",
        Some(&auth),
        serde_json::json!({ "items": [{ "book_id": book_id, "quantity": 2 }] }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["total_quantity"], 2);
    assert_eq!(json["data"]["total_price_cents"], 3000);

    let (_, book) = send_get(&app, &format!("/books/{book_id}"), None).await;
    assert_eq!(book["data"]["stock_quantity"], 3);
}

#[tokio::test]
async fn test_place_order_insufficient_stock() {
    let app = setup();
    let auth = bearer();
    let (_, book_id) = seed_book(&app, &auth, "It", 1).await;

    let (status, json) = send_json(
        &app,
        "POST",
        "/orders",
        Some(&auth),
        serde_json::json!({ "items": [{ "book_id": book_id, "quantity": 2 }] }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);

    // Nothing was reserved.
    let (_, book) = send_get(&app, &format!("/books/{book_id}"), None).await;
    assert_eq!(book["data"]["stock_quantity"], 1);
}

#[tokio::test]
async fn test_place_order_unknown_book() {
    let app = setup();
    let auth = bearer();

    let (status, _) = send_json(
        &app,
        "POST",
        "/orders",
        Some(&auth),
        serde_json::json!({
            "items": [{ "book_id": uuid::Uuid::new_v4().to_string(), "quantity": 1 }]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_place_order_empty_cart() {
    let app = setup();
    let auth = bearer();

    let (status, _) = send_json(
        &app,
        "POST",
        "/orders",
        Some(&auth),
        serde_json::json!({ "items": [] }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_orders_are_scoped_to_caller() {
    let app = setup();
    let alice = bearer();
    let bob = bearer();
    let (_, book_id) = seed_book(&app, &alice, "It", 10).await;

    let (status, json) = send_json(
        &app,
        "POST",
        "/orders",
        Some(&alice),
        serde_json::json!({ "items": [{ "book_id": book_id, "quantity": 1 }] }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let order_id = json["data"]["order_id"].as_str().unwrap().to_string();

    // Owner sees it in list and detail.
    let (status, json) = send_get(&app, "/orders", Some(&alice)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().unwrap().len(), 1);

    let (status, json) = send_get(&app, &format!("/orders/{order_id}"), Some(&alice)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["items"][0]["book_title"], "It");

    // Another user sees neither.
    let (status, json) = send_get(&app, "/orders", Some(&bob)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().unwrap().len(), 0);

    let (status, _) = send_get(&app, &format!("/orders/{order_id}"), Some(&bob)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_order_statistics() {
    let app = setup();
    let auth = bearer();
    let (_, horror_book) = seed_book(&app, &auth, "It", 10).await;
    let (_, other_book) = seed_book(&app, &auth, "Outlander", 10).await;

    let (status, json) = send_get(&app, "/orders/statistics", Some(&auth)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["total_orders"], 0);
    assert!(json["data"]["most_sold_genre"].is_null());

    for (book_id, quantity) in [(&horror_book, 5), (&other_book, 2)] {
        let (status, _) = send_json(
            &app,
            "POST",
            "/orders",
            Some(&auth),
            serde_json::json!({ "items": [{ "book_id": book_id, "quantity": quantity }] }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, json) = send_get(&app, "/orders/statistics", Some(&auth)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["total_orders"], 2);
    // (5*1500 + 2*1500) / 2
    assert_eq!(json["data"]["average_order_value"], 5250);
    assert_eq!(json["data"]["most_sold_genre"]["quantity_sold"], 5);
    assert_eq!(json["data"]["least_sold_genre"]["quantity_sold"], 2);
}
