mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{test_settings, ScriptedFeed, BTC};
use cryptoalerts::{routes, services::notification_store::MemoryNotificationStore, AppState};

fn test_app() -> (Router, Arc<ScriptedFeed>) {
    let feed = ScriptedFeed::new();
    let state = AppState::new(
        test_settings(),
        Arc::new(MemoryNotificationStore::new()),
        feed.clone(),
    );
    (routes::app(state), feed)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn decimal(v: &Value) -> Decimal {
    v.as_str().unwrap().parse().unwrap()
}

async fn create_range(app: &Router, chat_id: &str) -> Value {
    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/notifications/range",
            json!({ "chat_id": chat_id, "symbol": "btc", "quote": "usdt", "lower": "90.005", "upper": "110" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

#[tokio::test]
async fn create_range_normalizes_and_rounds() {
    let (app, _) = test_app();
    let body = create_range(&app, "42").await;

    assert_eq!(body["market"], BTC);
    assert_eq!(body["kind"], "range");
    assert_eq!(body["is_active"], true);
    assert_eq!(decimal(&body["range"]["lower_boundary"]), dec!(90.01));
    assert_eq!(decimal(&body["range"]["upper_boundary"]), dec!(110));
}

#[tokio::test]
async fn create_range_rejects_bad_input() {
    let (app, _) = test_app();

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/notifications/range",
            json!({ "chat_id": "42", "symbol": "BTC", "quote": "USDT", "lower": "110", "upper": "90" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("lower boundary"));

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/notifications/range",
            json!({ "chat_id": "42", "symbol": "B", "quote": "USDT", "lower": "1", "upper": "2" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/notifications/range",
            json!({ "chat_id": " ", "symbol": "BTC", "quote": "USDT", "lower": "1", "upper": "2" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_percent_uses_feed_price() {
    let (app, feed) = test_app();
    feed.set(BTC, dec!(100));

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/notifications/percent",
            json!({ "chat_id": "42", "symbol": "BTC", "quote": "USDT", "down_percent": "10", "up_percent": "20" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(decimal(&body["percent"]["start_price"]), dec!(100));
    assert_eq!(decimal(&body["percent"]["lower_boundary"]), dec!(90));
    assert_eq!(decimal(&body["percent"]["upper_boundary"]), dec!(120));
}

#[tokio::test]
async fn create_percent_validates_and_reports_feed_outage() {
    let (app, feed) = test_app();

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/notifications/percent",
            json!({ "chat_id": "42", "symbol": "BTC", "quote": "USDT", "down_percent": "100", "up_percent": "5" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/notifications/percent",
            json!({ "chat_id": "42", "symbol": "BTC", "quote": "USDT" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    feed.fail(BTC);
    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/notifications/percent",
            json!({ "chat_id": "42", "symbol": "BTC", "quote": "USDT", "down_percent": "5" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn create_percent_with_oversized_bound_is_rejected() {
    let (app, feed) = test_app();
    feed.set(BTC, dec!(64000));

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/notifications/percent",
            json!({ "chat_id": "42", "symbol": "BTC", "quote": "USDT", "up_percent": "1000000000000000000000000000" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("out of range"));

    let (_, body) = send(&app, empty_request("GET", "/notifications?chat_id=42")).await;
    assert!(body["notifications"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn create_ema_starts_from_price_and_cannot_be_deactivated() {
    let (app, feed) = test_app();
    feed.set(BTC, dec!(100));

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/notifications/ema",
            json!({ "chat_id": "42", "symbol": "BTC", "quote": "USDT" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["kind"], "ema_cross");
    assert_eq!(decimal(&body["ema_cross"]["start_ema"]), dec!(100));
    assert_eq!(body["ema_cross"]["is_above"], false);

    let id = body["id"].as_str().unwrap();
    let (status, _) = send(
        &app,
        empty_request("POST", &format!("/notifications/{id}/deactivate?chat_id=42")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_and_get_are_scoped() {
    let (app, _) = test_app();
    let first = create_range(&app, "42").await;
    create_range(&app, "42").await;
    create_range(&app, "43").await;

    let (status, body) = send(&app, empty_request("GET", "/notifications?chat_id=42")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["notifications"].as_array().unwrap().len(), 2);

    let id = first["id"].as_str().unwrap();
    let (status, body) = send(&app, empty_request("GET", &format!("/notifications/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id);

    let (status, _) = send(
        &app,
        empty_request("GET", "/notifications/000000000000000000000000"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, empty_request("GET", "/notifications/not-an-id")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deactivate_is_owner_only_and_once() {
    let (app, _) = test_app();
    let created = create_range(&app, "42").await;
    let id = created["id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        empty_request("POST", &format!("/notifications/{id}/deactivate?chat_id=43")),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        empty_request("POST", &format!("/notifications/{id}/deactivate?chat_id=42")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_active"], false);

    let (status, _) = send(
        &app,
        empty_request("POST", &format!("/notifications/{id}/deactivate?chat_id=42")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(
        &app,
        empty_request("GET", "/notifications?chat_id=42&active=true"),
    )
    .await;
    assert!(body["notifications"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn delete_one_and_all() {
    let (app, _) = test_app();
    let created = create_range(&app, "42").await;
    create_range(&app, "42").await;
    create_range(&app, "42").await;
    let id = created["id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        empty_request("DELETE", &format!("/notifications/{id}?chat_id=43")),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        empty_request("DELETE", &format!("/notifications/{id}?chat_id=42")),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, empty_request("DELETE", "/notifications?chat_id=42")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], 2);
}

#[tokio::test]
async fn manual_tick_returns_report() {
    let (app, feed) = test_app();
    create_range(&app, "42").await;
    feed.set(BTC, dec!(150));

    let (status, body) = send(&app, empty_request("POST", "/ticks")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["markets"], 1);
    assert_eq!(body["triggered"], 1);

    let (_, body) = send(&app, empty_request("POST", "/ticks")).await;
    assert_eq!(body["triggered"], 0);
}

#[tokio::test]
async fn health_and_fallback() {
    let (app, _) = test_app();

    let res = app.clone().oneshot(empty_request("GET", "/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"ok");

    let (status, _) = send(&app, empty_request("GET", "/health/db")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, empty_request("GET", "/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not found");
}
