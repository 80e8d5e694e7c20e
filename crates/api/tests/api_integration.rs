//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use domain::{InMemoryStore, Money};
use metrics_exporter_prometheus::PrometheusHandle;
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

fn setup() -> axum::Router {
    let (app, _) = setup_with_state();
    app
}

fn setup_with_state() -> (
    axum::Router,
    Arc<api::routes::orders::AppState<InMemoryStore>>,
) {
    let state = api::create_default_state();
    let app = api::create_app(state.clone(), get_metrics_handle());
    (app, state)
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn place_order_body(location_id: &str) -> serde_json::Value {
    serde_json::json!({
        "location_id": location_id,
        "items": [
            {
                "product_id": "margherita",
                "product_name": "Margherita",
                "quantity": 2,
                "unit_price_cents": 875
            }
        ],
        "contact_email": "asiakas@example.fi"
    })
}

fn location_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[tokio::test]
async fn health_check() {
    let app = setup();

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn metrics_endpoint_renders() {
    let app = setup();
    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn place_order_returns_created_order() {
    let app = setup();

    let response = app
        .oneshot(post_json("/orders", place_order_body(&location_id())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    assert_eq!(body["status"], "Placed");
    assert_eq!(body["payment_status"], "Pending");
    assert_eq!(body["total_cents"], 1750);

    let display_id = body["display_id"].as_i64().unwrap();
    assert!((1000..=9999).contains(&display_id));
}

#[tokio::test]
async fn place_order_without_items_is_rejected() {
    let app = setup();

    let body = serde_json::json!({ "location_id": location_id(), "items": [] });
    let response = app.oneshot(post_json("/orders", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_order_roundtrip() {
    let app = setup();

    let created = app
        .clone()
        .oneshot(post_json("/orders", place_order_body(&location_id())))
        .await
        .unwrap();
    let created = body_json(created).await;
    let id = created["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(get(&format!("/orders/{id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["id"], created["id"]);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_order_is_404() {
    let app = setup();
    let response = app
        .oneshot(get(&format!("/orders/{}", uuid::Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn accept_order_via_status_endpoint() {
    let app = setup();

    let created = app
        .clone()
        .oneshot(post_json("/orders", place_order_body(&location_id())))
        .await
        .unwrap();
    let created = body_json(created).await;
    let id = created["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/orders/{id}/status"),
            serde_json::json!({ "status": "Accepted" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "Accepted");
}

#[tokio::test]
async fn bogus_status_is_rejected_without_mutation() {
    let app = setup();

    let created = app
        .clone()
        .oneshot(post_json("/orders", place_order_body(&location_id())))
        .await
        .unwrap();
    let created = body_json(created).await;
    let id = created["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/orders/{id}/status"),
            serde_json::json!({ "status": "BOGUS" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(get(&format!("/orders/{id}")))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["status"], "Placed");
}

#[tokio::test]
async fn skipping_lifecycle_steps_is_a_conflict() {
    let app = setup();

    let created = app
        .clone()
        .oneshot(post_json("/orders", place_order_body(&location_id())))
        .await
        .unwrap();
    let created = body_json(created).await;
    let id = created["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/orders/{id}/status"),
            serde_json::json!({ "status": "Fulfilled" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn capture_flow_accepts_and_settles() {
    let (app, state) = setup_with_state();

    let created = app
        .clone()
        .oneshot(post_json("/orders", place_order_body(&location_id())))
        .await
        .unwrap();
    let created = body_json(created).await;
    let id = created["id"].as_str().unwrap();

    state
        .payment_processor
        .register_intent("pi_test", Money::from_cents(1750));
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/orders/{id}/authorization"),
            serde_json::json!({ "payment_intent": "pi_test" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Accept/reject must go through settlement while the hold is open.
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/orders/{id}/status"),
            serde_json::json!({ "status": "Accepted" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/orders/{id}/capture"),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "Accepted");
    assert_eq!(body["payment_status"], "Captured");
    assert_eq!(body["payment_captured_cents"], 1750);

    // Settlement carries the acceptance notification; dispatch is detached.
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    let sent = state.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, "asiakas@example.fi");
}

#[tokio::test]
async fn capture_without_authorization_is_a_conflict() {
    let app = setup();

    let created = app
        .clone()
        .oneshot(post_json("/orders", place_order_body(&location_id())))
        .await
        .unwrap();
    let created = body_json(created).await;
    let id = created["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/orders/{id}/capture"),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn stamp_card_lifecycle_over_http() {
    let app = setup();
    let location = location_id();

    let response = app
        .clone()
        .oneshot(post_json(
            "/cards",
            serde_json::json!({
                "location_id": location,
                "phone": "+358 40 123 4567",
                "first_name": "Matti"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let card = body_json(response).await;
    assert_eq!(card["phone"], "+358401234567");
    let card_id = card["id"].as_str().unwrap().to_string();

    // An equivalent spelling of the same phone is a duplicate.
    let response = app
        .clone()
        .oneshot(post_json(
            "/cards",
            serde_json::json!({
                "location_id": location,
                "phone": "0401234567",
                "first_name": "Matti"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/cards/{card_id}/stamps"),
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/cards/{card_id}/claim"),
            serde_json::json!({ "count": 2 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["active_stamps"], 1);
    assert_eq!(body["claimed_stamps"], 2);
    assert_eq!(body["total_stamps"], 3);
    assert_eq!(body["can_claim"], false);

    // Over-claiming is refused outright.
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/cards/{card_id}/claim"),
            serde_json::json!({ "count": 5 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Lookup by an equivalent phone spelling finds the card.
    let response = app
        .clone()
        .oneshot(get(&format!(
            "/locations/{location}/cards?phone=040%201234567"
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body[0]["id"].as_str().unwrap(), card_id);
}

#[tokio::test]
async fn undo_runs_dry_with_conflict() {
    let app = setup();
    let location = location_id();

    let response = app
        .clone()
        .oneshot(post_json(
            "/cards",
            serde_json::json!({
                "location_id": location,
                "phone": "0401234567",
                "first_name": "Maija"
            }),
        ))
        .await
        .unwrap();
    let card = body_json(response).await;
    let card_id = card["id"].as_str().unwrap().to_string();

    app.clone()
        .oneshot(post_json(
            &format!("/cards/{card_id}/stamps"),
            serde_json::json!({}),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/cards/{card_id}/stamps/undo"),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["active_stamps"], 0);

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/cards/{card_id}/stamps/undo"),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
