//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use api::auth::StaticTokenAuthenticator;
use api::config::{Config, TokenGrant};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::PrincipalId;
use domain::{Money, Principal, Role, Variant, VariantId};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{FailPoint, InMemoryStore};
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

const ALICE: &str = "alice-token";
const BOB: &str = "bob-token";
const STAFF: &str = "staff-token";

struct TestApp {
    app: axum::Router,
    store: InMemoryStore,
    alice: PrincipalId,
}

fn setup() -> TestApp {
    let store = InMemoryStore::with_variants([
        Variant::new("V1", "P1", Money::from_cents(99_900), 5),
        Variant::new("V2", "P2", Money::from_cents(1_550), 1),
    ]);
    let alice = PrincipalId::new();
    let grants = [
        (ALICE, Principal::customer(alice)),
        (BOB, Principal::customer(PrincipalId::new())),
        (STAFF, Principal::new(PrincipalId::new(), Role::Staff)),
    ]
    .map(|(token, principal)| TokenGrant {
        token: token.to_string(),
        principal,
    });

    let state = api::create_state(
        store.clone(),
        Arc::new(StaticTokenAuthenticator::new(grants)),
        &Config::default(),
    );
    TestApp {
        app: api::create_app(state, get_metrics_handle()),
        store,
        alice,
    }
}

fn request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &axum::Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

async fn place(
    app: &axum::Router,
    token: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, request("POST", "/orders", Some(token), Some(body))).await
}

fn pickup_order(variant: &str, quantity: u32) -> serde_json::Value {
    serde_json::json!({
        "items": [{ "variantId": variant, "quantity": quantity }],
        "deliveryMethod": "store_pickup",
        "paymentMethod": "card_payment"
    })
}

#[tokio::test]
async fn test_health_check() {
    let test = setup();

    let (status, json) = send(&test.app, request("GET", "/health", None, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_place_order() {
    let test = setup();

    let (status, json) = place(&test.app, ALICE, pickup_order("V1", 2)).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["totalAmount"], "1998.00");
    assert_eq!(json["items"], 1);
    assert!(json["orderId"].as_str().is_some());
    assert_eq!(test.store.stock_of(&VariantId::new("V1")).await, Some(3));
}

#[tokio::test]
async fn test_place_and_get_order() {
    let test = setup();
    let (_, created) = place(
        &test.app,
        ALICE,
        serde_json::json!({
            "items": [{ "variantId": "V1", "quantity": 2 }],
            "specialInstructions": "gift wrap",
            "deliveryMethod": "store_pickup",
            "paymentMethod": "card_payment"
        }),
    )
    .await;
    let uri = format!("/orders/{}", created["orderId"].as_str().unwrap());

    let (status, order) = send(&test.app, request("GET", &uri, Some(ALICE), None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["principalId"], test.alice.to_string());
    assert_eq!(order["status"], "pending");
    assert_eq!(order["totalAmount"], "1998.00");
    assert_eq!(order["specialInstructions"], "gift wrap");
    assert_eq!(order["items"][0]["variantId"], "V1");
    assert_eq!(order["items"][0]["unitPrice"], "999.00");
    assert_eq!(order["items"][0]["subTotal"], "1998.00");
    assert_eq!(order["delivery"]["estimatedDays"], 1);
    assert_eq!(order["payment"]["status"], "pending");
    assert_eq!(order["payment"]["amount"], "1998.00");

    let (status, _) = send(&test.app, request("GET", &uri, Some(STAFF), None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&test.app, request("GET", &uri, Some(BOB), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_business_errors() {
    let test = setup();

    let (status, json) = place(&test.app, ALICE, pickup_order("V2", 5)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(
        json["error"]
            .as_str()
            .unwrap()
            .contains("Only 1 items available")
    );

    let (status, json) = place(&test.app, ALICE, pickup_order("X999", 1)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Variant not found: X999");

    let (status, _) = place(&test.app, ALICE, serde_json::json!({ "items": [] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = place(&test.app, ALICE, pickup_order("V1", 0)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(test.store.row_counts().await.orders, 0);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let test = setup();

    let (status, json) = place(
        &test.app,
        ALICE,
        serde_json::json!({ "items": [{ "variantId": "V1", "quantity": -1 }] }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());

    let (status, _) = place(
        &test.app,
        ALICE,
        serde_json::json!({
            "items": [{ "variantId": "V1", "quantity": 1 }],
            "deliveryMethod": "drone"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_transaction_failure_is_retryable() {
    let test = setup();
    test.store.fail_once(FailPoint::Commit);

    let (status, json) = place(&test.app, ALICE, pickup_order("V1", 2)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["retryable"], true);

    let (status, _) = place(&test.app, ALICE, pickup_order("V1", 2)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(test.store.row_counts().await.orders, 1);
}

#[tokio::test]
async fn test_authentication_and_roles() {
    let test = setup();

    let (status, json) = send(
        &test.app,
        request("POST", "/orders", None, Some(pickup_order("V1", 1))),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(json["error"].is_string());

    let (status, _) = place(&test.app, "forged", pickup_order("V1", 1)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = place(&test.app, STAFF, pickup_order("V1", 1)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    assert_eq!(test.store.units_of_work_begun(), 0);
}

#[tokio::test]
async fn test_status_transitions() {
    let test = setup();
    let (_, created) = place(&test.app, ALICE, pickup_order("V1", 2)).await;
    let uri = format!("/orders/{}/status", created["orderId"].as_str().unwrap());
    let set = |token: &'static str, status: &str| {
        request(
            "PUT",
            &uri,
            Some(token),
            Some(serde_json::json!({ "status": status })),
        )
    };

    let (status, _) = send(&test.app, set(ALICE, "processing")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = send(&test.app, set(STAFF, "processing")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "processing");

    let (status, _) = send(&test.app, set(STAFF, "delivered")).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&test.app, set(STAFF, "lost")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(&test.app, set(STAFF, "cancelled")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "cancelled");
    assert_eq!(test.store.stock_of(&VariantId::new("V1")).await, Some(5));

    let missing = format!("/orders/{}/status", PrincipalId::new());
    let (status, _) = send(
        &test.app,
        request(
            "PUT",
            &missing,
            Some(STAFF),
            Some(serde_json::json!({ "status": "shipped" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &test.app,
        request("GET", "/orders/not-a-uuid", Some(STAFF), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cart_flow() {
    let test = setup();

    let (status, json) = send(&test.app, request("GET", "/cart", Some(ALICE), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["cartId"].is_null());
    assert_eq!(json["items"].as_array().unwrap().len(), 0);

    let add = |variant: &str, quantity: u32| {
        request(
            "POST",
            "/cart/items",
            Some(ALICE),
            Some(serde_json::json!({ "variantId": variant, "quantity": quantity })),
        )
    };
    send(&test.app, add("V1", 1)).await;
    let (status, json) = send(&test.app, add("V1", 1)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["items"][0]["quantity"], 2);

    let (status, _) = send(&test.app, add("X999", 1)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = send(
        &test.app,
        request(
            "POST",
            "/cart/checkout",
            Some(ALICE),
            Some(serde_json::json!({ "deliveryMethod": "standard_delivery" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["totalAmount"], "1998.00");

    let (_, json) = send(&test.app, request("GET", "/cart", Some(ALICE), None)).await;
    assert!(json["cartId"].is_string());
    assert_eq!(json["items"].as_array().unwrap().len(), 0);

    let (status, _) = send(&test.app, request("GET", "/cart", Some(STAFF), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let test = setup();
    place(&test.app, ALICE, pickup_order("V1", 1)).await;

    let response = test
        .app
        .clone()
        .oneshot(request("GET", "/metrics", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("orders_placed_total"));
}
