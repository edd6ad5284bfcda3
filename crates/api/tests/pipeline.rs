//! End-to-end pipeline scenarios driven through the HTTP surface.
//!
//! The full fabric runs in memory: order creation publishes to the broker,
//! the payment consumer advances the order row, and the notification
//! dispatcher fans out, exactly the paths the production wiring uses.

use std::sync::OnceLock;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use common::OrderId;
use domain::OrderStatus;
use metrics_exporter_prometheus::PrometheusHandle;
use store::{OrderStore, PaymentStore};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

const WEBHOOK_SECRET: &str = "whsec_pipeline";

async fn setup() -> (Router, api::DefaultState) {
    let ds = api::create_default_state(WEBHOOK_SECRET).await;
    let app = api::create_app(ds.state.clone(), get_metrics_handle());
    (app, ds)
}

fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn wait_for_order_status(ds: &api::DefaultState, order_id: OrderId, status: OrderStatus) {
    for _ in 0..300 {
        if ds.store.get_order(order_id).await.unwrap().map(|o| o.status) == Some(status) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("order {order_id} never reached {status}");
}

/// Places an order of 2 × $10.00 for `user_id` and opens its payment.
///
/// Returns `(order_id, payment_id, intent_ref)`.
async fn place_order_and_payment(app: &Router, user_id: &str) -> (String, String, String) {
    let response = app
        .clone()
        .oneshot(post_json(
            "/orders",
            &serde_json::json!({
                "userId": user_id,
                "items": [{ "productId": "p1", "quantity": 2, "price": 1000 }],
                "shippingAddress": {
                    "street": "1 Main St",
                    "city": "Springfield",
                    "state": "IL",
                    "postalCode": "62701",
                    "country": "US"
                }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let order = body_json(response).await;
    assert_eq!(order["data"]["total"], 2000);
    assert_eq!(order["data"]["status"], "pending");
    let order_id = order["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(post_json(
            "/payments",
            &serde_json::json!({
                "orderId": order_id,
                "userId": user_id,
                "amount": 2000,
                "currency": "usd"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let payment = body_json(response).await;
    assert_eq!(payment["data"]["payment"]["status"], "pending");
    let payment_id = payment["data"]["payment"]["id"].as_str().unwrap().to_string();
    let intent_ref = payment["data"]["payment"]["intent_ref"]
        .as_str()
        .unwrap()
        .to_string();

    (order_id, payment_id, intent_ref)
}

async fn deliver_callback(
    app: &Router,
    ds: &api::DefaultState,
    callback: &serde_json::Value,
) -> StatusCode {
    let body = callback.to_string();
    let signature = ds.verifier.sign(body.as_bytes());
    let request = Request::builder()
        .method("POST")
        .uri("/payments/webhook")
        .header("content-type", "application/json")
        .header("x-gateway-signature", signature)
        .body(Body::from(body))
        .unwrap();
    app.clone().oneshot(request).await.unwrap().status()
}

#[tokio::test]
async fn test_scenario_confirmed_payment_moves_order_to_processing() {
    let (app, ds) = setup().await;
    let user_id = common::UserId::new();
    ds.contacts
        .insert(user_id, "jo@example.com", Some("+15550100".to_string()));
    let user_id = user_id.to_string();
    let (order_id, payment_id, intent_ref) = place_order_and_payment(&app, &user_id).await;

    let status = deliver_callback(
        &app,
        &ds,
        &serde_json::json!({
            "type": "payment_intent.succeeded",
            "data": {
                "id": intent_ref,
                "amount": 2000,
                "metadata": { "orderId": order_id, "userId": user_id }
            }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Payment resolves synchronously with the callback.
    let payment = ds
        .store
        .get_payment(payment_id.parse().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, domain::PaymentStatus::Completed);

    // The order update lags behind the event but must eventually occur.
    wait_for_order_status(&ds, order_id.parse().unwrap(), OrderStatus::Processing).await;

    // Both lifecycle events crossed the broker, in causal order.
    let published = ds.broker.published().await;
    let keys: Vec<&str> = published.iter().map(|e| e.routing_key.as_str()).collect();
    let created_at = keys.iter().position(|k| *k == "order.created").unwrap();
    let completed_at = keys.iter().position(|k| *k == "payment.completed").unwrap();
    assert!(created_at < completed_at);

    // Notifications fanned out on both channels for both events.
    for _ in 0..300 {
        if ds.email.sent().len() == 2 && ds.sms.sent().len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(ds.email.sent().len(), 2);
    assert_eq!(ds.sms.sent().len(), 2);
}

#[tokio::test]
async fn test_scenario_declined_payment_moves_order_to_payment_failed() {
    let (app, ds) = setup().await;
    let user_id = common::UserId::new().to_string();
    let (order_id, payment_id, intent_ref) = place_order_and_payment(&app, &user_id).await;

    let status = deliver_callback(
        &app,
        &ds,
        &serde_json::json!({
            "type": "payment_intent.payment_failed",
            "data": {
                "id": intent_ref,
                "amount": 2000,
                "metadata": { "orderId": order_id, "userId": user_id },
                "lastError": "card declined"
            }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let payment = ds
        .store
        .get_payment(payment_id.parse().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, domain::PaymentStatus::Failed);

    wait_for_order_status(&ds, order_id.parse().unwrap(), OrderStatus::PaymentFailed).await;

    // No processing transition is ever observed for this order.
    assert!(ds.broker.published_with_key("payment.completed").await.is_empty());
    let order = ds
        .store
        .get_order(order_id.parse().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::PaymentFailed);
}

#[tokio::test]
async fn test_scenario_partial_refund_of_completed_payment() {
    let (app, ds) = setup().await;
    let user_id = common::UserId::new().to_string();
    let (order_id, payment_id, intent_ref) = place_order_and_payment(&app, &user_id).await;

    deliver_callback(
        &app,
        &ds,
        &serde_json::json!({
            "type": "payment_intent.succeeded",
            "data": {
                "id": intent_ref,
                "amount": 2000,
                "metadata": { "orderId": order_id, "userId": user_id }
            }
        }),
    )
    .await;

    // Refund $5.00 of the $20.00 payment.
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/payments/{payment_id}/refund"),
            &serde_json::json!({ "amount": 500, "reason": "requested_by_customer" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["amount"], 500);
    assert_eq!(json["data"]["status"], "succeeded");
    assert_eq!(ds.store.refund_count().await, 1);

    let payment = ds
        .store
        .get_payment(payment_id.parse().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, domain::PaymentStatus::Completed);
}

#[tokio::test]
async fn test_scenario_refund_of_pending_payment_is_rejected() {
    let (app, ds) = setup().await;
    let user_id = common::UserId::new().to_string();
    let (_order_id, payment_id, _intent_ref) = place_order_and_payment(&app, &user_id).await;

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/payments/{payment_id}/refund"),
            &serde_json::json!({ "amount": 500, "reason": "requested_by_customer" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(ds.store.refund_count().await, 0);
}
