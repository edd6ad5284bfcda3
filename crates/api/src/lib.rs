//! HTTP API server for the order fulfillment pipeline.
//!
//! Wires the order and payment services, the gateway callback endpoint and
//! the broker consumers behind an axum router, with structured logging
//! (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use broker::{InMemoryBroker, MessageBroker};
use metrics_exporter_prometheus::PrometheusHandle;
use notifier::{
    InMemoryContactSource, NotificationDispatcher, RecordingEmailSender, RecordingSmsSender,
};
use orders::OrderService;
use payments::{CallbackVerifier, InMemoryGateway, PaymentGateway, PaymentService};
use store::{InMemoryStore, OrderStore, PaymentStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use error::{ApiError, ApiResponse};
pub use routes::orders::AppState;

/// Creates the axum application router with all routes and shared state.
pub fn create_app<S, G, B>(
    state: Arc<AppState<S, G, B>>,
    metrics_handle: PrometheusHandle,
) -> Router
where
    S: OrderStore + PaymentStore + 'static,
    G: PaymentGateway + 'static,
    B: MessageBroker + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<S, G, B>))
        .route("/orders/{id}", get(routes::orders::get::<S, G, B>))
        .route(
            "/orders/{id}/status",
            post(routes::orders::update_status::<S, G, B>),
        )
        .route(
            "/orders/{id}/payment",
            get(routes::payments::for_order::<S, G, B>),
        )
        .route(
            "/users/{user_id}/orders",
            get(routes::orders::list_for_user::<S, G, B>),
        )
        .route("/payments", post(routes::payments::create::<S, G, B>))
        .route("/payments/{id}", get(routes::payments::get::<S, G, B>))
        .route(
            "/payments/{id}/refund",
            post(routes::payments::refund::<S, G, B>),
        )
        .route(
            "/payments/webhook",
            post(routes::webhook::gateway::<S, G, B>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Everything [`create_default_state`] wires up, exposed for observation.
pub struct DefaultState {
    pub state: Arc<AppState<InMemoryStore, InMemoryGateway, InMemoryBroker>>,
    pub store: InMemoryStore,
    pub gateway: InMemoryGateway,
    pub broker: InMemoryBroker,
    pub contacts: InMemoryContactSource,
    pub email: RecordingEmailSender,
    pub sms: RecordingSmsSender,
    pub verifier: CallbackVerifier,
}

/// Creates fully in-memory application state with all consumers subscribed.
///
/// The entire pipeline (order creation, payment reconciliation and
/// notification fan-out) runs against in-memory collaborators, which is
/// what the integration tests and local experiments drive end to end.
pub async fn create_default_state(webhook_secret: &str) -> DefaultState {
    let store = InMemoryStore::new();
    let gateway = InMemoryGateway::new();
    let broker = InMemoryBroker::new();
    let contacts = InMemoryContactSource::new();
    let email = RecordingEmailSender::new();
    let sms = RecordingSmsSender::new();
    let verifier = CallbackVerifier::new(webhook_secret);

    orders::subscribe_payment_events(&broker, store.clone())
        .await
        .expect("in-memory subscribe cannot fail");
    notifier::subscribe_notifications(
        &broker,
        NotificationDispatcher::new(contacts.clone(), email.clone(), sms.clone()),
    )
    .await
    .expect("in-memory subscribe cannot fail");

    let state = Arc::new(AppState {
        orders: OrderService::new(store.clone(), broker.clone()),
        payments: PaymentService::new(store.clone(), gateway.clone(), broker.clone()),
        verifier: verifier.clone(),
    });

    DefaultState {
        state,
        store,
        gateway,
        broker,
        contacts,
        email,
        sms,
        verifier,
    }
}
