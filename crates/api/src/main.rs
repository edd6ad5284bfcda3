//! API server entry point.

use std::sync::Arc;

use api::{AppState, Config};
use broker::AmqpBroker;
use notifier::{InMemoryContactSource, LoggingEmailSender, LoggingSmsSender, NotificationDispatcher};
use orders::OrderService;
use payments::{CallbackVerifier, HttpGateway, PaymentService};
use store::PostgresStore;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() {
    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Relational store
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");
    let store = PostgresStore::new(pool);
    store.run_migrations().await.expect("migrations failed");

    // 4. Message broker, waits until it becomes reachable
    let broker = AmqpBroker::connect(&config.amqp_url).await;

    // 5. Payment gateway client
    let gateway = HttpGateway::new(
        &config.gateway_url,
        &config.gateway_api_key,
        config.gateway_timeout,
    )
    .expect("failed to build gateway client");

    // 6. Broker consumers
    orders::subscribe_payment_events(&broker, store.clone())
        .await
        .expect("failed to subscribe payment event consumer");
    notifier::subscribe_notifications(
        &broker,
        NotificationDispatcher::new(
            InMemoryContactSource::new(),
            LoggingEmailSender,
            LoggingSmsSender,
        ),
    )
    .await
    .expect("failed to subscribe notification dispatcher");

    // 7. Application state and router
    let state = Arc::new(AppState {
        orders: OrderService::new(store.clone(), broker.clone()),
        payments: PaymentService::new(store, gateway, broker.clone())
            .with_gateway_timeout(config.gateway_timeout),
        verifier: CallbackVerifier::new(&config.webhook_secret),
    });
    let app = api::create_app(state, metrics_handle);

    // 8. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    broker.disconnect().await;
    tracing::info!("server shut down gracefully");
}
