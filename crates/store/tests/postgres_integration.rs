//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use common::{OrderId, UserId};
use domain::{
    Address, Money, Order, OrderItem, OrderStatus, Payment, PaymentStatus, Refund, RefundStatus,
};
use serial_test::serial;
use sqlx::PgPool;
use store::{OrderStore, PaymentStore, PostgresStore, StoreError};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            // Run migrations with a temporary pool
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!("../../../migrations/0001_initial_schema.sql"))
                .execute(&temp_pool)
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE order_items, refunds, payments, orders")
        .execute(&pool)
        .await
        .unwrap();

    PostgresStore::new(pool)
}

fn address() -> Address {
    Address {
        street: "1 Main St".to_string(),
        city: "Springfield".to_string(),
        state: "IL".to_string(),
        postal_code: "62701".to_string(),
        country: "US".to_string(),
    }
}

fn sample_order(user_id: UserId) -> Order {
    Order::create(
        user_id,
        vec![
            OrderItem::new("SKU-001", 2, Money::from_cents(1000)),
            OrderItem::new("SKU-002", 1, Money::from_cents(500)),
        ],
        address(),
    )
    .unwrap()
}

fn sample_payment(order_id: OrderId, intent_ref: &str) -> Payment {
    Payment::create(
        order_id,
        UserId::new(),
        Money::from_cents(2500),
        "usd",
        intent_ref,
    )
}

#[tokio::test]
#[serial]
async fn insert_and_load_order_with_items() {
    let store = get_test_store().await;
    let order = sample_order(UserId::new());

    store.insert_order(&order).await.unwrap();
    let loaded = store.get_order(order.id).await.unwrap().unwrap();

    assert_eq!(loaded.id, order.id);
    assert_eq!(loaded.items.len(), 2);
    assert_eq!(loaded.total.cents(), 2500);
    assert_eq!(loaded.status, OrderStatus::Pending);
    assert_eq!(loaded.shipping_address, order.shipping_address);
}

#[tokio::test]
#[serial]
async fn missing_order_returns_none() {
    let store = get_test_store().await;
    assert!(store.get_order(OrderId::new()).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn orders_for_user_most_recent_first() {
    let store = get_test_store().await;
    let user_id = UserId::new();

    let mut first = sample_order(user_id);
    let mut second = sample_order(user_id);
    second.created_at = first.created_at + chrono::Duration::seconds(5);
    first.updated_at = first.created_at;
    second.updated_at = second.created_at;

    store.insert_order(&first).await.unwrap();
    store.insert_order(&second).await.unwrap();
    store.insert_order(&sample_order(UserId::new())).await.unwrap();

    let orders = store.orders_for_user(user_id).await.unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].id, second.id);
    assert_eq!(orders[1].id, first.id);
}

#[tokio::test]
#[serial]
async fn conditional_transition_applies_once() {
    let store = get_test_store().await;
    let order = sample_order(UserId::new());
    store.insert_order(&order).await.unwrap();

    assert!(
        store
            .transition_order_status(order.id, OrderStatus::Pending, OrderStatus::Processing)
            .await
            .unwrap()
    );
    assert!(
        !store
            .transition_order_status(order.id, OrderStatus::Pending, OrderStatus::Processing)
            .await
            .unwrap()
    );

    let loaded = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, OrderStatus::Processing);
}

#[tokio::test]
#[serial]
async fn duplicate_payment_for_order_is_rejected() {
    let store = get_test_store().await;
    let order = sample_order(UserId::new());
    store.insert_order(&order).await.unwrap();

    store
        .insert_payment(&sample_payment(order.id, "pi_0001"))
        .await
        .unwrap();
    let result = store
        .insert_payment(&sample_payment(order.id, "pi_0002"))
        .await;

    assert!(matches!(result, Err(StoreError::DuplicatePayment(id)) if id == order.id));
}

#[tokio::test]
#[serial]
async fn resolve_payment_by_intent_is_terminal() {
    let store = get_test_store().await;
    let payment = sample_payment(OrderId::new(), "pi_0042");
    store.insert_payment(&payment).await.unwrap();

    let resolved = store
        .resolve_payment_by_intent("pi_0042", PaymentStatus::Completed)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resolved.status, PaymentStatus::Completed);
    assert_eq!(resolved.id, payment.id);

    // Already resolved: nothing to do.
    assert!(
        store
            .resolve_payment_by_intent("pi_0042", PaymentStatus::Failed)
            .await
            .unwrap()
            .is_none()
    );

    let loaded = store.get_payment(payment.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, PaymentStatus::Completed);
}

#[tokio::test]
#[serial]
async fn refund_rows_roundtrip() {
    let store = get_test_store().await;
    let payment = sample_payment(OrderId::new(), "pi_0100");
    store.insert_payment(&payment).await.unwrap();

    let refund = Refund::create(
        payment.id,
        Money::from_cents(500),
        "requested_by_customer",
        RefundStatus::Succeeded,
        "re_0001",
    );
    store.insert_refund(&refund).await.unwrap();

    let refunds = store.refunds_for_payment(payment.id).await.unwrap();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].amount.cents(), 500);
    assert_eq!(refunds[0].status, RefundStatus::Succeeded);

    store
        .set_payment_status(payment.id, PaymentStatus::Refunded)
        .await
        .unwrap();
    let loaded = store.get_payment(payment.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, PaymentStatus::Refunded);
}
