//! Order service providing the write and query API for orders.

use broker::{Envelope, MessageBroker};
use common::{OrderId, UserId};
use domain::{Address, EXCHANGE, ORDER_CREATED, Order, OrderCreated, OrderItem, OrderStatus};
use store::OrderStore;

use crate::error::OrderServiceError;

/// Service for creating and querying orders.
///
/// Creation writes the order row and its line items transactionally, then
/// publishes `order.created`. A failed write surfaces synchronously and no
/// event is emitted, so a dangling event can never exist without a backing
/// row.
pub struct OrderService<S: OrderStore, B: MessageBroker> {
    store: S,
    broker: B,
}

impl<S: OrderStore, B: MessageBroker> OrderService<S, B> {
    /// Creates a new order service.
    pub fn new(store: S, broker: B) -> Self {
        Self { store, broker }
    }

    /// Creates a pending order and announces it on the broker.
    #[tracing::instrument(skip(self, items, shipping_address))]
    pub async fn create_order(
        &self,
        user_id: UserId,
        items: Vec<OrderItem>,
        shipping_address: Address,
    ) -> Result<Order, OrderServiceError> {
        let order = Order::create(user_id, items, shipping_address)?;
        self.store.insert_order(&order).await?;
        metrics::counter!("orders_created_total").increment(1);

        let envelope = Envelope::new(ORDER_CREATED, &OrderCreated::new(&order)).map_err(
            |err| OrderServiceError::EventPublish {
                order_id: order.id,
                routing_key: ORDER_CREATED.to_string(),
                source: err.into(),
            },
        )?;
        self.broker
            .publish(EXCHANGE, envelope)
            .await
            .map_err(|source| OrderServiceError::EventPublish {
                order_id: order.id,
                routing_key: ORDER_CREATED.to_string(),
                source,
            })?;

        tracing::info!(order_id = %order.id, total = %order.total, "order created");
        Ok(order)
    }

    /// Loads an order by ID.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, id: OrderId) -> Result<Option<Order>, OrderServiceError> {
        Ok(self.store.get_order(id).await?)
    }

    /// Lists a user's orders, most recent first.
    #[tracing::instrument(skip(self))]
    pub async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, OrderServiceError> {
        Ok(self.store.orders_for_user(user_id).await?)
    }

    /// Applies an administrative status update (ship, deliver, cancel).
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, OrderServiceError> {
        let order = self
            .store
            .get_order(id)
            .await?
            .ok_or(OrderServiceError::NotFound(id))?;

        if !order.status.can_transition_to(status) {
            return Err(domain::OrderError::InvalidTransition {
                from: order.status,
                to: status,
            }
            .into());
        }

        let moved = self
            .store
            .transition_order_status(id, order.status, status)
            .await?;
        if !moved {
            // Lost a race with another writer; let the caller re-read and retry.
            return Err(domain::OrderError::InvalidTransition {
                from: order.status,
                to: status,
            }
            .into());
        }

        tracing::info!(order_id = %id, status = %status, "order status updated");
        self.store
            .get_order(id)
            .await?
            .ok_or(OrderServiceError::NotFound(id))
    }
}
