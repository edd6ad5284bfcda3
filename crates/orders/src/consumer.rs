//! Consumer advancing orders on payment lifecycle events.

use std::sync::Arc;

use async_trait::async_trait;
use broker::{
    BrokerError, Envelope, EventHandler, HandlerError, MessageBroker, QueueBinding,
};
use common::OrderId;
use domain::{
    EXCHANGE, OrderStatus, PAYMENT_COMPLETED, PAYMENT_FAILED, PaymentCompleted, PaymentFailed,
};
use store::OrderStore;

/// Durable queue receiving `payment.completed`.
pub const PAYMENT_COMPLETED_QUEUE: &str = "order-payment-completed";

/// Durable queue receiving `payment.failed`.
pub const PAYMENT_FAILED_QUEUE: &str = "order-payment-failed";

/// Applies payment outcomes to the order state machine.
///
/// The handler is idempotent: a payment event for an order that already
/// left `pending` is acknowledged without touching the row, so redelivery
/// is always safe. An event for an order that does not exist yet fails the
/// delivery: the order write and the payment intent race, and redelivery
/// gives the row time to appear.
pub struct PaymentEventConsumer<S> {
    store: S,
}

impl<S: OrderStore> PaymentEventConsumer<S> {
    /// Creates a consumer over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    async fn apply(&self, order_id: OrderId, to: OrderStatus) -> Result<(), HandlerError> {
        let Some(order) = self.store.get_order(order_id).await? else {
            return Err(format!("order not found: {order_id}").into());
        };

        match order.status {
            OrderStatus::Pending => {
                let moved = self
                    .store
                    .transition_order_status(order_id, OrderStatus::Pending, to)
                    .await?;
                if moved {
                    metrics::counter!("order_status_transitions_total", "status" => to.as_str())
                        .increment(1);
                    tracing::info!(%order_id, status = %to, "order status updated");
                } else {
                    tracing::debug!(%order_id, "order concurrently transitioned, nothing to do");
                }
                Ok(())
            }
            status => {
                tracing::debug!(
                    %order_id,
                    %status,
                    "ignoring payment event for non-pending order"
                );
                Ok(())
            }
        }
    }
}

#[async_trait]
impl<S: OrderStore> EventHandler for PaymentEventConsumer<S> {
    async fn handle(&self, envelope: &Envelope) -> Result<(), HandlerError> {
        match envelope.routing_key.as_str() {
            PAYMENT_COMPLETED => {
                let event: PaymentCompleted = envelope.decode()?;
                tracing::info!(
                    order_id = %event.order_id,
                    amount = %event.amount,
                    "payment completed event received"
                );
                self.apply(event.order_id, OrderStatus::Processing).await
            }
            PAYMENT_FAILED => {
                let event: PaymentFailed = envelope.decode()?;
                tracing::info!(
                    order_id = %event.order_id,
                    reason = %event.reason,
                    "payment failed event received"
                );
                self.apply(event.order_id, OrderStatus::PaymentFailed).await
            }
            other => {
                tracing::debug!(routing_key = %other, "ignoring unexpected event");
                Ok(())
            }
        }
    }
}

/// Declares the payment queues and starts consuming.
pub async fn subscribe_payment_events<S, B>(broker: &B, store: S) -> Result<(), BrokerError>
where
    S: OrderStore + 'static,
    B: MessageBroker,
{
    let handler = Arc::new(PaymentEventConsumer::new(store));
    broker
        .subscribe(
            QueueBinding::new(EXCHANGE, PAYMENT_COMPLETED_QUEUE, PAYMENT_COMPLETED),
            handler.clone(),
        )
        .await?;
    broker
        .subscribe(
            QueueBinding::new(EXCHANGE, PAYMENT_FAILED_QUEUE, PAYMENT_FAILED),
            handler,
        )
        .await?;
    Ok(())
}
