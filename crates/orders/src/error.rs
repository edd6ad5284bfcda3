use broker::BrokerError;
use common::OrderId;
use store::StoreError;
use thiserror::Error;

/// Errors surfaced by the order service.
#[derive(Debug, Error)]
pub enum OrderServiceError {
    /// The order request failed domain validation.
    #[error(transparent)]
    Invalid(#[from] domain::OrderError),

    /// The relational store rejected the operation.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The order row was committed but the event could not be published.
    ///
    /// Downstream state catches up once the event is retried or replayed;
    /// the caller decides whether to surface or retry.
    #[error("order {order_id} was created but publishing {routing_key} failed: {source}")]
    EventPublish {
        order_id: OrderId,
        routing_key: String,
        #[source]
        source: BrokerError,
    },

    /// No order exists with the given ID.
    #[error("order not found: {0}")]
    NotFound(OrderId),
}
