use broker::BrokerError;
use common::PaymentId;
use domain::{Money, PaymentStatus};
use store::StoreError;
use thiserror::Error;

use crate::gateway::GatewayError;

/// Errors surfaced by the payment service.
#[derive(Debug, Error)]
pub enum PaymentServiceError {
    /// Opening the gateway intent failed; no local row was written.
    #[error("payment creation failed: {0}")]
    CreationFailed(#[source] GatewayError),

    /// A gateway call failed outside intent creation.
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// The relational store rejected the operation.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// No payment exists with the given ID.
    #[error("payment not found: {0}")]
    NotFound(PaymentId),

    /// Refunds may only be created against completed payments.
    #[error("can only refund completed payments (payment {id} is {status})")]
    RefundNotAllowed { id: PaymentId, status: PaymentStatus },

    /// Refund amounts must be positive.
    #[error("invalid refund amount: {0}")]
    InvalidRefundAmount(Money),

    /// The cumulative refunds would exceed the original payment amount.
    #[error("refund of {requested} exceeds remaining refundable amount {remaining}")]
    RefundExceedsPayment { requested: Money, remaining: Money },

    /// The payment row was updated but the event could not be published.
    #[error("payment {payment_id} was updated but publishing {routing_key} failed: {source}")]
    EventPublish {
        payment_id: PaymentId,
        routing_key: String,
        #[source]
        source: BrokerError,
    },
}
