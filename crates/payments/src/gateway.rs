//! Payment gateway port.

use async_trait::async_trait;
use common::{OrderId, UserId};
use domain::{Money, RefundStatus};
use thiserror::Error;

/// Request to open a payment intent at the gateway.
#[derive(Debug, Clone)]
pub struct IntentRequest {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub amount: Money,
    pub currency: String,
    /// Caller-supplied token letting the gateway deduplicate repeated
    /// create-payment calls for the same order.
    pub idempotency_key: String,
}

/// A payment intent opened at the gateway.
#[derive(Debug, Clone)]
pub struct Intent {
    pub intent_id: String,
    /// Secret the client uses to confirm the payment with the gateway.
    pub client_secret: String,
}

/// The gateway's answer to a refund request.
#[derive(Debug, Clone)]
pub struct GatewayRefund {
    pub refund_id: String,
    pub status: RefundStatus,
}

/// Errors returned by gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request could not be completed (network, 5xx, bad response).
    #[error("gateway request failed: {0}")]
    Request(String),

    /// The request did not complete within the bounded timeout.
    #[error("gateway request timed out")]
    Timeout,

    /// The gateway rejected the request; retrying will not help.
    #[error("gateway rejected the request: {0}")]
    Rejected(String),
}

impl GatewayError {
    /// Returns true if a retry might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Request(_) | GatewayError::Timeout)
    }
}

/// Synchronous operations against the external payment gateway.
///
/// The asynchronous half of the gateway protocol, the signed callback,
/// arrives over HTTP and is handled by [`crate::webhook`].
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a payment intent. Idempotent under `request.idempotency_key`.
    async fn create_intent(&self, request: &IntentRequest) -> Result<Intent, GatewayError>;

    /// Requests a refund against a previously opened intent.
    async fn create_refund(
        &self,
        intent_ref: &str,
        amount: Money,
        reason: &str,
    ) -> Result<GatewayRefund, GatewayError>;
}
