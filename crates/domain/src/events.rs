//! Wire payloads published over the message broker.
//!
//! Every payload carries its own emission timestamp; the event name travels
//! as the broker routing key rather than inside the body.

use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::order::{Order, OrderItem};
use crate::payment::Payment;

/// The shared durable topic exchange all services publish to.
pub const EXCHANGE: &str = "commerce";

/// Routing key: an order row and its items were persisted.
pub const ORDER_CREATED: &str = "order.created";

/// Routing key: the gateway confirmed a payment.
pub const PAYMENT_COMPLETED: &str = "payment.completed";

/// Routing key: the gateway declined a payment.
pub const PAYMENT_FAILED: &str = "payment.failed";

/// Routing key: a refund was accepted against a completed payment.
pub const PAYMENT_REFUNDED: &str = "payment.refunded";

/// Payload of `order.created`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreated {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub total: Money,
    pub timestamp: DateTime<Utc>,
}

impl OrderCreated {
    /// Builds the payload for a freshly persisted order.
    pub fn new(order: &Order) -> Self {
        Self {
            order_id: order.id,
            user_id: order.user_id,
            items: order.items.clone(),
            total: order.total,
            timestamp: Utc::now(),
        }
    }
}

/// Payload of `payment.completed`.
///
/// Carries the owning user alongside the intent and order references so
/// pure consumers can correlate without a store lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCompleted {
    pub payment_intent_id: String,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub amount: Money,
    pub timestamp: DateTime<Utc>,
}

impl PaymentCompleted {
    /// Builds the payload for a payment the gateway just confirmed.
    pub fn new(payment: &Payment) -> Self {
        Self {
            payment_intent_id: payment.intent_ref.clone(),
            order_id: payment.order_id,
            user_id: payment.user_id,
            amount: payment.amount,
            timestamp: Utc::now(),
        }
    }
}

/// Payload of `payment.failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentFailed {
    pub payment_intent_id: String,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl PaymentFailed {
    /// Builds the payload for a payment the gateway just declined.
    pub fn new(payment: &Payment, reason: impl Into<String>) -> Self {
        Self {
            payment_intent_id: payment.intent_ref.clone(),
            order_id: payment.order_id,
            user_id: payment.user_id,
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Payload of `payment.refunded`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRefunded {
    pub payment_intent_id: String,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub amount: Money,
    pub timestamp: DateTime<Utc>,
}

impl PaymentRefunded {
    /// Builds the payload for an accepted refund of `amount`.
    pub fn new(payment: &Payment, amount: Money) -> Self {
        Self {
            payment_intent_id: payment.intent_ref.clone(),
            order_id: payment.order_id,
            user_id: payment.user_id,
            amount,
            timestamp: Utc::now(),
        }
    }
}
