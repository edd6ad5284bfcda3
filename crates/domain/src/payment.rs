//! Payment and refund entities with their status state machines.

use chrono::{DateTime, Utc};
use common::{OrderId, PaymentId, RefundId, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::Money;

/// The status of a payment.
///
/// A payment is terminal once resolved: the gateway callback moves it from
/// `Pending` to `Completed` or `Failed` exactly once. `Refunded` is reachable
/// only from `Completed`, after refunds cover the full amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Gateway intent opened, awaiting the asynchronous callback.
    #[default]
    Pending,

    /// Gateway confirmed the charge.
    Completed,

    /// Gateway declined the charge (terminal state).
    Failed,

    /// Fully refunded (terminal state).
    Refunded,
}

impl PaymentStatus {
    /// Returns true once the gateway has answered, one way or the other.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    /// Returns true if refunds may be created against this payment.
    pub fn can_refund(&self) -> bool {
        matches!(self, PaymentStatus::Completed)
    }

    /// Returns the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown payment status string.
#[derive(Debug, Error)]
#[error("unknown payment status: {0}")]
pub struct UnknownPaymentStatus(pub String);

impl std::str::FromStr for PaymentStatus {
    type Err = UnknownPaymentStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(UnknownPaymentStatus(other.to_string())),
        }
    }
}

/// The status of a refund, mirroring the gateway's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    /// The gateway accepted the refund but has not settled it.
    Pending,

    /// The gateway settled the refund.
    Succeeded,

    /// The gateway rejected the refund.
    Failed,
}

impl RefundStatus {
    /// Returns the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Pending => "pending",
            RefundStatus::Succeeded => "succeeded",
            RefundStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown refund status string.
#[derive(Debug, Error)]
#[error("unknown refund status: {0}")]
pub struct UnknownRefundStatus(pub String);

impl std::str::FromStr for RefundStatus {
    type Err = UnknownRefundStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RefundStatus::Pending),
            "succeeded" => Ok(RefundStatus::Succeeded),
            "failed" => Ok(RefundStatus::Failed),
            other => Err(UnknownRefundStatus(other.to_string())),
        }
    }
}

/// A payment row. Exactly one payment exists per order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub amount: Money,
    pub currency: String,
    pub status: PaymentStatus,
    /// Reference of the intent opened at the external gateway.
    pub intent_ref: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a new pending payment for the given gateway intent.
    pub fn create(
        order_id: OrderId,
        user_id: UserId,
        amount: Money,
        currency: impl Into<String>,
        intent_ref: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: PaymentId::new(),
            order_id,
            user_id,
            amount,
            currency: currency.into(),
            status: PaymentStatus::Pending,
            intent_ref: intent_ref.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A refund record. A payment may accumulate multiple partial refunds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refund {
    pub id: RefundId,
    pub payment_id: PaymentId,
    pub amount: Money,
    pub reason: String,
    pub status: RefundStatus,
    /// Reference of the refund at the external gateway.
    pub gateway_refund_ref: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Refund {
    /// Creates a refund record mirroring the gateway's answer.
    pub fn create(
        payment_id: PaymentId,
        amount: Money,
        reason: impl Into<String>,
        status: RefundStatus,
        gateway_refund_ref: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: RefundId::new(),
            payment_id,
            amount,
            reason: reason.into(),
            status,
            gateway_refund_ref: gateway_refund_ref.into(),
            created_at: now,
            updated_at: now,
        }
    }
}
