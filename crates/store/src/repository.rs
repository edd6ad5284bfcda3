//! Store traits shared by the in-memory and PostgreSQL implementations.

use async_trait::async_trait;
use common::{OrderId, PaymentId, UserId};
use domain::{Order, OrderStatus, Payment, PaymentStatus, Refund};

use crate::Result;

/// Transactional read/write access to orders and their line items.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists an order and its line items in a single transaction.
    async fn insert_order(&self, order: &Order) -> Result<()>;

    /// Loads an order with its items. Returns None if it does not exist.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Lists a user's orders, most recent first.
    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// Unconditionally sets an order's status, returning the updated order.
    async fn update_order_status(&self, id: OrderId, status: OrderStatus)
    -> Result<Option<Order>>;

    /// Conditionally moves an order from `from` to `to`.
    ///
    /// Returns true if the transition happened now, false if the order was
    /// not in `from` (or does not exist). The check-and-set runs as a single
    /// conditional update so concurrent handlers race safely.
    async fn transition_order_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool>;
}

/// Read/write access to payments and their refunds.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Persists a payment row.
    ///
    /// Fails with [`crate::StoreError::DuplicatePayment`] if a payment
    /// already exists for the order.
    async fn insert_payment(&self, payment: &Payment) -> Result<()>;

    /// Loads a payment by ID.
    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>>;

    /// Loads the payment belonging to an order.
    async fn payment_for_order(&self, order_id: OrderId) -> Result<Option<Payment>>;

    /// Resolves a pending payment matched by gateway intent reference.
    ///
    /// Moves the payment from `Pending` to `to` and returns the updated row,
    /// or None if no pending payment carries that reference (the reference
    /// is unknown, or the payment was already resolved).
    async fn resolve_payment_by_intent(
        &self,
        intent_ref: &str,
        to: PaymentStatus,
    ) -> Result<Option<Payment>>;

    /// Unconditionally sets a payment's status.
    async fn set_payment_status(&self, id: PaymentId, status: PaymentStatus) -> Result<()>;

    /// Persists a refund record.
    async fn insert_refund(&self, refund: &Refund) -> Result<()>;

    /// Lists the refunds recorded against a payment.
    async fn refunds_for_payment(&self, payment_id: PaymentId) -> Result<Vec<Refund>>;
}
