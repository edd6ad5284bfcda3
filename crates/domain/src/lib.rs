//! Domain layer for the order fulfillment pipeline.
//!
//! This crate provides the pure domain types shared by every service:
//! - Order and payment entities with their status state machines
//! - Money as integer minor units
//! - The wire payloads published over the message broker

pub mod events;
pub mod money;
pub mod order;
pub mod payment;

pub use events::{
    EXCHANGE, ORDER_CREATED, OrderCreated, PAYMENT_COMPLETED, PAYMENT_FAILED, PAYMENT_REFUNDED,
    PaymentCompleted, PaymentFailed, PaymentRefunded,
};
pub use money::Money;
pub use order::{Address, Order, OrderError, OrderItem, OrderStatus, ProductId, UnknownOrderStatus};
pub use payment::{
    Payment, PaymentStatus, Refund, RefundStatus, UnknownPaymentStatus, UnknownRefundStatus,
};
