//! Shared identifier types used across the fulfillment pipeline.

pub mod types;

pub use types::{OrderId, PaymentId, RefundId, UserId};
