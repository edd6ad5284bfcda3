//! Order entity and its status state machine.

use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::Money;

/// The status of an order in its lifecycle.
///
/// Status transitions:
/// ```text
/// Pending ──┬──► Processing ──► Shipped ──► Delivered
///           │         │            │
///           ├──► PaymentFailed     │
///           └─────────┴────────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order has been placed, payment not yet confirmed.
    #[default]
    Pending,

    /// Payment confirmed, order is being fulfilled.
    Processing,

    /// Payment was declined (terminal state).
    PaymentFailed,

    /// Order has left the warehouse.
    Shipped,

    /// Order reached the customer (terminal state).
    Delivered,

    /// Order was cancelled manually (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// Returns true if this is a terminal status (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::PaymentFailed | OrderStatus::Cancelled
        )
    }

    /// Returns true if the order can be cancelled from this status.
    pub fn can_cancel(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if moving from this status to `next` is a valid transition.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Processing)
                | (OrderStatus::Pending, OrderStatus::PaymentFailed)
                | (OrderStatus::Processing, OrderStatus::Shipped)
                | (OrderStatus::Shipped, OrderStatus::Delivered)
        ) || (next == OrderStatus::Cancelled && self.can_cancel())
    }

    /// Returns the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::PaymentFailed => "payment_failed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown order status string.
#[derive(Debug, Error)]
#[error("unknown order status: {0}")]
pub struct UnknownOrderStatus(pub String);

impl std::str::FromStr for OrderStatus {
    type Err = UnknownOrderStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "payment_failed" => Ok(OrderStatus::PaymentFailed),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(UnknownOrderStatus(other.to_string())),
        }
    }
}

/// Product identifier (SKU).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Creates a new product ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the product ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProductId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ProductId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A line item captured at order time.
///
/// Items are an immutable snapshot: price changes after the order exists
/// never affect it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    /// The product identifier.
    pub product_id: ProductId,

    /// Quantity ordered.
    pub quantity: u32,

    /// Price per unit at order time.
    pub price: Money,
}

impl OrderItem {
    /// Creates a new order item.
    pub fn new(product_id: impl Into<ProductId>, quantity: u32, price: Money) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            price,
        }
    }

    /// Returns the subtotal for this item (quantity * price).
    pub fn subtotal(&self) -> Money {
        self.price.multiply(self.quantity)
    }
}

/// Shipping address captured at order time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

/// Errors raised when constructing or transitioning an order.
#[derive(Debug, Error)]
pub enum OrderError {
    /// An order must contain at least one item.
    #[error("order has no items")]
    NoItems,

    /// Item quantity must be positive.
    #[error("invalid quantity for product {product_id}: {quantity}")]
    InvalidQuantity { product_id: String, quantity: u32 },

    /// Item price must be positive.
    #[error("invalid price for product {product_id}: {price}")]
    InvalidPrice { product_id: String, price: i64 },

    /// The requested status change is not allowed.
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}

/// An order row with its immutable line items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub total: Money,
    pub shipping_address: Address,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new pending order, deriving the total from its items.
    ///
    /// Validates that the order has at least one item and that every item
    /// carries a positive quantity and price.
    pub fn create(
        user_id: UserId,
        items: Vec<OrderItem>,
        shipping_address: Address,
    ) -> Result<Self, OrderError> {
        if items.is_empty() {
            return Err(OrderError::NoItems);
        }

        for item in &items {
            if item.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    product_id: item.product_id.to_string(),
                    quantity: item.quantity,
                });
            }
            if !item.price.is_positive() {
                return Err(OrderError::InvalidPrice {
                    product_id: item.product_id.to_string(),
                    price: item.price.cents(),
                });
            }
        }

        let total = items.iter().map(OrderItem::subtotal).sum();
        let now = Utc::now();

        Ok(Self {
            id: OrderId::new(),
            user_id,
            items,
            total,
            shipping_address,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> Address {
        Address {
            street: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            postal_code: "62701".to_string(),
            country: "US".to_string(),
        }
    }

    #[test]
    fn test_create_order_derives_total() {
        let order = Order::create(
            UserId::new(),
            vec![
                OrderItem::new("SKU-001", 2, Money::from_cents(1000)),
                OrderItem::new("SKU-002", 1, Money::from_cents(500)),
            ],
            address(),
        )
        .unwrap();

        assert_eq!(order.total.cents(), 2500);
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn test_create_order_without_items_fails() {
        let result = Order::create(UserId::new(), vec![], address());
        assert!(matches!(result, Err(OrderError::NoItems)));
    }

    #[test]
    fn test_create_order_zero_quantity_fails() {
        let result = Order::create(
            UserId::new(),
            vec![OrderItem::new("SKU-001", 0, Money::from_cents(1000))],
            address(),
        );
        assert!(matches!(result, Err(OrderError::InvalidQuantity { .. })));
    }

    #[test]
    fn test_create_order_zero_price_fails() {
        let result = Order::create(
            UserId::new(),
            vec![OrderItem::new("SKU-001", 1, Money::zero())],
            address(),
        );
        assert!(matches!(result, Err(OrderError::InvalidPrice { .. })));
    }

    #[test]
    fn test_payment_transitions_from_pending() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::PaymentFailed));
        assert!(!OrderStatus::Processing.can_transition_to(OrderStatus::Processing));
        assert!(!OrderStatus::PaymentFailed.can_transition_to(OrderStatus::Processing));
    }

    #[test]
    fn test_fulfillment_transitions() {
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Shipped));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Shipped));
    }

    #[test]
    fn test_cancel_only_from_non_terminal() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::PaymentFailed.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn test_terminal_states() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Processing.is_terminal());
        assert!(!OrderStatus::Shipped.is_terminal());
        assert!(OrderStatus::PaymentFailed.is_terminal());
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Processing,
            OrderStatus::PaymentFailed,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            let parsed: OrderStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("unknown".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_item_serializes_camel_case() {
        let item = OrderItem::new("SKU-001", 2, Money::from_cents(1000));
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["productId"], "SKU-001");
        assert_eq!(json["quantity"], 2);
        assert_eq!(json["price"], 1000);
    }
}
