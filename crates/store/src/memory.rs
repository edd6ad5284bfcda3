//! In-memory store implementation for testing.
//!
//! Provides the same interface as the PostgreSQL implementation, plus
//! failure-injection toggles so tests can exercise error paths.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, PaymentId, UserId};
use domain::{Order, OrderStatus, Payment, PaymentStatus, Refund};
use tokio::sync::RwLock;

use crate::{
    Result, StoreError,
    repository::{OrderStore, PaymentStore},
};

#[derive(Default)]
struct State {
    orders: HashMap<OrderId, Order>,
    payments: HashMap<PaymentId, Payment>,
    refunds: Vec<Refund>,
    fail_on_insert_order: bool,
    fail_on_insert_payment: bool,
}

/// In-memory store for orders, payments and refunds.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the store to reject order inserts.
    pub async fn set_fail_on_insert_order(&self, fail: bool) {
        self.state.write().await.fail_on_insert_order = fail;
    }

    /// Configures the store to reject payment inserts.
    pub async fn set_fail_on_insert_payment(&self, fail: bool) {
        self.state.write().await.fail_on_insert_payment = fail;
    }

    /// Returns the total number of refund rows.
    pub async fn refund_count(&self) -> usize {
        self.state.read().await.refunds.len()
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn insert_order(&self, order: &Order) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_on_insert_order {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        state.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Option<Order>> {
        let mut state = self.state.write().await;
        Ok(state.orders.get_mut(&id).map(|order| {
            order.status = status;
            order.updated_at = Utc::now();
            order.clone()
        }))
    }

    async fn transition_order_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.orders.get_mut(&id) {
            Some(order) if order.status == from => {
                order.status = to;
                order.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl PaymentStore for InMemoryStore {
    async fn insert_payment(&self, payment: &Payment) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_on_insert_payment {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        if state
            .payments
            .values()
            .any(|p| p.order_id == payment.order_id)
        {
            return Err(StoreError::DuplicatePayment(payment.order_id));
        }
        state.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        Ok(self.state.read().await.payments.get(&id).cloned())
    }

    async fn payment_for_order(&self, order_id: OrderId) -> Result<Option<Payment>> {
        Ok(self
            .state
            .read()
            .await
            .payments
            .values()
            .find(|p| p.order_id == order_id)
            .cloned())
    }

    async fn resolve_payment_by_intent(
        &self,
        intent_ref: &str,
        to: PaymentStatus,
    ) -> Result<Option<Payment>> {
        let mut state = self.state.write().await;
        let payment = state
            .payments
            .values_mut()
            .find(|p| p.intent_ref == intent_ref && p.status == PaymentStatus::Pending);

        Ok(payment.map(|p| {
            p.status = to;
            p.updated_at = Utc::now();
            p.clone()
        }))
    }

    async fn set_payment_status(&self, id: PaymentId, status: PaymentStatus) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(payment) = state.payments.get_mut(&id) {
            payment.status = status;
            payment.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn insert_refund(&self, refund: &Refund) -> Result<()> {
        self.state.write().await.refunds.push(refund.clone());
        Ok(())
    }

    async fn refunds_for_payment(&self, payment_id: PaymentId) -> Result<Vec<Refund>> {
        Ok(self
            .state
            .read()
            .await
            .refunds
            .iter()
            .filter(|r| r.payment_id == payment_id)
            .cloned()
            .collect())
    }
}
