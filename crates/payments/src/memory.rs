//! In-memory payment gateway for testing.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::{Money, RefundStatus};

use crate::gateway::{GatewayError, GatewayRefund, Intent, IntentRequest, PaymentGateway};

#[derive(Debug)]
struct GatewayState {
    /// Intents keyed by idempotency key.
    intents: HashMap<String, Intent>,
    refunds: Vec<(String, i64)>,
    next_intent: u32,
    next_refund: u32,
    fail_on_create_intent: bool,
    fail_next_create_intent: bool,
    fail_on_refund: bool,
    refund_status: RefundStatus,
}

impl Default for GatewayState {
    fn default() -> Self {
        Self {
            intents: HashMap::new(),
            refunds: Vec::new(),
            next_intent: 0,
            next_refund: 0,
            fail_on_create_intent: false,
            fail_next_create_intent: false,
            fail_on_refund: false,
            refund_status: RefundStatus::Succeeded,
        }
    }
}

/// In-memory payment gateway for testing.
///
/// Hands out sequential `pi_`/`re_` references, deduplicates intents by
/// idempotency key and can be told to fail on demand.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGateway {
    state: Arc<RwLock<GatewayState>>,
}

impl InMemoryGateway {
    /// Creates a new in-memory gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the gateway to fail every intent creation.
    pub fn set_fail_on_create_intent(&self, fail: bool) {
        self.state.write().unwrap().fail_on_create_intent = fail;
    }

    /// Configures the gateway to fail exactly the next intent creation.
    pub fn set_fail_next_create_intent(&self) {
        self.state.write().unwrap().fail_next_create_intent = true;
    }

    /// Configures the gateway to fail refund requests.
    pub fn set_fail_on_refund(&self, fail: bool) {
        self.state.write().unwrap().fail_on_refund = fail;
    }

    /// Sets the status returned for accepted refunds.
    pub fn set_refund_status(&self, status: RefundStatus) {
        self.state.write().unwrap().refund_status = status;
    }

    /// Returns the number of distinct intents opened.
    pub fn intent_count(&self) -> usize {
        self.state.read().unwrap().intents.len()
    }

    /// Returns the number of refunds accepted.
    pub fn refund_count(&self) -> usize {
        self.state.read().unwrap().refunds.len()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryGateway {
    async fn create_intent(&self, request: &IntentRequest) -> Result<Intent, GatewayError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_create_intent || state.fail_next_create_intent {
            state.fail_next_create_intent = false;
            return Err(GatewayError::Request("gateway unavailable".to_string()));
        }

        if let Some(existing) = state.intents.get(&request.idempotency_key) {
            return Ok(existing.clone());
        }

        state.next_intent += 1;
        let intent = Intent {
            intent_id: format!("pi_{:04}", state.next_intent),
            client_secret: format!("cs_{:04}", state.next_intent),
        };
        state
            .intents
            .insert(request.idempotency_key.clone(), intent.clone());
        Ok(intent)
    }

    async fn create_refund(
        &self,
        intent_ref: &str,
        amount: Money,
        _reason: &str,
    ) -> Result<GatewayRefund, GatewayError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_refund {
            return Err(GatewayError::Request("gateway unavailable".to_string()));
        }

        state.next_refund += 1;
        state.refunds.push((intent_ref.to_string(), amount.cents()));
        Ok(GatewayRefund {
            refund_id: format!("re_{:04}", state.next_refund),
            status: state.refund_status,
        })
    }
}
