//! Messaging-channel collaborator ports.
//!
//! Email and SMS delivery belong to external providers; the dispatcher only
//! needs fire-and-forget sends with template-free payloads. Contact data
//! lives with the user service, reached through [`ContactSource`].

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{OrderId, UserId};
use domain::{Money, OrderItem};
use thiserror::Error;

/// A failed channel send. Never fatal to dispatching.
#[derive(Debug, Error)]
#[error("send failed: {0}")]
pub struct SendError(pub String);

/// Contact details for a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub email: String,
    pub phone: Option<String>,
}

/// Looks up contact details at the user-service boundary.
#[async_trait]
pub trait ContactSource: Send + Sync {
    async fn contact_for_user(&self, user_id: UserId) -> Option<Contact>;
}

/// Fire-and-forget email sends.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_order_confirmation(
        &self,
        to: &str,
        order_id: OrderId,
        items: &[OrderItem],
    ) -> Result<(), SendError>;

    async fn send_payment_confirmation(
        &self,
        to: &str,
        order_id: OrderId,
        amount: Money,
    ) -> Result<(), SendError>;
}

/// Fire-and-forget SMS sends.
#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send_order_notification(&self, to: &str, order_id: OrderId) -> Result<(), SendError>;

    async fn send_payment_notification(
        &self,
        to: &str,
        order_id: OrderId,
        amount: Money,
    ) -> Result<(), SendError>;
}

/// In-memory contact directory for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryContactSource {
    contacts: Arc<RwLock<HashMap<UserId, Contact>>>,
}

impl InMemoryContactSource {
    /// Creates an empty contact directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers contact details for a user.
    pub fn insert(&self, user_id: UserId, email: impl Into<String>, phone: Option<String>) {
        self.contacts.write().unwrap().insert(
            user_id,
            Contact {
                email: email.into(),
                phone,
            },
        );
    }
}

#[async_trait]
impl ContactSource for InMemoryContactSource {
    async fn contact_for_user(&self, user_id: UserId) -> Option<Contact> {
        self.contacts.read().unwrap().get(&user_id).cloned()
    }
}

/// What a recording sender saw.
#[derive(Debug, Clone, PartialEq)]
pub enum SentMessage {
    OrderConfirmation {
        to: String,
        order_id: OrderId,
        item_count: usize,
    },
    PaymentConfirmation {
        to: String,
        order_id: OrderId,
        amount: Money,
    },
}

#[derive(Debug, Default)]
struct RecorderState {
    sent: Vec<SentMessage>,
    fail: bool,
}

/// Email sender that records sends for test assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingEmailSender {
    state: Arc<RwLock<RecorderState>>,
}

impl RecordingEmailSender {
    /// Creates a new recording sender.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the sender to fail every send.
    pub fn set_fail(&self, fail: bool) {
        self.state.write().unwrap().fail = fail;
    }

    /// Returns everything sent so far.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.state.read().unwrap().sent.clone()
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send_order_confirmation(
        &self,
        to: &str,
        order_id: OrderId,
        items: &[OrderItem],
    ) -> Result<(), SendError> {
        let mut state = self.state.write().unwrap();
        if state.fail {
            return Err(SendError("email provider unavailable".to_string()));
        }
        state.sent.push(SentMessage::OrderConfirmation {
            to: to.to_string(),
            order_id,
            item_count: items.len(),
        });
        Ok(())
    }

    async fn send_payment_confirmation(
        &self,
        to: &str,
        order_id: OrderId,
        amount: Money,
    ) -> Result<(), SendError> {
        let mut state = self.state.write().unwrap();
        if state.fail {
            return Err(SendError("email provider unavailable".to_string()));
        }
        state.sent.push(SentMessage::PaymentConfirmation {
            to: to.to_string(),
            order_id,
            amount,
        });
        Ok(())
    }
}

/// SMS sender that records sends for test assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingSmsSender {
    state: Arc<RwLock<RecorderState>>,
}

impl RecordingSmsSender {
    /// Creates a new recording sender.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the sender to fail every send.
    pub fn set_fail(&self, fail: bool) {
        self.state.write().unwrap().fail = fail;
    }

    /// Returns everything sent so far.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.state.read().unwrap().sent.clone()
    }
}

#[async_trait]
impl SmsSender for RecordingSmsSender {
    async fn send_order_notification(&self, to: &str, order_id: OrderId) -> Result<(), SendError> {
        let mut state = self.state.write().unwrap();
        if state.fail {
            return Err(SendError("sms provider unavailable".to_string()));
        }
        state.sent.push(SentMessage::OrderConfirmation {
            to: to.to_string(),
            order_id,
            item_count: 0,
        });
        Ok(())
    }

    async fn send_payment_notification(
        &self,
        to: &str,
        order_id: OrderId,
        amount: Money,
    ) -> Result<(), SendError> {
        let mut state = self.state.write().unwrap();
        if state.fail {
            return Err(SendError("sms provider unavailable".to_string()));
        }
        state.sent.push(SentMessage::PaymentConfirmation {
            to: to.to_string(),
            order_id,
            amount,
        });
        Ok(())
    }
}

/// Email sender that only logs. Stands in for the provider in local runs.
#[derive(Debug, Clone, Default)]
pub struct LoggingEmailSender;

#[async_trait]
impl EmailSender for LoggingEmailSender {
    async fn send_order_confirmation(
        &self,
        to: &str,
        order_id: OrderId,
        items: &[OrderItem],
    ) -> Result<(), SendError> {
        tracing::info!(%to, %order_id, items = items.len(), "order confirmation email sent");
        Ok(())
    }

    async fn send_payment_confirmation(
        &self,
        to: &str,
        order_id: OrderId,
        amount: Money,
    ) -> Result<(), SendError> {
        tracing::info!(%to, %order_id, %amount, "payment confirmation email sent");
        Ok(())
    }
}

/// SMS sender that only logs. Stands in for the provider in local runs.
#[derive(Debug, Clone, Default)]
pub struct LoggingSmsSender;

#[async_trait]
impl SmsSender for LoggingSmsSender {
    async fn send_order_notification(&self, to: &str, order_id: OrderId) -> Result<(), SendError> {
        tracing::info!(%to, %order_id, "order notification SMS sent");
        Ok(())
    }

    async fn send_payment_notification(
        &self,
        to: &str,
        order_id: OrderId,
        amount: Money,
    ) -> Result<(), SendError> {
        tracing::info!(%to, %order_id, %amount, "payment notification SMS sent");
        Ok(())
    }
}
