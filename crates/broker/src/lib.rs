//! Durable topic-based publish/subscribe between services that do not share
//! a process or address space.
//!
//! The fabric provides at-least-once delivery: a handler that returns an
//! error sees the message again, so consumers must be idempotent. Redelivery
//! is counted, and messages that exhaust their attempts land on a durable
//! `<queue>.quarantine` queue instead of looping forever.

pub mod amqp;
pub mod envelope;
pub mod error;
pub mod memory;
pub mod topic;

use std::sync::Arc;

use async_trait::async_trait;

pub use amqp::{AmqpBroker, AmqpOptions};
pub use envelope::Envelope;
pub use error::BrokerError;
pub use memory::InMemoryBroker;
pub use topic::topic_matches;

/// Error type handlers report back to the broker.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// A consumer of delivered envelopes.
///
/// Returning `Ok` acknowledges the message permanently. Returning `Err`
/// schedules a redelivery, so the same envelope may be seen again, possibly
/// after later messages have already been processed.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, envelope: &Envelope) -> Result<(), HandlerError>;
}

/// A durable queue bound to a topic exchange under a routing pattern.
///
/// Queue names must be stable across restarts so undelivered messages
/// survive a consumer restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueBinding {
    pub exchange: String,
    pub queue: String,
    pub pattern: String,
}

impl QueueBinding {
    /// Creates a binding of `queue` to `exchange` under `pattern`.
    ///
    /// Patterns follow AMQP topic grammar: `*` matches exactly one
    /// dot-separated segment, `#` matches zero or more.
    pub fn new(
        exchange: impl Into<String>,
        queue: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Self {
        Self {
            exchange: exchange.into(),
            queue: queue.into(),
            pattern: pattern.into(),
        }
    }

    /// Name of the quarantine queue receiving exhausted messages.
    pub fn quarantine_queue(&self) -> String {
        format!("{}.quarantine", self.queue)
    }
}

/// Publish and subscribe primitives over a durable topic exchange.
///
/// The broker is an explicitly owned, injectable object so tests can
/// substitute [`InMemoryBroker`] for the AMQP-backed implementation.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Publishes a persisted message to a named topic exchange.
    ///
    /// The exchange is declared durable and idempotently re-declared on
    /// every publish. Failures propagate to the caller, which decides
    /// whether to retry or surface them.
    async fn publish(&self, exchange: &str, envelope: Envelope) -> Result<(), BrokerError>;

    /// Declares the binding's durable queue and begins consuming.
    ///
    /// Consumption runs on a background task; this call returns once the
    /// subscription is established.
    async fn subscribe(
        &self,
        binding: QueueBinding,
        handler: Arc<dyn EventHandler>,
    ) -> Result<(), BrokerError>;
}
