//! In-memory broker implementation for testing.
//!
//! Routes with the same topic grammar as the AMQP backend, tracks delivery
//! attempts and quarantines exhausted messages, and lets tests observe every
//! published envelope.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc};

use crate::{
    BrokerError, Envelope, EventHandler, MessageBroker, QueueBinding, topic::topic_matches,
};

const DEFAULT_MAX_DELIVERY_ATTEMPTS: u32 = 5;
const DEFAULT_REDELIVERY_DELAY: Duration = Duration::from_millis(25);

struct Delivery {
    envelope: Envelope,
    attempt: u32,
}

struct QueueEntry {
    binding: QueueBinding,
    tx: mpsc::UnboundedSender<Delivery>,
}

#[derive(Default)]
struct BrokerState {
    queues: Vec<QueueEntry>,
    published: Vec<Envelope>,
    quarantined: Vec<(String, Envelope)>,
}

struct Inner {
    max_delivery_attempts: u32,
    redelivery_delay: Duration,
    state: RwLock<BrokerState>,
}

/// In-memory message broker.
///
/// Provides the same contract as [`crate::AmqpBroker`]: topic routing,
/// at-least-once delivery with counted redelivery, and a per-queue
/// quarantine once attempts are exhausted.
#[derive(Clone)]
pub struct InMemoryBroker {
    inner: Arc<Inner>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    /// Creates a broker with the default redelivery policy.
    pub fn new() -> Self {
        Self::with_policy(DEFAULT_MAX_DELIVERY_ATTEMPTS, DEFAULT_REDELIVERY_DELAY)
    }

    /// Creates a broker with an explicit redelivery policy.
    pub fn with_policy(max_delivery_attempts: u32, redelivery_delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                max_delivery_attempts,
                redelivery_delay,
                state: RwLock::new(BrokerState::default()),
            }),
        }
    }

    /// Returns every envelope published so far, in publish order.
    pub async fn published(&self) -> Vec<Envelope> {
        self.inner.state.read().await.published.clone()
    }

    /// Returns published envelopes carrying the given routing key.
    pub async fn published_with_key(&self, routing_key: &str) -> Vec<Envelope> {
        self.inner
            .state
            .read()
            .await
            .published
            .iter()
            .filter(|e| e.routing_key == routing_key)
            .cloned()
            .collect()
    }

    /// Returns envelopes quarantined off the given queue.
    pub async fn quarantined(&self, queue: &str) -> Vec<Envelope> {
        self.inner
            .state
            .read()
            .await
            .quarantined
            .iter()
            .filter(|(q, _)| q == queue)
            .map(|(_, e)| e.clone())
            .collect()
    }

    fn spawn_consumer(
        &self,
        binding: QueueBinding,
        handler: Arc<dyn EventHandler>,
        tx: mpsc::UnboundedSender<Delivery>,
        mut rx: mpsc::UnboundedReceiver<Delivery>,
    ) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            while let Some(delivery) = rx.recv().await {
                match handler.handle(&delivery.envelope).await {
                    Ok(()) => {}
                    Err(err) => {
                        if delivery.attempt >= inner.max_delivery_attempts {
                            tracing::error!(
                                queue = %binding.queue,
                                routing_key = %delivery.envelope.routing_key,
                                attempts = delivery.attempt,
                                error = %err,
                                "delivery attempts exhausted, quarantining message"
                            );
                            inner
                                .state
                                .write()
                                .await
                                .quarantined
                                .push((binding.queue.clone(), delivery.envelope));
                        } else {
                            tracing::warn!(
                                queue = %binding.queue,
                                routing_key = %delivery.envelope.routing_key,
                                attempt = delivery.attempt,
                                error = %err,
                                "handler failed, scheduling redelivery"
                            );
                            tokio::time::sleep(inner.redelivery_delay).await;
                            let _ = tx.send(Delivery {
                                envelope: delivery.envelope,
                                attempt: delivery.attempt + 1,
                            });
                        }
                    }
                }
            }
        });
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn publish(&self, exchange: &str, envelope: Envelope) -> Result<(), BrokerError> {
        let mut state = self.inner.state.write().await;
        state.published.push(envelope.clone());

        for entry in &state.queues {
            if entry.binding.exchange == exchange
                && topic_matches(&entry.binding.pattern, &envelope.routing_key)
            {
                // A dropped receiver just means the consumer went away.
                let _ = entry.tx.send(Delivery {
                    envelope: envelope.clone(),
                    attempt: 1,
                });
            }
        }

        Ok(())
    }

    async fn subscribe(
        &self,
        binding: QueueBinding,
        handler: Arc<dyn EventHandler>,
    ) -> Result<(), BrokerError> {
        let (tx, rx) = mpsc::unbounded_channel();

        self.inner.state.write().await.queues.push(QueueEntry {
            binding: binding.clone(),
            tx: tx.clone(),
        });

        self.spawn_consumer(binding, handler, tx, rx);
        Ok(())
    }
}
