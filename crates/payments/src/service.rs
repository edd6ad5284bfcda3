//! Payment service driving the payment state machine.

use std::future::Future;
use std::time::Duration;

use broker::{Envelope, MessageBroker};
use common::{OrderId, PaymentId, UserId};
use domain::{
    EXCHANGE, Money, PAYMENT_COMPLETED, PAYMENT_FAILED, PAYMENT_REFUNDED, Payment,
    PaymentCompleted, PaymentFailed, PaymentRefunded, PaymentStatus, Refund, RefundStatus,
};
use serde::Serialize;
use store::PaymentStore;

use crate::error::PaymentServiceError;
use crate::gateway::{GatewayError, IntentRequest, PaymentGateway};
use crate::webhook::{CallbackIntent, CallbackKind, GatewayCallback};

const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

/// Service for creating payments, reconciling gateway callbacks and
/// guarding refunds.
///
/// Payments are terminal once resolved: reconciliation is a conditional
/// `pending` transition keyed by the gateway intent reference, so a
/// redelivered callback updates nothing and emits nothing.
pub struct PaymentService<S: PaymentStore, G: PaymentGateway, B: MessageBroker> {
    store: S,
    gateway: G,
    broker: B,
    gateway_timeout: Duration,
}

impl<S: PaymentStore, G: PaymentGateway, B: MessageBroker> PaymentService<S, G, B> {
    /// Creates a new payment service with the default gateway timeout.
    pub fn new(store: S, gateway: G, broker: B) -> Self {
        Self {
            store,
            gateway,
            broker,
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
        }
    }

    /// Overrides the bounded timeout applied to each gateway call.
    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    /// Opens a gateway intent and persists the pending payment row.
    ///
    /// The idempotency key is derived from `(order_id, user_id)`, so
    /// client-side retries do not open duplicate gateway intents. If the
    /// gateway call fails, no row is written. Returns the payment and the
    /// client secret the caller needs to confirm the charge.
    #[tracing::instrument(skip(self))]
    pub async fn create_payment(
        &self,
        order_id: OrderId,
        user_id: UserId,
        amount: Money,
        currency: &str,
    ) -> Result<(Payment, String), PaymentServiceError> {
        let request = IntentRequest {
            order_id,
            user_id,
            amount,
            currency: currency.to_string(),
            idempotency_key: format!("{order_id}-{user_id}"),
        };

        let intent = self
            .call_gateway(|| self.gateway.create_intent(&request))
            .await
            .map_err(PaymentServiceError::CreationFailed)?;

        let payment = Payment::create(
            order_id,
            user_id,
            amount,
            request.currency,
            intent.intent_id,
        );
        self.store.insert_payment(&payment).await?;
        metrics::counter!("payments_created_total").increment(1);

        tracing::info!(
            payment_id = %payment.id,
            intent_ref = %payment.intent_ref,
            %order_id,
            "payment created"
        );
        Ok((payment, intent.client_secret))
    }

    /// Applies a verified gateway callback to local state.
    ///
    /// Callbacks without order correlation and callbacks for unknown or
    /// already-resolved intents are logged and dropped: retrying cannot
    /// manufacture missing data, and a resolved payment is terminal.
    #[tracing::instrument(skip(self, callback), fields(intent_ref = %callback.data.id))]
    pub async fn handle_callback(
        &self,
        callback: GatewayCallback,
    ) -> Result<(), PaymentServiceError> {
        match callback.kind {
            CallbackKind::Succeeded => {
                self.resolve(callback.data, PaymentStatus::Completed, None)
                    .await
            }
            CallbackKind::Failed => {
                let reason = callback
                    .data
                    .last_error
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string());
                self.resolve(callback.data, PaymentStatus::Failed, Some(reason))
                    .await
            }
            CallbackKind::Other => {
                tracing::debug!("unhandled gateway callback kind");
                Ok(())
            }
        }
    }

    async fn resolve(
        &self,
        data: CallbackIntent,
        to: PaymentStatus,
        failure_reason: Option<String>,
    ) -> Result<(), PaymentServiceError> {
        let Some(order_id) = data.metadata.order_id else {
            tracing::warn!(
                intent_ref = %data.id,
                "gateway callback without order correlation, dropping"
            );
            return Ok(());
        };

        let Some(payment) = self.store.resolve_payment_by_intent(&data.id, to).await? else {
            tracing::warn!(
                intent_ref = %data.id,
                %order_id,
                "callback for unknown or already-resolved intent, dropping"
            );
            return Ok(());
        };

        metrics::counter!("payments_resolved_total", "status" => to.as_str()).increment(1);
        tracing::info!(
            payment_id = %payment.id,
            %order_id,
            status = %to,
            "payment resolved"
        );

        match to {
            PaymentStatus::Completed => {
                self.publish(
                    PAYMENT_COMPLETED,
                    &PaymentCompleted::new(&payment),
                    payment.id,
                )
                .await
            }
            PaymentStatus::Failed => {
                let reason = failure_reason.unwrap_or_else(|| "unknown error".to_string());
                self.publish(
                    PAYMENT_FAILED,
                    &PaymentFailed::new(&payment, reason),
                    payment.id,
                )
                .await
            }
            _ => Ok(()),
        }
    }

    /// Requests a gateway refund and persists the refund record.
    ///
    /// Only completed payments can be refunded, and cumulative non-failed
    /// refunds can never exceed the original amount. Validation rejects
    /// before any side effect. Once non-failed refunds cover the full
    /// amount, the payment is marked refunded.
    #[tracing::instrument(skip(self))]
    pub async fn create_refund(
        &self,
        payment_id: PaymentId,
        amount: Money,
        reason: &str,
    ) -> Result<Refund, PaymentServiceError> {
        let payment = self
            .store
            .get_payment(payment_id)
            .await?
            .ok_or(PaymentServiceError::NotFound(payment_id))?;

        if !payment.status.can_refund() {
            return Err(PaymentServiceError::RefundNotAllowed {
                id: payment_id,
                status: payment.status,
            });
        }
        if !amount.is_positive() {
            return Err(PaymentServiceError::InvalidRefundAmount(amount));
        }

        let refunded: Money = self
            .store
            .refunds_for_payment(payment_id)
            .await?
            .iter()
            .filter(|r| r.status != RefundStatus::Failed)
            .map(|r| r.amount)
            .sum();
        let remaining = payment.amount - refunded;
        if amount > remaining {
            return Err(PaymentServiceError::RefundExceedsPayment {
                requested: amount,
                remaining,
            });
        }

        let accepted = self
            .call_gateway(|| self.gateway.create_refund(&payment.intent_ref, amount, reason))
            .await?;

        let refund = Refund::create(
            payment_id,
            amount,
            reason,
            accepted.status,
            accepted.refund_id,
        );
        self.store.insert_refund(&refund).await?;
        metrics::counter!("refunds_created_total").increment(1);

        if accepted.status != RefundStatus::Failed {
            if refunded + amount == payment.amount {
                self.store
                    .set_payment_status(payment_id, PaymentStatus::Refunded)
                    .await?;
                tracing::info!(%payment_id, "payment fully refunded");
            }
            self.publish(
                PAYMENT_REFUNDED,
                &PaymentRefunded::new(&payment, amount),
                payment_id,
            )
            .await?;
        }

        tracing::info!(
            %payment_id,
            refund_id = %refund.id,
            amount = %amount,
            "refund created"
        );
        Ok(refund)
    }

    /// Loads a payment by ID.
    #[tracing::instrument(skip(self))]
    pub async fn get_payment(
        &self,
        id: PaymentId,
    ) -> Result<Option<Payment>, PaymentServiceError> {
        Ok(self.store.get_payment(id).await?)
    }

    /// Loads the payment belonging to an order.
    #[tracing::instrument(skip(self))]
    pub async fn payment_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Option<Payment>, PaymentServiceError> {
        Ok(self.store.payment_for_order(order_id).await?)
    }

    /// Runs a gateway call under a bounded timeout with a single retry on
    /// transient failure.
    async fn call_gateway<T, F, Fut>(&self, op: F) -> Result<T, GatewayError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        match tokio::time::timeout(self.gateway_timeout, op()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) if !err.is_transient() => return Err(err),
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "gateway call failed, retrying once");
            }
            Err(_) => {
                tracing::warn!("gateway call timed out, retrying once");
            }
        }

        match tokio::time::timeout(self.gateway_timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout),
        }
    }

    async fn publish(
        &self,
        routing_key: &str,
        payload: &impl Serialize,
        payment_id: PaymentId,
    ) -> Result<(), PaymentServiceError> {
        let envelope =
            Envelope::new(routing_key, payload).map_err(|err| PaymentServiceError::EventPublish {
                payment_id,
                routing_key: routing_key.to_string(),
                source: err.into(),
            })?;

        self.broker
            .publish(EXCHANGE, envelope)
            .await
            .map_err(|source| PaymentServiceError::EventPublish {
                payment_id,
                routing_key: routing_key.to_string(),
                source,
            })
    }
}
