//! HTTP client for the external payment gateway.

use std::time::Duration;

use async_trait::async_trait;
use domain::Money;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::gateway::{GatewayError, GatewayRefund, Intent, IntentRequest, PaymentGateway};

#[derive(Serialize)]
struct IntentBody<'a> {
    amount: i64,
    currency: &'a str,
    metadata: MetadataBody,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MetadataBody {
    order_id: String,
    user_id: String,
}

#[derive(Deserialize)]
struct IntentResponse {
    id: String,
    client_secret: String,
}

#[derive(Serialize)]
struct RefundBody<'a> {
    payment_intent: &'a str,
    amount: i64,
    reason: &'a str,
}

#[derive(Deserialize)]
struct RefundResponse {
    id: String,
    status: String,
}

/// Gateway client over HTTP with a bounded request timeout.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpGateway {
    /// Creates a gateway client against `base_url`.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| GatewayError::Request(err.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    fn map_send_error(err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout
        } else {
            GatewayError::Request(err.to_string())
        }
    }

    async fn error_from_status(status: StatusCode, response: reqwest::Response) -> GatewayError {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        if status.is_client_error() {
            GatewayError::Rejected(format!("{status} - {body}"))
        } else {
            GatewayError::Request(format!("{status} - {body}"))
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn create_intent(&self, request: &IntentRequest) -> Result<Intent, GatewayError> {
        let url = format!("{}/v1/payment_intents", self.base_url);
        let body = IntentBody {
            amount: request.amount.cents(),
            currency: &request.currency,
            metadata: MetadataBody {
                order_id: request.order_id.to_string(),
                user_id: request.user_id.to_string(),
            },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Idempotency-Key", &request.idempotency_key)
            .json(&body)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        match response.status() {
            status if status.is_success() => {
                let intent: IntentResponse = response
                    .json()
                    .await
                    .map_err(|err| GatewayError::Request(err.to_string()))?;
                Ok(Intent {
                    intent_id: intent.id,
                    client_secret: intent.client_secret,
                })
            }
            status => Err(Self::error_from_status(status, response).await),
        }
    }

    async fn create_refund(
        &self,
        intent_ref: &str,
        amount: Money,
        reason: &str,
    ) -> Result<GatewayRefund, GatewayError> {
        let url = format!("{}/v1/refunds", self.base_url);
        let body = RefundBody {
            payment_intent: intent_ref,
            amount: amount.cents(),
            reason,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        match response.status() {
            status if status.is_success() => {
                let refund: RefundResponse = response
                    .json()
                    .await
                    .map_err(|err| GatewayError::Request(err.to_string()))?;
                let status = refund
                    .status
                    .parse()
                    .map_err(|err: domain::UnknownRefundStatus| {
                        GatewayError::Request(err.to_string())
                    })?;
                Ok(GatewayRefund {
                    refund_id: refund.id,
                    status,
                })
            }
            status => Err(Self::error_from_status(status, response).await),
        }
    }
}
