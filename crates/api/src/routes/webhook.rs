//! Gateway callback endpoint.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use broker::MessageBroker;
use payments::{GatewayCallback, PaymentGateway, SIGNATURE_HEADER};
use store::{OrderStore, PaymentStore};

use super::orders::AppState;
use crate::error::ApiError;

/// POST /payments/webhook — signed asynchronous gateway callback.
///
/// The signature is verified over the raw body before any parsing. On
/// verification failure the callback is rejected and nothing is mutated.
/// A verified callback is acknowledged regardless of internal processing
/// outcome; the outcome is expressed via the emitted lifecycle event, and
/// the gateway retries delivery on its own schedule.
#[tracing::instrument(skip(state, headers, body))]
pub async fn gateway<S, G, B>(
    State(state): State<Arc<AppState<S, G, B>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError>
where
    S: OrderStore + PaymentStore + 'static,
    G: PaymentGateway + 'static,
    B: MessageBroker + 'static,
{
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("missing signature header".to_string()))?;

    if let Err(err) = state.verifier.verify(&body, signature) {
        metrics::counter!("webhook_signature_failures_total").increment(1);
        tracing::warn!(error = %err, "webhook signature verification failed");
        return Err(ApiError::BadRequest("webhook error".to_string()));
    }

    let callback = GatewayCallback::from_bytes(&body)
        .map_err(|err| ApiError::BadRequest(format!("malformed callback body: {err}")))?;

    if let Err(err) = state.payments.handle_callback(callback).await {
        tracing::error!(error = %err, "error handling gateway callback");
    }

    Ok(Json(serde_json::json!({ "received": true })))
}
