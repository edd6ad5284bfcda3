//! Payment and refund endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use broker::MessageBroker;
use common::{OrderId, PaymentId, UserId};
use domain::{Money, Payment, Refund};
use payments::PaymentGateway;
use serde::{Deserialize, Serialize};
use store::{OrderStore, PaymentStore};

use super::orders::{AppState, parse_order_id};
use crate::error::{ApiError, ApiResponse};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub amount: Money,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCreatedResponse {
    pub payment: Payment,
    /// Secret the client hands to the gateway to confirm the charge.
    pub client_secret: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    pub amount: Money,
    pub reason: String,
}

fn parse_payment_id(raw: &str) -> Result<PaymentId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid payment id: {raw}")))
}

/// POST /payments — open a payment intent for an order.
#[tracing::instrument(skip(state, req))]
pub async fn create<S, G, B>(
    State(state): State<Arc<AppState<S, G, B>>>,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PaymentCreatedResponse>>), ApiError>
where
    S: OrderStore + PaymentStore + 'static,
    G: PaymentGateway + 'static,
    B: MessageBroker + 'static,
{
    let currency = req.currency.as_deref().unwrap_or("usd");
    let (payment, client_secret) = state
        .payments
        .create_payment(req.order_id, req.user_id, req.amount, currency)
        .await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(PaymentCreatedResponse {
            payment,
            client_secret,
        }),
    ))
}

/// GET /payments/{id} — load a payment by ID.
#[tracing::instrument(skip(state))]
pub async fn get<S, G, B>(
    State(state): State<Arc<AppState<S, G, B>>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Payment>>, ApiError>
where
    S: OrderStore + PaymentStore + 'static,
    G: PaymentGateway + 'static,
    B: MessageBroker + 'static,
{
    let payment_id = parse_payment_id(&id)?;
    let payment = state
        .payments
        .get_payment(payment_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("payment not found: {payment_id}")))?;
    Ok(ApiResponse::ok(payment))
}

/// GET /orders/{order_id}/payment — load the payment belonging to an order.
#[tracing::instrument(skip(state))]
pub async fn for_order<S, G, B>(
    State(state): State<Arc<AppState<S, G, B>>>,
    Path(order_id): Path<String>,
) -> Result<Json<ApiResponse<Payment>>, ApiError>
where
    S: OrderStore + PaymentStore + 'static,
    G: PaymentGateway + 'static,
    B: MessageBroker + 'static,
{
    let order_id = parse_order_id(&order_id)?;
    let payment = state
        .payments
        .payment_for_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("payment not found for order: {order_id}")))?;
    Ok(ApiResponse::ok(payment))
}

/// POST /payments/{id}/refund — refund part or all of a completed payment.
#[tracing::instrument(skip(state, req))]
pub async fn refund<S, G, B>(
    State(state): State<Arc<AppState<S, G, B>>>,
    Path(id): Path<String>,
    Json(req): Json<RefundRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Refund>>), ApiError>
where
    S: OrderStore + PaymentStore + 'static,
    G: PaymentGateway + 'static,
    B: MessageBroker + 'static,
{
    let payment_id = parse_payment_id(&id)?;
    let refund = state
        .payments
        .create_refund(payment_id, req.amount, &req.reason)
        .await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(refund)))
}
