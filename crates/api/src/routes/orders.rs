//! Order endpoints and shared application state.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use broker::MessageBroker;
use common::{OrderId, UserId};
use domain::{Address, Order, OrderItem, OrderStatus};
use orders::OrderService;
use payments::{CallbackVerifier, PaymentGateway, PaymentService};
use serde::Deserialize;
use store::{OrderStore, PaymentStore};

use crate::error::{ApiError, ApiResponse};

/// Shared application state accessible from all handlers.
pub struct AppState<S, G, B>
where
    S: OrderStore + PaymentStore,
    G: PaymentGateway,
    B: MessageBroker,
{
    pub orders: OrderService<S, B>,
    pub payments: PaymentService<S, G, B>,
    pub verifier: CallbackVerifier,
}

// -- Request types --

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub shipping_address: Address,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

pub(crate) fn parse_order_id(raw: &str) -> Result<OrderId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid order id: {raw}")))
}

fn parse_user_id(raw: &str) -> Result<UserId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid user id: {raw}")))
}

// -- Handlers --

/// POST /orders — place a new order.
#[tracing::instrument(skip(state, req))]
pub async fn create<S, G, B>(
    State(state): State<Arc<AppState<S, G, B>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Order>>), ApiError>
where
    S: OrderStore + PaymentStore + 'static,
    G: PaymentGateway + 'static,
    B: MessageBroker + 'static,
{
    let order = state
        .orders
        .create_order(req.user_id, req.items, req.shipping_address)
        .await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(order)))
}

/// GET /orders/{id} — load an order by ID.
#[tracing::instrument(skip(state))]
pub async fn get<S, G, B>(
    State(state): State<Arc<AppState<S, G, B>>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Order>>, ApiError>
where
    S: OrderStore + PaymentStore + 'static,
    G: PaymentGateway + 'static,
    B: MessageBroker + 'static,
{
    let order_id = parse_order_id(&id)?;
    let order = state
        .orders
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("order not found: {order_id}")))?;
    Ok(ApiResponse::ok(order))
}

/// GET /users/{user_id}/orders — list a user's orders.
#[tracing::instrument(skip(state))]
pub async fn list_for_user<S, G, B>(
    State(state): State<Arc<AppState<S, G, B>>>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<Order>>>, ApiError>
where
    S: OrderStore + PaymentStore + 'static,
    G: PaymentGateway + 'static,
    B: MessageBroker + 'static,
{
    let user_id = parse_user_id(&user_id)?;
    let orders = state.orders.orders_for_user(user_id).await?;
    Ok(ApiResponse::ok(orders))
}

/// POST /orders/{id}/status — administrative status update.
#[tracing::instrument(skip(state, req))]
pub async fn update_status<S, G, B>(
    State(state): State<Arc<AppState<S, G, B>>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<Order>>, ApiError>
where
    S: OrderStore + PaymentStore + 'static,
    G: PaymentGateway + 'static,
    B: MessageBroker + 'static,
{
    let order_id = parse_order_id(&id)?;
    let order = state.orders.update_status(order_id, req.status).await?;
    Ok(ApiResponse::ok(order))
}
