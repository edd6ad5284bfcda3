//! API error types with HTTP response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use orders::OrderServiceError;
use payments::PaymentServiceError;
use serde::Serialize;
use store::StoreError;

/// Standard response envelope: `{success, data | error, timestamp}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: String,
}

impl<T: Serialize> ApiResponse<T> {
    /// Wraps a successful payload.
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now().to_rfc3339(),
        })
    }
}

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Resource not found.
    NotFound(String),
    /// Order service error.
    Order(OrderServiceError),
    /// Payment service error.
    Payment(PaymentServiceError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Order(err) => order_error_to_response(err),
            ApiError::Payment(err) => payment_error_to_response(err),
        };

        if status.is_server_error() {
            tracing::error!(error = %message, "internal server error");
        }

        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(message),
            timestamp: Utc::now().to_rfc3339(),
        };
        (status, Json(body)).into_response()
    }
}

fn order_error_to_response(err: OrderServiceError) -> (StatusCode, String) {
    match &err {
        OrderServiceError::Invalid(inner) => match inner {
            domain::OrderError::InvalidTransition { .. } => {
                (StatusCode::CONFLICT, err.to_string())
            }
            _ => (StatusCode::BAD_REQUEST, err.to_string()),
        },
        OrderServiceError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        OrderServiceError::Store(_) | OrderServiceError::EventPublish { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

fn payment_error_to_response(err: PaymentServiceError) -> (StatusCode, String) {
    match &err {
        PaymentServiceError::CreationFailed(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        PaymentServiceError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        PaymentServiceError::RefundNotAllowed { .. }
        | PaymentServiceError::InvalidRefundAmount(_)
        | PaymentServiceError::RefundExceedsPayment { .. } => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        PaymentServiceError::Store(StoreError::DuplicatePayment(_)) => {
            (StatusCode::CONFLICT, err.to_string())
        }
        PaymentServiceError::Gateway(_) => (StatusCode::BAD_GATEWAY, err.to_string()),
        PaymentServiceError::Store(_) | PaymentServiceError::EventPublish { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl From<OrderServiceError> for ApiError {
    fn from(err: OrderServiceError) -> Self {
        ApiError::Order(err)
    }
}

impl From<PaymentServiceError> for ApiError {
    fn from(err: PaymentServiceError) -> Self {
        ApiError::Payment(err)
    }
}
