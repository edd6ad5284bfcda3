//! Payment lifecycle service.
//!
//! Opens idempotency-keyed intents against the external gateway, reconciles
//! the gateway's signed asynchronous callbacks against locally tracked
//! state, guards refunds, and emits `payment.*` lifecycle events.

pub mod error;
pub mod gateway;
pub mod http_gateway;
pub mod memory;
pub mod service;
pub mod webhook;

pub use error::PaymentServiceError;
pub use gateway::{GatewayError, GatewayRefund, Intent, IntentRequest, PaymentGateway};
pub use http_gateway::HttpGateway;
pub use memory::InMemoryGateway;
pub use service::PaymentService;
pub use webhook::{
    CallbackIntent, CallbackKind, CallbackMetadata, CallbackVerifier, GatewayCallback,
    SIGNATURE_HEADER, SignatureError,
};
