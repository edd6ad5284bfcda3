//! Gateway callback verification and wire types.
//!
//! Every inbound callback carries an HMAC-SHA256 signature over the raw,
//! unparsed body. Verification failure rejects the callback before any row
//! is touched; retry authority stays with the sender.

use common::{OrderId, UserId};
use domain::Money;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex-encoded callback signature.
pub const SIGNATURE_HEADER: &str = "x-gateway-signature";

/// Errors raised while checking a callback signature.
#[derive(Debug, Error)]
pub enum SignatureError {
    /// The signature header was absent.
    #[error("missing signature header")]
    Missing,

    /// The signature header was not valid hex.
    #[error("malformed signature header")]
    Malformed,

    /// The signature does not match the body.
    #[error("signature mismatch")]
    Mismatch,
}

/// Verifies callback signatures against the shared webhook secret.
#[derive(Clone)]
pub struct CallbackVerifier {
    secret: Vec<u8>,
}

impl CallbackVerifier {
    /// Creates a verifier for the given shared secret.
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    /// Checks `signature` (hex) against the raw request body.
    pub fn verify(&self, body: &[u8], signature: &str) -> Result<(), SignatureError> {
        let digest = hex::decode(signature.trim()).map_err(|_| SignatureError::Malformed)?;
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|_| SignatureError::Mismatch)?;
        mac.update(body);
        mac.verify_slice(&digest)
            .map_err(|_| SignatureError::Mismatch)
    }

    /// Signs a body the way the gateway does. Used by tests and tooling.
    pub fn sign(&self, body: &[u8]) -> String {
        match HmacSha256::new_from_slice(&self.secret) {
            Ok(mut mac) => {
                mac.update(body);
                hex::encode(mac.finalize().into_bytes())
            }
            Err(_) => String::new(),
        }
    }
}

/// The kind of lifecycle event a callback announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallbackKind {
    /// The gateway confirmed the charge.
    #[serde(rename = "payment_intent.succeeded")]
    Succeeded,

    /// The gateway declined the charge.
    #[serde(rename = "payment_intent.payment_failed")]
    Failed,

    /// Any other event type; acknowledged and ignored.
    #[serde(other)]
    Other,
}

/// Correlation metadata the gateway echoes back from intent creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackMetadata {
    #[serde(default)]
    pub order_id: Option<OrderId>,
    #[serde(default)]
    pub user_id: Option<UserId>,
}

/// The intent object inside a callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackIntent {
    /// Gateway intent reference.
    pub id: String,
    pub amount: Money,
    #[serde(default)]
    pub metadata: CallbackMetadata,
    /// Failure description, present on declined payments.
    #[serde(default)]
    pub last_error: Option<String>,
}

/// A parsed gateway callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayCallback {
    #[serde(rename = "type")]
    pub kind: CallbackKind,
    pub data: CallbackIntent,
}

impl GatewayCallback {
    /// Parses a verified callback body.
    pub fn from_bytes(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// Builds a success callback. Used by tests and tooling.
    pub fn succeeded(
        intent_ref: impl Into<String>,
        amount: Money,
        order_id: OrderId,
        user_id: UserId,
    ) -> Self {
        Self {
            kind: CallbackKind::Succeeded,
            data: CallbackIntent {
                id: intent_ref.into(),
                amount,
                metadata: CallbackMetadata {
                    order_id: Some(order_id),
                    user_id: Some(user_id),
                },
                last_error: None,
            },
        }
    }

    /// Builds a failure callback. Used by tests and tooling.
    pub fn failed(
        intent_ref: impl Into<String>,
        amount: Money,
        order_id: OrderId,
        user_id: UserId,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            kind: CallbackKind::Failed,
            data: CallbackIntent {
                id: intent_ref.into(),
                amount,
                metadata: CallbackMetadata {
                    order_id: Some(order_id),
                    user_id: Some(user_id),
                },
                last_error: Some(reason.into()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify_roundtrip() {
        let verifier = CallbackVerifier::new("whsec_test");
        let body = br#"{"type":"payment_intent.succeeded"}"#;

        let signature = verifier.sign(body);
        assert!(verifier.verify(body, &signature).is_ok());
    }

    #[test]
    fn test_tampered_body_is_rejected() {
        let verifier = CallbackVerifier::new("whsec_test");
        let signature = verifier.sign(b"original body");

        assert!(matches!(
            verifier.verify(b"tampered body", &signature),
            Err(SignatureError::Mismatch)
        ));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let body = b"body";
        let signature = CallbackVerifier::new("whsec_one").sign(body);

        assert!(
            CallbackVerifier::new("whsec_two")
                .verify(body, &signature)
                .is_err()
        );
    }

    #[test]
    fn test_malformed_signature_is_rejected() {
        let verifier = CallbackVerifier::new("whsec_test");
        assert!(matches!(
            verifier.verify(b"body", "not-hex!"),
            Err(SignatureError::Malformed)
        ));
    }

    #[test]
    fn test_callback_parsing() {
        let order_id = OrderId::new();
        let body = serde_json::json!({
            "type": "payment_intent.succeeded",
            "data": {
                "id": "pi_0001",
                "amount": 2000,
                "metadata": { "orderId": order_id.to_string() }
            }
        });

        let callback = GatewayCallback::from_bytes(body.to_string().as_bytes()).unwrap();
        assert_eq!(callback.kind, CallbackKind::Succeeded);
        assert_eq!(callback.data.id, "pi_0001");
        assert_eq!(callback.data.metadata.order_id, Some(order_id));
        assert_eq!(callback.data.metadata.user_id, None);
    }

    #[test]
    fn test_unknown_event_type_parses_as_other() {
        let body = serde_json::json!({
            "type": "charge.dispute.created",
            "data": { "id": "pi_0001", "amount": 100 }
        });

        let callback = GatewayCallback::from_bytes(body.to_string().as_bytes()).unwrap();
        assert_eq!(callback.kind, CallbackKind::Other);
    }

    #[test]
    fn test_metadata_defaults_when_absent() {
        let body = serde_json::json!({
            "type": "payment_intent.payment_failed",
            "data": { "id": "pi_0002", "amount": 500, "lastError": "card declined" }
        });

        let callback = GatewayCallback::from_bytes(body.to_string().as_bytes()).unwrap();
        assert_eq!(callback.kind, CallbackKind::Failed);
        assert_eq!(callback.data.metadata, CallbackMetadata::default());
        assert_eq!(callback.data.last_error.as_deref(), Some("card declined"));
    }
}
