//! The wire envelope handed to the broker.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// A message bound for (or delivered from) a topic exchange.
///
/// The serialized body is the payload object itself; the event name travels
/// as the routing key, and emission timestamps live inside the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Hierarchical routing key, e.g. `payment.completed`.
    pub routing_key: String,
    /// Event-specific payload, keyed by the routing key.
    pub payload: serde_json::Value,
}

impl Envelope {
    /// Creates an envelope by serializing `payload`.
    pub fn new(
        routing_key: impl Into<String>,
        payload: &impl Serialize,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            routing_key: routing_key.into(),
            payload: serde_json::to_value(payload)?,
        })
    }

    /// Deserializes the payload into a typed event.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }

    /// Serializes the payload for the wire.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.payload)
    }

    /// Parses a delivered body back into an envelope.
    pub fn from_bytes(
        routing_key: impl Into<String>,
        bytes: &[u8],
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            routing_key: routing_key.into(),
            payload: serde_json::from_slice(bytes)?,
        })
    }
}
