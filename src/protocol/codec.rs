//! Codec trait and the JSON-RPC codec.

// ============================================================================
// Imports
// ============================================================================

use tracing::trace;

use crate::error::{Error, Result};
use crate::socket::Payload;

use super::RpcMessage;

// ============================================================================
// Codec
// ============================================================================

/// Converts between wire payloads and structured messages.
pub trait Codec: Send + Sync + 'static {
    /// Structured message type.
    type Message: Send + Sync + 'static;

    /// Serializes one outbound message.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be represented on the wire.
    fn encode(&self, message: &Self::Message) -> Result<Payload>;

    /// Decodes one inbound payload.
    ///
    /// Returns `None` for anything malformed.
    fn decode(&self, payload: &Payload) -> Option<Self::Message>;
}

// ============================================================================
// JsonRpcCodec
// ============================================================================

/// JSON-RPC 2.0 codec.
///
/// Encodes to text frames. Decodes text or binary frames holding a single
/// JSON object.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRpcCodec;

impl Codec for JsonRpcCodec {
    type Message = RpcMessage;

    fn encode(&self, message: &RpcMessage) -> Result<Payload> {
        if !message.is_valid() {
            return Err(Error::codec("message is not valid JSON-RPC 2.0"));
        }

        Ok(Payload::Text(serde_json::to_string(message)?))
    }

    fn decode(&self, payload: &Payload) -> Option<RpcMessage> {
        let parsed = match payload {
            Payload::Text(text) => serde_json::from_str::<RpcMessage>(text),
            Payload::Binary(bytes) => serde_json::from_slice::<RpcMessage>(bytes),
        };

        match parsed {
            Ok(message) if message.is_valid() => Some(message),
            Ok(_) => {
                trace!(len = payload.len(), "Payload is not valid JSON-RPC 2.0");
                None
            }
            Err(e) => {
                trace!(len = payload.len(), error = %e, "Payload failed to parse");
                None
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
