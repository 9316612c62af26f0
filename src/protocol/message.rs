//! JSON-RPC 2.0 message types.
//!
//! A single [`RpcMessage`] covers the three shapes seen on the wire. The
//! variant is picked by which fields are present.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Protocol version carried in every message.
pub const JSONRPC_VERSION: &str = "2.0";

// ============================================================================
// RpcId
// ============================================================================

/// Request identifier, a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    /// Numeric id.
    Number(i64),
    /// String id.
    String(String),
}

impl fmt::Display for RpcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for RpcId {
    fn from(id: i64) -> Self {
        Self::Number(id)
    }
}

impl From<i32> for RpcId {
    fn from(id: i32) -> Self {
        Self::Number(i64::from(id))
    }
}

impl From<&str> for RpcId {
    fn from(id: &str) -> Self {
        Self::String(id.to_owned())
    }
}

impl From<String> for RpcId {
    fn from(id: String) -> Self {
        Self::String(id)
    }
}

// ============================================================================
// RpcRequest
// ============================================================================

/// A method call expecting a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Protocol version.
    pub jsonrpc: String,

    /// Correlation id echoed by the response.
    pub id: RpcId,

    /// Method name.
    pub method: String,

    /// Method parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

// ============================================================================
// RpcNotification
// ============================================================================

/// A method call without an id; never answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcNotification {
    /// Protocol version.
    pub jsonrpc: String,

    /// Method name.
    pub method: String,

    /// Method parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

// ============================================================================
// RpcResponse
// ============================================================================

/// Answer to a request.
///
/// Exactly one of `result` and `error` is present. A `null` result counts
/// as present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Protocol version.
    pub jsonrpc: String,

    /// Id of the request; `null` when the request id could not be read.
    pub id: Option<RpcId>,

    /// Result data (if success).
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<Value>,

    /// Error object (if error).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    /// Returns `true` if this is a success response.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_some() && self.error.is_none()
    }

    /// Returns `true` if this is an error response.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Extracts the result value, returning error if response was error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rpc`] carrying the remote error code and message.
    pub fn into_result(self) -> Result<Value> {
        match self.error {
            Some(error) => Err(Error::rpc(error.code, error.message)),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// Keeps an explicit `null` as `Some(Value::Null)`.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

// ============================================================================
// RpcError
// ============================================================================

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    /// Error code.
    pub code: i64,

    /// Short description.
    pub message: String,

    /// Additional data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// Invalid JSON was received.
    pub const PARSE_ERROR: i64 = -32700;
    /// The JSON sent is not a valid request object.
    pub const INVALID_REQUEST: i64 = -32600;
    /// The method does not exist.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Invalid method parameters.
    pub const INVALID_PARAMS: i64 = -32602;
    /// Internal error.
    pub const INTERNAL_ERROR: i64 = -32603;

    /// Creates an error object without data.
    #[inline]
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Creates a "method not found" error.
    #[inline]
    #[must_use]
    pub fn method_not_found(method: &str) -> Self {
        Self::new(Self::METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    /// Attaches additional data.
    #[inline]
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

// ============================================================================
// RpcMessage
// ============================================================================

/// Any JSON-RPC 2.0 message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcMessage {
    /// Method call with id.
    Request(RpcRequest),
    /// Method call without id.
    Notification(RpcNotification),
    /// Answer to a request.
    Response(RpcResponse),
}

impl RpcMessage {
    /// Creates a request.
    #[must_use]
    pub fn request(id: impl Into<RpcId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self::Request(RpcRequest {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id: id.into(),
            method: method.into(),
            params,
        })
    }

    /// Creates a notification.
    #[must_use]
    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self::Notification(RpcNotification {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            method: method.into(),
            params,
        })
    }

    /// Creates a success response.
    #[must_use]
    pub fn success(id: impl Into<RpcId>, result: Value) -> Self {
        Self::Response(RpcResponse {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id: Some(id.into()),
            result: Some(result),
            error: None,
        })
    }

    /// Creates an error response.
    #[must_use]
    pub fn failure(id: Option<RpcId>, error: RpcError) -> Self {
        Self::Response(RpcResponse {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id,
            result: None,
            error: Some(error),
        })
    }

    /// Returns the method name of requests and notifications.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request(request) => Some(&request.method),
            Self::Notification(notification) => Some(&notification.method),
            Self::Response(_) => None,
        }
    }

    /// Returns the id of requests and responses.
    #[must_use]
    pub fn id(&self) -> Option<&RpcId> {
        match self {
            Self::Request(request) => Some(&request.id),
            Self::Notification(_) => None,
            Self::Response(response) => response.id.as_ref(),
        }
    }

    /// Returns `true` if the message is well formed JSON-RPC 2.0.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Request(request) => request.jsonrpc == JSONRPC_VERSION,
            Self::Notification(notification) => notification.jsonrpc == JSONRPC_VERSION,
            Self::Response(response) => {
                response.jsonrpc == JSONRPC_VERSION
                    && response.result.is_some() != response.error.is_some()
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let message = RpcMessage::request(1, "session.open", Some(json!({"user": "a"})));
        let json = serde_json::to_value(&message).expect("serialize");

        assert_eq!(
            json,
            json!({"jsonrpc": "2.0", "id": 1, "method": "session.open", "params": {"user": "a"}})
        );
    }

    #[test]
    fn test_notification_omits_id_and_params() {
        let message = RpcMessage::notification("ping", None);
        let json = serde_json::to_string(&message).expect("serialize");
        assert_eq!(json, r#"{"jsonrpc":"2.0","method":"ping"}"#);
    }

    #[test]
    fn test_parse_picks_variant_by_fields() {
        let request: RpcMessage =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":"a","method":"m"}"#).expect("parse");
        assert!(matches!(request, RpcMessage::Request(_)));
        assert_eq!(request.id(), Some(&RpcId::from("a")));

        let notification: RpcMessage =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"m","params":[1]}"#).expect("parse");
        assert!(matches!(notification, RpcMessage::Notification(_)));
        assert_eq!(notification.method(), Some("m"));
        assert!(notification.id().is_none());

        let response: RpcMessage =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":7,"result":{"ok":true}}"#).expect("parse");
        assert!(matches!(response, RpcMessage::Response(ref r) if r.is_success()));
    }

    #[test]
    fn test_null_result_is_present() {
        let message: RpcMessage =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":null}"#).expect("parse");
        assert!(message.is_valid());
    }

    #[test]
    fn test_response_without_result_or_error_is_invalid() {
        let message: RpcMessage =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1}"#).expect("parse");
        assert!(!message.is_valid());
    }

    #[test]
    fn test_wrong_version_is_invalid() {
        let message: RpcMessage =
            serde_json::from_str(r#"{"jsonrpc":"1.0","method":"m"}"#).expect("parse");
        assert!(!message.is_valid());
    }

    #[test]
    fn test_into_result_success() {
        let response = RpcResponse {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id: Some(RpcId::from(1)),
            result: Some(json!({"value": 42})),
            error: None,
        };
        let value = response.into_result().expect("should succeed");
        assert_eq!(value.get("value").and_then(Value::as_u64), Some(42));
    }

    #[test]
    fn test_into_result_error() {
        let RpcMessage::Response(response) =
            RpcMessage::failure(Some(RpcId::from(2)), RpcError::method_not_found("nope"))
        else {
            panic!("expected response");
        };

        assert!(response.is_error());
        let err = response.into_result().expect_err("should fail");
        assert!(matches!(err, Error::Rpc { code: RpcError::METHOD_NOT_FOUND, .. }));
    }
}
