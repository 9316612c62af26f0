//! Message codec and JSON-RPC message types.
//!
//! The transport moves raw [`Payload`](crate::socket::Payload)s. A
//! [`Codec`] turns them into structured messages and back; anything the
//! codec cannot decode is dropped before it reaches a listener.
//!
//! # Protocol Overview
//!
//! The default [`JsonRpcCodec`] speaks JSON-RPC 2.0:
//!
//! | Message Type | Shape |
//! |--------------|-------|
//! | `Request` | `{"jsonrpc":"2.0","id":1,"method":"m","params":...}` |
//! | `Notification` | `{"jsonrpc":"2.0","method":"m","params":...}` |
//! | `Response` | `{"jsonrpc":"2.0","id":1,"result":...}` or `"error":{...}` |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `codec` | `Codec` trait and the JSON-RPC codec |
//! | `message` | JSON-RPC message types |

// ============================================================================
// Submodules
// ============================================================================

/// Codec trait and JSON-RPC implementation.
pub mod codec;

/// JSON-RPC 2.0 message types.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use codec::{Codec, JsonRpcCodec};
pub use message::{RpcError, RpcId, RpcMessage, RpcNotification, RpcRequest, RpcResponse};
