//! Resilient WebSocket transport.
//!
//! A duplex message channel that stays up across socket failures. Callers
//! send structured messages and receive decoded ones through listeners,
//! while a background supervisor reconnects with exponential backoff.
//!
//! # Architecture
//!
//! - **Transport**: public handle; send, close, register listeners
//! - **Supervisor**: single task owning the retry budget and every reconnect decision
//! - **Connector**: pluggable socket factory (WebSocket by default)
//! - **Codec**: pluggable message format (JSON-RPC 2.0 by default)
//!
//! Key rules:
//!
//! - Attempts that never open consume a bounded retry budget
//! - An established connection that drops restarts with a fresh budget
//! - The terminal close code (4000 by default) closes the transport for good
//! - `close` is emitted exactly once; nothing is emitted after it
//!
//! # Quick Start
//!
//! ```no_run
//! use resilient_ws::{Result, RpcMessage, Transport, TransportOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let transport = Transport::connect("ws://localhost:9000/rpc", TransportOptions::default())?;
//!
//!     let sender = transport.clone();
//!     transport.on_open(move || {
//!         let _ = sender.send(&RpcMessage::notification("hello", None));
//!     });
//!     transport.on_message(|message| println!("received {message:?}"));
//!     transport.on_close(|reason| println!("closed: {reason}"));
//!
//!     transport.wait_closed().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Options and retry policy |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Codec trait and JSON-RPC messages |
//! | [`socket`] | Socket abstraction and WebSocket connector |
//! | [`transport`] | Transport handle and reconnection |

// ============================================================================
// Modules
// ============================================================================

/// Transport options and retry policy.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for sessions and listeners.
pub mod identifiers;

/// Message codecs.
///
/// Defines the [`Codec`] seam and the default JSON-RPC 2.0 codec.
pub mod protocol;

/// Socket abstraction.
///
/// The [`Socket`] and [`Connector`] traits plus the default WebSocket
/// implementation.
pub mod socket;

/// Resilient transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Transport types
pub use transport::{
    CloseHandler, CloseReason, LifecycleHandler, MessageHandler, Phase, Transport,
    TransportBuilder,
};

// Configuration types
pub use config::{ClientConfig, RequestOptions, RetryPolicy, TransportOptions};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ListenerId, SessionId};

// Protocol types
pub use protocol::{
    Codec, JsonRpcCodec, RpcError, RpcId, RpcMessage, RpcNotification, RpcRequest, RpcResponse,
};

// Socket types
pub use socket::{
    CloseEvent, Connector, Payload, ReadyState, Socket, SocketCallbacks, WebSocketConnector,
    close_code,
};
