//! Socket collaborator interface.
//!
//! The transport never touches a network stream directly. It asks a
//! [`Connector`] for a new [`Socket`] on every attempt and hands it a set of
//! [`SocketCallbacks`]; the socket reports its lifecycle through them.
//!
//! # Event Model
//!
//! | Callback | Meaning |
//! |----------|---------|
//! | `open` | Handshake completed, socket usable |
//! | `message` | One inbound text or binary payload |
//! | `error` | Something failed; a `close` always follows |
//! | `close` | Socket finished, with close code and reason |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `callbacks` | Detachable callback set handed to each socket |
//! | `websocket` | `tokio-tungstenite` backed connector |

// ============================================================================
// Submodules
// ============================================================================

/// Detachable socket callbacks.
pub mod callbacks;

/// WebSocket connector built on `tokio-tungstenite`.
pub mod websocket;

// ============================================================================
// Re-exports
// ============================================================================

pub use callbacks::SocketCallbacks;
pub(crate) use callbacks::{SessionEvent, SocketEvent};
pub use websocket::WebSocketConnector;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use url::Url;

use crate::config::TransportOptions;
use crate::error::Result;

// ============================================================================
// Close Codes
// ============================================================================

/// Well-known close codes.
pub mod close_code {
    /// Normal closure.
    pub const NORMAL: u16 = 1000;

    /// No status code was present in the close frame.
    pub const NO_STATUS: u16 = 1005;

    /// Connection dropped without a close frame.
    pub const ABNORMAL: u16 = 1006;

    /// Server ended the session deliberately; never reconnect.
    pub const CLOSED_BY_SERVER: u16 = 4000;
}

// ============================================================================
// ReadyState
// ============================================================================

/// Lifecycle state of one socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadyState {
    /// Handshake in progress.
    Connecting,
    /// Handshake completed, sends allowed.
    Open,
    /// Close requested, waiting for the stream to finish.
    Closing,
    /// Stream finished.
    Closed,
}

impl ReadyState {
    /// Decodes a state stored as `u8`.
    #[inline]
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Open,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }

    /// Encodes the state as `u8`.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Connecting => 0,
            Self::Open => 1,
            Self::Closing => 2,
            Self::Closed => 3,
        }
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

// ============================================================================
// Payload
// ============================================================================

/// Raw wire payload of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
}

impl Payload {
    /// Returns the payload bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }

    /// Returns the payload length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Returns `true` if the payload is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(bytes)
    }
}

// ============================================================================
// CloseEvent
// ============================================================================

/// Details of a socket close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseEvent {
    /// Close code from the close frame, or 1006 for abnormal termination.
    pub code: u16,
    /// Close reason from the close frame.
    pub reason: String,
    /// `true` if the closing handshake completed.
    pub was_clean: bool,
}

impl CloseEvent {
    /// Creates a clean close event.
    #[inline]
    #[must_use]
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
            was_clean: true,
        }
    }

    /// Creates the event for a connection lost without a close frame.
    #[inline]
    #[must_use]
    pub fn abnormal() -> Self {
        Self {
            code: close_code::ABNORMAL,
            reason: String::new(),
            was_clean: false,
        }
    }
}

// ============================================================================
// Socket / Connector
// ============================================================================

/// One underlying socket connection.
///
/// Implementations must not block: `send` and `close` hand work to the
/// socket's own task and return.
pub trait Socket: Send + Sync {
    /// Returns the current ready state.
    fn ready_state(&self) -> ReadyState;

    /// Queues one payload for sending.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`](crate::Error::InvalidState) if the socket
    /// is not open.
    fn send(&self, payload: Payload) -> Result<()>;

    /// Requests the socket to close. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Implementation specific; the transport logs and ignores them.
    fn close(&self) -> Result<()>;
}

/// Factory for sockets, called once per connection attempt.
pub trait Connector: Send + Sync + 'static {
    /// Starts connecting to `address`.
    ///
    /// Returns immediately; progress is reported through `callbacks`.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot even be constructed (for example
    /// an invalid header). The transport treats this as a failed attempt.
    fn connect(
        &self,
        address: &Url,
        options: &TransportOptions,
        callbacks: SocketCallbacks,
    ) -> Result<Arc<dyn Socket>>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_state_u8_roundtrip() {
        for state in [
            ReadyState::Connecting,
            ReadyState::Open,
            ReadyState::Closing,
            ReadyState::Closed,
        ] {
            assert_eq!(ReadyState::from_u8(state.as_u8()), state);
        }
        assert_eq!(ReadyState::from_u8(200), ReadyState::Closed);
    }

    #[test]
    fn test_payload_bytes() {
        let text = Payload::from("abc");
        let binary = Payload::from(vec![1, 2]);
        assert_eq!(text.as_bytes(), b"abc");
        assert_eq!(binary.len(), 2);
        assert!(Payload::from(String::new()).is_empty());
    }

    #[test]
    fn test_abnormal_close_event() {
        let event = CloseEvent::abnormal();
        assert_eq!(event.code, close_code::ABNORMAL);
        assert!(!event.was_clean);
        assert!(CloseEvent::new(close_code::NORMAL, "bye").was_clean);
    }
}
