//! Public transport handle.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;

use crate::config::TransportOptions;
use crate::error::{Error, Result};
use crate::identifiers::ListenerId;
use crate::protocol::{Codec, JsonRpcCodec};
use crate::socket::{Connector, Payload};

use super::builder::TransportBuilder;
use super::session::SessionSlot;
use super::state::{CloseReason, Listener, Phase, TransportState};
use super::supervisor::{Command, ConnectionSupervisor};

// ============================================================================
// TransportInner
// ============================================================================

/// State shared by all clones of one transport.
struct TransportInner<C: Codec> {
    address: Url,
    options: Arc<TransportOptions>,
    codec: Arc<C>,
    state: Arc<TransportState<C::Message>>,
    slot: Arc<SessionSlot>,
    /// Dropping the last sender tells the supervisor to close.
    commands: mpsc::UnboundedSender<Command>,
}

// ============================================================================
// Transport
// ============================================================================

/// Always-on duplex message channel.
///
/// Connects on construction and keeps reconnecting in the background.
/// Callers send with [`send`](Self::send) and observe the connection
/// through listeners.
///
/// # Thread Safety
///
/// `Transport` is `Send + Sync` and cheap to clone. When the last clone is
/// dropped the transport closes itself. A listener that captures a clone
/// keeps the transport alive until it is closed.
pub struct Transport<C: Codec = JsonRpcCodec> {
    inner: Arc<TransportInner<C>>,
}

impl<C: Codec> Clone for Transport<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Codec> fmt::Debug for Transport<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("address", &self.inner.address.as_str())
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Transport - Construction
// ============================================================================

impl Transport {
    /// Creates a builder for `address`.
    #[inline]
    #[must_use]
    pub fn builder(address: impl Into<String>) -> TransportBuilder {
        TransportBuilder::new(address)
    }

    /// Connects to `address` with the default WebSocket connector and
    /// JSON-RPC codec.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidAddress`] if `address` is not a URL
    /// - [`Error::Config`] if the scheme is not `ws`/`wss` or the options are invalid
    pub fn connect(address: &str, options: TransportOptions) -> Result<Self> {
        Self::builder(address).options(options).build()
    }
}

impl<C: Codec> Transport<C> {
    /// Spawns the supervisor and starts the first attempt.
    pub(crate) fn spawn(
        address: Url,
        options: TransportOptions,
        connector: Arc<dyn Connector>,
        codec: C,
    ) -> Self {
        let options = Arc::new(options);
        let codec = Arc::new(codec);
        let state = Arc::new(TransportState::new());
        let slot = Arc::new(SessionSlot::default());
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let mut supervisor = ConnectionSupervisor::new(
            address.clone(),
            Arc::clone(&options),
            connector,
            Arc::clone(&codec),
            Arc::clone(&state),
            Arc::clone(&slot),
            events_tx,
        );

        // First attempt happens before returning.
        supervisor.start();
        tokio::spawn(supervisor.run(commands_rx, events_rx));

        Self {
            inner: Arc::new(TransportInner {
                address,
                options,
                codec,
                state,
                slot,
                commands: commands_tx,
            }),
        }
    }
}

// ============================================================================
// Transport - Public API
// ============================================================================

impl<C: Codec> Transport<C> {
    /// Returns the target address.
    #[inline]
    #[must_use]
    pub fn address(&self) -> &Url {
        &self.inner.address
    }

    /// Returns the connection options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &TransportOptions {
        &self.inner.options
    }

    /// Returns `true` once the transport is closed. Never reverts.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.state.is_closed()
    }

    /// Returns the connection state machine's current phase.
    #[inline]
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.inner.state.phase()
    }

    /// Encodes `message` and hands it to the current socket.
    ///
    /// Does not wait for delivery; nothing is queued for later.
    ///
    /// # Errors
    ///
    /// - [`Error::TransportClosed`] if the transport is closed
    /// - [`Error::SendFailed`] if the socket is not open or rejects the frame
    /// - Codec errors if `message` cannot be encoded
    pub fn send(&self, message: &C::Message) -> Result<()> {
        if self.is_closed() {
            return Err(Error::TransportClosed);
        }

        let payload = self.inner.codec.encode(message)?;
        self.send_payload(payload)
    }

    /// Sends an already encoded payload.
    ///
    /// # Errors
    ///
    /// - [`Error::TransportClosed`] if the transport is closed
    /// - [`Error::SendFailed`] if there is no socket or it rejects the frame
    pub fn send_payload(&self, payload: Payload) -> Result<()> {
        if self.is_closed() {
            return Err(Error::TransportClosed);
        }

        let Some(session) = self.inner.slot.current() else {
            warn!(address = %self.inner.address, "Send without a socket");
            return Err(Error::send_failed("no socket"));
        };

        session.socket().send(payload).map_err(|e| {
            warn!(session = %session.id(), error = %e, "Send failed");
            Error::send_failed(e.to_string())
        })
    }

    /// Closes the transport.
    ///
    /// Marks it closed and emits `close` before touching the socket, then
    /// detaches the socket's callbacks and closes it. Calling again does
    /// nothing. Safe to call from inside a listener.
    pub fn close(&self) {
        if !self.inner.state.close(CloseReason::ClosedByCaller) {
            return;
        }

        debug!(address = %self.inner.address, "Transport closed by caller");
        self.inner.slot.teardown();

        // Supervisor may already be gone.
        let _ = self.inner.commands.send(Command::Shutdown);
    }

    /// Waits until the transport is closed.
    pub async fn wait_closed(&self) {
        let mut closed = self.inner.state.subscribe_closed();
        // Sender lives in the shared state, which outlives this borrow.
        let _ = closed.wait_for(|closed| *closed).await;
    }
}

// ============================================================================
// Transport - Listeners
// ============================================================================

impl<C: Codec> Transport<C> {
    /// Registers a listener for `open` (connection usable).
    pub fn on_open(&self, handler: impl Fn() + Send + Sync + 'static) -> ListenerId {
        self.inner
            .state
            .add_listener(Listener::Open(Arc::new(handler)))
    }

    /// Registers a listener for decoded inbound messages.
    ///
    /// Messages arriving while no message listener is registered are
    /// dropped.
    pub fn on_message(&self, handler: impl Fn(&C::Message) + Send + Sync + 'static) -> ListenerId {
        self.inner
            .state
            .add_listener(Listener::Message(Arc::new(handler)))
    }

    /// Registers a listener for `disconnected` (established connection lost,
    /// reconnection starting).
    pub fn on_disconnected(&self, handler: impl Fn() + Send + Sync + 'static) -> ListenerId {
        self.inner
            .state
            .add_listener(Listener::Disconnected(Arc::new(handler)))
    }

    /// Registers a listener for the terminal `close` event.
    pub fn on_close(
        &self,
        handler: impl Fn(CloseReason) + Send + Sync + 'static,
    ) -> ListenerId {
        self.inner
            .state
            .add_listener(Listener::Close(Arc::new(handler)))
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.state.remove_listener(id)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio_test::{assert_pending, assert_ready, task};

    use crate::socket::{ReadyState, Socket, SocketCallbacks};

    /// Connector whose sockets never report anything.
    struct SilentConnector;

    struct SilentSocket;

    impl Socket for SilentSocket {
        fn ready_state(&self) -> ReadyState {
            ReadyState::Connecting
        }

        fn send(&self, _payload: Payload) -> Result<()> {
            Err(Error::invalid_state(ReadyState::Connecting))
        }

        fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    impl Connector for SilentConnector {
        fn connect(
            &self,
            _address: &Url,
            _options: &TransportOptions,
            _callbacks: SocketCallbacks,
        ) -> Result<Arc<dyn Socket>> {
            Ok(Arc::new(SilentSocket))
        }
    }

    fn silent_transport() -> Transport {
        Transport::builder("ws://localhost:1/rpc")
            .connector(SilentConnector)
            .build()
            .expect("valid transport")
    }

    #[tokio::test]
    async fn test_first_attempt_starts_during_build() {
        let transport = silent_transport();
        assert_eq!(transport.phase(), Phase::Attempting { attempt: 1 });
        assert!(!transport.is_closed());
        transport.close();
    }

    #[tokio::test]
    async fn test_wait_closed_resolves_on_close() {
        let transport = silent_transport();
        let mut waiting = task::spawn(transport.wait_closed());

        assert_pending!(waiting.poll());

        transport.close();
        assert!(waiting.is_woken());
        assert_ready!(waiting.poll());
    }

    #[tokio::test]
    async fn test_wait_closed_after_close_is_ready() {
        let transport = silent_transport();
        transport.close();

        let mut waiting = task::spawn(transport.wait_closed());
        assert_ready!(waiting.poll());
    }

    #[tokio::test]
    async fn test_send_maps_socket_rejection() {
        let transport = silent_transport();

        let err = transport
            .send_payload(Payload::from("{}"))
            .expect_err("socket not open");
        assert!(matches!(err, Error::SendFailed { .. }));

        transport.close();
        let err = transport
            .send_payload(Payload::from("{}"))
            .expect_err("transport closed");
        assert!(err.is_closed());
    }

    #[tokio::test]
    async fn test_listener_added_after_close_never_fires() {
        let transport = silent_transport();
        transport.close();

        let id = transport.on_close(|_| panic!("close listener after close"));
        assert!(!transport.remove_listener(id));
    }

    #[tokio::test]
    async fn test_debug_shows_address_and_phase() {
        let transport = silent_transport();
        let debug = format!("{transport:?}");

        assert!(debug.contains("ws://localhost:1/rpc"));
        assert!(debug.contains("Attempting"));
        transport.close();
    }
}
