//! WebSocket connector built on `tokio-tungstenite`.
//!
//! Each [`Connector::connect`] call spawns one tokio task that owns the
//! stream for the lifetime of that socket:
//!
//! - Performs the handshake (bounded by `connectTimeout` if set)
//! - Forwards text and binary frames to the `message` callback
//! - Writes queued outbound frames
//! - Reports `close` exactly once when the stream ends
//!
//! The returned handle only holds the ready state and a queue into that task,
//! so `send` and `close` never block.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::{ORIGIN, SEC_WEBSOCKET_PROTOCOL};
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, WebSocketConfig};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async_with_config};
use tracing::{debug, trace, warn};
use url::Url;

use crate::config::{ClientConfig, TransportOptions};
use crate::error::{Error, Result};

use super::{CloseEvent, Connector, Payload, ReadyState, Socket, SocketCallbacks, close_code};

// ============================================================================
// Types
// ============================================================================

type ClientStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Work queued for the socket task.
enum Outbound {
    /// Write one frame.
    Frame(Message),
    /// Start the closing handshake.
    Close,
}

// ============================================================================
// WebSocketConnector
// ============================================================================

/// Default [`Connector`] opening `ws://` connections with `tokio-tungstenite`.
///
/// Must be used from within a Tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    /// Creates a new connector.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Connector for WebSocketConnector {
    fn connect(
        &self,
        address: &Url,
        options: &TransportOptions,
        callbacks: SocketCallbacks,
    ) -> Result<Arc<dyn Socket>> {
        let request = build_request(address, options)?;
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let state = Arc::new(AtomicU8::new(ReadyState::Connecting.as_u8()));

        let task = SessionTask {
            disable_nagle: options.client_config.disable_nagle,
            connect_timeout: options.request_options.connect_timeout,
            state: Arc::clone(&state),
            outbound_rx,
            callbacks,
        };

        debug!(session = %task.callbacks.session(), %address, "Opening WebSocket");
        tokio::spawn(task.run(request, websocket_config(&options.client_config)));

        Ok(Arc::new(WebSocketHandle {
            state,
            outbound: outbound_tx,
        }))
    }
}

// ============================================================================
// WebSocketHandle
// ============================================================================

/// Caller side of one WebSocket.
struct WebSocketHandle {
    state: Arc<AtomicU8>,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl Socket for WebSocketHandle {
    fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn send(&self, payload: Payload) -> Result<()> {
        let state = self.ready_state();
        if state != ReadyState::Open {
            return Err(Error::invalid_state(state));
        }

        let message = match payload {
            Payload::Text(text) => Message::Text(text.into()),
            Payload::Binary(bytes) => Message::Binary(bytes.into()),
        };

        self.outbound
            .send(Outbound::Frame(message))
            .map_err(|_| Error::invalid_state(ReadyState::Closed))
    }

    fn close(&self) -> Result<()> {
        if matches!(self.ready_state(), ReadyState::Closing | ReadyState::Closed) {
            return Ok(());
        }

        self.state
            .store(ReadyState::Closing.as_u8(), Ordering::Release);

        // Task already gone means the stream is finished.
        let _ = self.outbound.send(Outbound::Close);
        Ok(())
    }
}

// ============================================================================
// SessionTask
// ============================================================================

/// Task owning one WebSocket stream.
struct SessionTask {
    disable_nagle: bool,
    connect_timeout: Option<Duration>,
    state: Arc<AtomicU8>,
    outbound_rx: mpsc::UnboundedReceiver<Outbound>,
    callbacks: SocketCallbacks,
}

impl SessionTask {
    async fn run(mut self, request: Request, config: WebSocketConfig) {
        let handshake = Self::handshake(
            request,
            config,
            self.disable_nagle,
            self.connect_timeout,
        );

        let connected = tokio::select! {
            result = handshake => result,
            () = Self::close_requested(&mut self.outbound_rx) => {
                debug!(session = %self.callbacks.session(), "Close requested during handshake");
                self.finish(CloseEvent::abnormal());
                return;
            }
        };

        let stream = match connected {
            Ok(stream) => stream,
            Err(e) => {
                debug!(session = %self.callbacks.session(), error = %e, "WebSocket handshake failed");
                self.callbacks.error(e);
                self.finish(CloseEvent::abnormal());
                return;
            }
        };

        let opened = self
            .state
            .compare_exchange(
                ReadyState::Connecting.as_u8(),
                ReadyState::Open.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();

        if opened {
            debug!(session = %self.callbacks.session(), "WebSocket open");
            self.callbacks.open();
        }

        let close_event = self.pump(stream).await;
        self.finish(close_event);
    }

    /// Connects and upgrades, honoring the optional timeout.
    async fn handshake(
        request: Request,
        config: WebSocketConfig,
        disable_nagle: bool,
        connect_timeout: Option<Duration>,
    ) -> Result<ClientStream> {
        let connecting = connect_async_with_config(request, Some(config), disable_nagle);

        let (stream, _response) = match connect_timeout {
            Some(limit) => timeout(limit, connecting)
                .await
                .map_err(|_| Error::connection_timeout(limit.as_millis() as u64))??,
            None => connecting.await?,
        };

        Ok(stream)
    }

    /// Resolves once a close is queued or every handle is dropped.
    async fn close_requested(outbound_rx: &mut mpsc::UnboundedReceiver<Outbound>) {
        while let Some(command) = outbound_rx.recv().await {
            if matches!(command, Outbound::Close) {
                return;
            }
        }
    }

    /// Moves frames in both directions until the stream ends.
    async fn pump(&mut self, stream: ClientStream) -> CloseEvent {
        let (mut ws_write, mut ws_read) = stream.split();
        let mut received: Option<CloseEvent> = None;
        let mut outbound_open = true;

        loop {
            tokio::select! {
                frame = ws_read.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            self.callbacks.message(Payload::Text(text.as_str().to_owned()));
                        }

                        Some(Ok(Message::Binary(bytes))) => {
                            self.callbacks.message(Payload::Binary(bytes.to_vec()));
                        }

                        Some(Ok(Message::Close(frame))) => {
                            self.state.store(ReadyState::Closing.as_u8(), Ordering::Release);
                            received = Some(match frame {
                                Some(frame) => CloseEvent::new(u16::from(frame.code), frame.reason.as_str()),
                                None => CloseEvent::new(close_code::NO_STATUS, ""),
                            });
                            trace!(session = %self.callbacks.session(), ?received, "Close frame received");
                        }

                        Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => break,

                        Some(Err(e)) => {
                            warn!(session = %self.callbacks.session(), error = %e, "WebSocket read failed");
                            self.callbacks.error(Error::from(e));
                            return CloseEvent::abnormal();
                        }

                        // Ping, Pong, raw frames
                        Some(Ok(_)) => {}
                    }
                }

                command = self.outbound_rx.recv(), if outbound_open => {
                    match command {
                        Some(Outbound::Frame(message)) => {
                            if let Err(e) = ws_write.send(message).await {
                                warn!(session = %self.callbacks.session(), error = %e, "WebSocket write failed");
                                self.callbacks.error(Error::from(e));
                                return CloseEvent::abnormal();
                            }
                        }

                        Some(Outbound::Close) | None => {
                            outbound_open = false;
                            self.state.store(ReadyState::Closing.as_u8(), Ordering::Release);

                            let frame = CloseFrame {
                                code: CloseCode::Normal,
                                reason: "".into(),
                            };
                            if let Err(e) = ws_write.send(Message::Close(Some(frame))).await {
                                debug!(session = %self.callbacks.session(), error = %e, "Close frame not sent");
                                break;
                            }
                        }
                    }
                }
            }
        }

        received.unwrap_or_else(CloseEvent::abnormal)
    }

    fn finish(&self, event: CloseEvent) {
        self.state
            .store(ReadyState::Closed.as_u8(), Ordering::Release);
        debug!(session = %self.callbacks.session(), code = event.code, "WebSocket closed");
        self.callbacks.close(event);
    }
}

// ============================================================================
// Handshake Helpers
// ============================================================================

/// Builds the client handshake request with origin, protocol and headers.
///
/// # Errors
///
/// - [`Error::WebSocket`] if the address is not a valid request URI
/// - [`Error::Config`] if a header name or value is invalid
pub fn build_request(address: &Url, options: &TransportOptions) -> Result<Request> {
    let mut request = address.as_str().into_client_request()?;
    let headers = request.headers_mut();

    if let Some(origin) = &options.origin {
        headers.insert(ORIGIN, header_value(origin)?);
    }

    if let Some(protocol) = &options.protocol {
        headers.insert(SEC_WEBSOCKET_PROTOCOL, header_value(protocol)?);
    }

    for (name, value) in &options.headers {
        let header = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::config(format!("invalid header name {name:?}: {e}")))?;
        headers.insert(header, header_value(value)?);
    }

    Ok(request)
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| Error::config(format!("invalid header value {value:?}: {e}")))
}

fn websocket_config(client: &ClientConfig) -> WebSocketConfig {
    let mut config = WebSocketConfig::default();
    if client.max_message_size.is_some() {
        config.max_message_size = client.max_message_size;
    }
    if client.max_frame_size.is_some() {
        config.max_frame_size = client.max_frame_size;
    }
    config
}

// ============================================================================
// Tests
// ============================================================================
