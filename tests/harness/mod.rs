//! Shared helpers for transport integration tests.
//!
//! [`MockConnector`] hands every socket it creates to the test, which then
//! drives the socket's callbacks by hand.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use resilient_ws::{
    CloseEvent, CloseReason, Connector, Error, Payload, ReadyState, Result, RpcMessage, Socket,
    SocketCallbacks, Transport, TransportOptions,
};
use tokio::sync::mpsc;
use url::Url;

// ============================================================================
// MockSocket
// ============================================================================

/// Socket that records what the transport does with it.
#[derive(Debug)]
pub struct MockSocket {
    state: Mutex<ReadyState>,
    sent: Mutex<Vec<Payload>>,
    closes: AtomicUsize,
}

impl MockSocket {
    fn new() -> Self {
        Self {
            state: Mutex::new(ReadyState::Connecting),
            sent: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
        }
    }

    pub fn set_state(&self, state: ReadyState) {
        *self.state.lock() = state;
    }

    pub fn sent(&self) -> Vec<Payload> {
        self.sent.lock().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Socket for MockSocket {
    fn ready_state(&self) -> ReadyState {
        *self.state.lock()
    }

    fn send(&self, payload: Payload) -> Result<()> {
        let state = self.ready_state();
        if state != ReadyState::Open {
            return Err(Error::invalid_state(state));
        }
        self.sent.lock().push(payload);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.set_state(ReadyState::Closed);
        Ok(())
    }
}

// ============================================================================
// MockSession
// ============================================================================

/// One connection attempt as seen by the test.
#[derive(Debug, Clone)]
pub struct MockSession {
    pub callbacks: SocketCallbacks,
    pub socket: Arc<MockSocket>,
}

impl MockSession {
    /// Completes the handshake.
    pub fn open(&self) {
        self.socket.set_state(ReadyState::Open);
        self.callbacks.open();
    }

    /// Fails without a close frame (code 1006).
    pub fn fail(&self) {
        self.socket.set_state(ReadyState::Closed);
        self.callbacks.error(Error::connection("connection refused"));
        self.callbacks.close(CloseEvent::abnormal());
    }

    /// Closes with a close frame.
    pub fn close_with(&self, code: u16) {
        self.socket.set_state(ReadyState::Closed);
        self.callbacks.close(CloseEvent::new(code, "bye"));
    }

    /// Delivers an inbound text frame.
    pub fn receive(&self, text: &str) {
        self.callbacks.message(Payload::from(text));
    }
}

// ============================================================================
// MockConnector
// ============================================================================

/// Connector that never touches the network.
#[derive(Clone)]
pub struct MockConnector {
    sessions: mpsc::UnboundedSender<MockSession>,
    attempts: Arc<AtomicUsize>,
}

impl Connector for MockConnector {
    fn connect(
        &self,
        _address: &Url,
        _options: &TransportOptions,
        callbacks: SocketCallbacks,
    ) -> Result<Arc<dyn Socket>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let socket = Arc::new(MockSocket::new());
        let _ = self.sessions.send(MockSession {
            callbacks,
            socket: Arc::clone(&socket),
        });
        Ok(socket)
    }
}

/// Test side of a [`MockConnector`].
pub struct Sessions {
    rx: mpsc::UnboundedReceiver<MockSession>,
    attempts: Arc<AtomicUsize>,
}

impl Sessions {
    /// Waits for the next connection attempt.
    pub async fn next(&mut self) -> MockSession {
        self.rx.recv().await.expect("connector dropped")
    }

    /// Returns an attempt that already happened, if any.
    pub fn try_next(&mut self) -> Option<MockSession> {
        self.rx.try_recv().ok()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

pub fn mock_connector() -> (MockConnector, Sessions) {
    let (tx, rx) = mpsc::unbounded_channel();
    let attempts = Arc::new(AtomicUsize::new(0));

    (
        MockConnector {
            sessions: tx,
            attempts: Arc::clone(&attempts),
        },
        Sessions { rx, attempts },
    )
}

// ============================================================================
// Recorder
// ============================================================================

/// One emitted transport event.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Open,
    Message(RpcMessage),
    Disconnected,
    Close(CloseReason),
}

/// Collects every event a transport emits, in order.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    pub fn attach(transport: &Transport) -> Self {
        let recorder = Self::default();

        let sink = recorder.clone();
        transport.on_open(move || sink.push(Event::Open));
        let sink = recorder.clone();
        transport.on_message(move |message| sink.push(Event::Message(message.clone())));
        let sink = recorder.clone();
        transport.on_disconnected(move || sink.push(Event::Disconnected));
        let sink = recorder.clone();
        transport.on_close(move |reason| sink.push(Event::Close(reason)));

        recorder
    }

    fn push(&self, event: Event) {
        self.events.lock().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn count(&self, wanted: &Event) -> usize {
        self.events.lock().iter().filter(|e| *e == wanted).count()
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Builds a transport on a mock connector.
pub fn mock_transport(options: TransportOptions) -> (Transport, Sessions) {
    let (connector, sessions) = mock_connector();
    let transport = Transport::builder("ws://mock.invalid/rpc")
        .options(options)
        .connector(connector)
        .build()
        .expect("valid transport");
    (transport, sessions)
}

/// Lets the supervisor task drain its queue without moving the clock.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Opt-in log output: `RUST_LOG=resilient_ws=trace cargo test`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
