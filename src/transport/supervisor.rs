//! Connection supervisor.
//!
//! Owns the retry operation and is the only place socket events are acted
//! on. All session callbacks funnel into one task, so every decision below
//! runs to completion before the next event is looked at.
//!
//! # Close Policy
//!
//! | Close code | `was_connected` | Budget left | Outcome |
//! |------------|-----------------|-------------|---------|
//! | terminal | any | any | close (`ClosedByServer`) |
//! | other | `false` | yes | retry after backoff, silent |
//! | other | `false` | no | close (`RetriesExhausted`) |
//! | other | `true` | any | `disconnected`, restart with fresh budget |

// ============================================================================
// Imports
// ============================================================================

use std::future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::config::TransportOptions;
use crate::identifiers::SessionId;
use crate::protocol::Codec;
use crate::socket::{
    CloseEvent, Connector, Payload, SessionEvent, SocketCallbacks, SocketEvent, close_code,
};

use super::retry::RetryOperation;
use super::session::{SessionSlot, SocketSession};
use super::state::{CloseReason, Phase, TransportState};

// ============================================================================
// Command
// ============================================================================

/// Commands from transport handles.
#[derive(Debug)]
pub(crate) enum Command {
    /// Transport was closed by the caller; stop the loop.
    Shutdown,
}

// ============================================================================
// Decision
// ============================================================================

/// Outcome of a session close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decision {
    /// Try again after the delay.
    Retry(Duration),
    /// Established connection lost; start a fresh sequence.
    Restart,
    /// Close the transport for good.
    Terminate(CloseReason),
}

/// Applies the close policy. Consumes a retry when one is granted.
pub(crate) fn decide(
    code: u16,
    terminal_code: u16,
    was_connected: bool,
    operation: Option<&mut RetryOperation>,
) -> Decision {
    if code == terminal_code {
        return Decision::Terminate(CloseReason::ClosedByServer);
    }

    if was_connected {
        return Decision::Restart;
    }

    match operation.and_then(RetryOperation::retry) {
        Some(delay) => Decision::Retry(delay),
        None => Decision::Terminate(CloseReason::RetriesExhausted),
    }
}

// ============================================================================
// ConnectionSupervisor
// ============================================================================

/// Drives connection attempts for one transport.
pub(crate) struct ConnectionSupervisor<C: Codec> {
    address: Url,
    options: Arc<TransportOptions>,
    connector: Arc<dyn Connector>,
    codec: Arc<C>,
    state: Arc<TransportState<C::Message>>,
    slot: Arc<SessionSlot>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    operation: Option<RetryOperation>,
    backoff: Option<Instant>,
    next_session: u64,
}

impl<C: Codec> ConnectionSupervisor<C> {
    pub(crate) fn new(
        address: Url,
        options: Arc<TransportOptions>,
        connector: Arc<dyn Connector>,
        codec: Arc<C>,
        state: Arc<TransportState<C::Message>>,
        slot: Arc<SessionSlot>,
        events_tx: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            address,
            options,
            connector,
            codec,
            state,
            slot,
            events_tx,
            operation: None,
            backoff: None,
            next_session: 1,
        }
    }

    /// Begins a fresh attempt sequence with a full retry budget.
    pub(crate) fn start(&mut self) {
        if let Some(previous) = self.operation.as_mut() {
            previous.stop();
        }

        self.operation = Some(RetryOperation::new(self.options.retry.clone()));
        self.backoff = None;
        self.attempt();
    }

    /// Runs one connection attempt.
    fn attempt(&mut self) {
        if self.state.is_closed() {
            if let Some(operation) = self.operation.as_mut() {
                operation.stop();
            }
            return;
        }

        let attempt = self.operation.as_ref().map_or(1, RetryOperation::attempts);
        let id = SessionId::new(self.next_session);
        self.next_session += 1;

        debug!(session = %id, attempt, address = %self.address, "Connection attempt");
        self.state.set_phase(Phase::Attempting { attempt });

        let callbacks = SocketCallbacks::new(id, self.events_tx.clone());
        match self
            .connector
            .connect(&self.address, &self.options, callbacks.clone())
        {
            Ok(socket) => self.slot.replace(SocketSession::new(socket, callbacks)),
            Err(e) => {
                warn!(session = %id, error = %e, "Socket construction failed");
                let decision = decide(
                    close_code::ABNORMAL,
                    self.options.terminal_close_code,
                    false,
                    self.operation.as_mut(),
                );
                self.apply(decision);
            }
        }
    }

    /// Event loop; returns once the transport is closed.
    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        while !self.state.is_closed() {
            let deadline = self.backoff;

            tokio::select! {
                biased;

                command = commands.recv() => {
                    match command {
                        Some(Command::Shutdown) => {
                            debug!("Shutdown command received");
                        }

                        None => {
                            debug!("All transport handles dropped");
                            self.terminate(CloseReason::Dropped);
                        }
                    }
                }

                Some(event) = events.recv() => self.handle_event(event),

                () = backoff_elapsed(deadline) => {
                    self.backoff = None;
                    self.attempt();
                }
            }
        }

        if let Some(operation) = self.operation.as_mut() {
            operation.stop();
        }
        self.slot.teardown();

        debug!(address = %self.address, "Supervisor terminated");
    }

    fn handle_event(&mut self, SessionEvent { session, event }: SessionEvent) {
        if self.state.is_closed() {
            return;
        }

        let Some(current) = self.slot.get(session) else {
            trace!(%session, ?event, "Ignoring event from superseded session");
            return;
        };

        match event {
            SocketEvent::Open => self.on_open(&current),
            SocketEvent::Close(close) => self.on_close(&current, &close),
            SocketEvent::Error(e) => {
                // The close that follows drives recovery.
                warn!(%session, error = %e, "Socket error");
            }
            SocketEvent::Message(payload) => self.on_message(&payload),
        }
    }

    fn on_open(&mut self, session: &SocketSession) {
        session.mark_connected();
        self.state.set_phase(Phase::Connected);

        info!(session = %session.id(), address = %self.address, "Transport open");
        self.state.emit_open();
    }

    fn on_close(&mut self, session: &SocketSession, close: &CloseEvent) {
        debug!(
            session = %session.id(),
            code = close.code,
            reason = %close.reason,
            was_clean = close.was_clean,
            was_connected = session.was_connected(),
            "Socket closed"
        );

        // One close per session; later reports must not spend more budget.
        session.detach();

        let decision = decide(
            close.code,
            self.options.terminal_close_code,
            session.was_connected(),
            self.operation.as_mut(),
        );
        self.apply(decision);
    }

    fn on_message(&self, payload: &Payload) {
        let Some(message) = self.codec.decode(payload) else {
            trace!(len = payload.len(), "Dropping undecodable payload");
            return;
        };

        if self.state.message_listener_count() == 0 {
            debug!(len = payload.len(), "No message listeners, dropping message");
            return;
        }

        self.state.emit_message(&message);
    }

    fn apply(&mut self, decision: Decision) {
        match decision {
            Decision::Retry(delay) => {
                let attempt = self.operation.as_ref().map_or(1, RetryOperation::attempts);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "Scheduling retry");

                self.state.set_phase(Phase::Backoff { attempt });
                self.backoff = Some(Instant::now() + delay);
            }

            Decision::Restart => {
                if let Some(operation) = self.operation.as_mut() {
                    operation.stop();
                }

                warn!(address = %self.address, "Connection lost, reconnecting");
                self.state.set_phase(Phase::Restarting);
                self.state.emit_disconnected();
                self.start();
            }

            Decision::Terminate(reason) => self.terminate(reason),
        }
    }

    fn terminate(&mut self, reason: CloseReason) {
        if let Some(operation) = self.operation.as_mut() {
            operation.stop();
        }
        self.backoff = None;

        if self.state.close(reason) {
            info!(address = %self.address, %reason, "Transport closed");
        }
        self.slot.teardown();
    }
}

/// Resolves at `deadline`, or never when there is none.
async fn backoff_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => future::pending().await,
    }
}

// ============================================================================
// Tests
// ============================================================================
