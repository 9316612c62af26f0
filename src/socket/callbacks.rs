//! Detachable socket callbacks.
//!
//! Each socket gets its own [`SocketCallbacks`], tagged with the session id
//! of the attempt that created it. Events are forwarded to the supervisor
//! task, which processes them one at a time.
//!
//! Detaching flips a shared flag; any event reported afterwards, including
//! one already racing in from the socket task, is dropped here.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tracing::trace;

use crate::error::Error;
use crate::identifiers::SessionId;

use super::{CloseEvent, Payload};

// ============================================================================
// Internal Event Types
// ============================================================================

/// One raw socket event.
#[derive(Debug)]
pub(crate) enum SocketEvent {
    Open,
    Close(CloseEvent),
    Error(Error),
    Message(Payload),
}

/// Socket event tagged with its session.
#[derive(Debug)]
pub(crate) struct SessionEvent {
    pub(crate) session: SessionId,
    pub(crate) event: SocketEvent,
}

// ============================================================================
// SocketCallbacks
// ============================================================================

/// The four callbacks a socket reports through.
///
/// Cheap to clone; all clones share the attached flag.
#[derive(Debug, Clone)]
pub struct SocketCallbacks {
    session: SessionId,
    sink: mpsc::UnboundedSender<SessionEvent>,
    attached: Arc<AtomicBool>,
}

impl SocketCallbacks {
    pub(crate) fn new(session: SessionId, sink: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            session,
            sink,
            attached: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Returns the session these callbacks belong to.
    #[inline]
    #[must_use]
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Returns `false` once the transport has detached this session.
    #[inline]
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// Stops forwarding events for this session.
    pub(crate) fn detach(&self) {
        self.attached.store(false, Ordering::Release);
    }

    /// Reports that the handshake completed.
    pub fn open(&self) {
        self.emit(SocketEvent::Open);
    }

    /// Reports that the socket finished.
    pub fn close(&self, event: CloseEvent) {
        self.emit(SocketEvent::Close(event));
    }

    /// Reports a socket failure. A `close` must follow.
    pub fn error(&self, error: Error) {
        self.emit(SocketEvent::Error(error));
    }

    /// Reports one inbound payload.
    pub fn message(&self, payload: Payload) {
        self.emit(SocketEvent::Message(payload));
    }

    fn emit(&self, event: SocketEvent) {
        if !self.is_attached() {
            trace!(session = %self.session, ?event, "Dropping event from detached session");
            return;
        }

        // Supervisor gone means the transport is closed; nothing to notify.
        let _ = self.sink.send(SessionEvent {
            session: self.session,
            event,
        });
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_are_tagged_with_session() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let callbacks = SocketCallbacks::new(SessionId::new(7), tx);

        callbacks.open();
        callbacks.message(Payload::from("hi"));

        let first = rx.try_recv().expect("open forwarded");
        assert_eq!(first.session, SessionId::new(7));
        assert!(matches!(first.event, SocketEvent::Open));

        let second = rx.try_recv().expect("message forwarded");
        assert!(matches!(second.event, SocketEvent::Message(Payload::Text(ref t)) if t == "hi"));
    }

    #[test]
    fn test_detach_drops_all_later_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let callbacks = SocketCallbacks::new(SessionId::new(1), tx);
        let clone = callbacks.clone();

        callbacks.detach();
        assert!(!clone.is_attached());

        clone.open();
        clone.error(Error::connection("late"));
        clone.close(CloseEvent::abnormal());
        clone.message(Payload::from("late"));

        assert!(rx.try_recv().is_err());
    }
}
