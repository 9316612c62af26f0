//! Lifecycle flag and public event surface.
//!
//! [`TransportState`] is shared by the public handle and the supervisor
//! task. It owns the one-way `closed` flag and the registered listeners.
//!
//! # Emission Rules
//!
//! - `open`, `message` and `disconnected` are never emitted once closed,
//!   including mid-way through a listener list if a listener closes the
//!   transport.
//! - `close` is emitted by whichever caller wins the `closed` flag, so it
//!   fires exactly once.
//! - Listeners run without the listener lock held; they may call back into
//!   the transport, including `close()`.
//! - Each handler call holds a re-entrant emission guard, which `close` also
//!   takes. A `close()` from another thread waits for the running handler to
//!   return, so no `open`, `message` or `disconnected` handler starts after
//!   `close` listeners. A handler must not block on another thread that is
//!   closing the same transport.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, ReentrantMutex};
use tokio::sync::watch;

use crate::identifiers::ListenerId;

// ============================================================================
// Phase
// ============================================================================

/// Connection state machine.
///
/// ```text
///   Idle ──► Attempting(n) ──open──► Connected ──drop──► Restarting ──► Attempting(1)
///                │    ▲
///         failed │    │ timer
///                ▼    │
///              Backoff(n+1)
///
///   any ──terminal──► Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// No attempt started yet.
    Idle,
    /// Attempt number `attempt` in progress.
    Attempting {
        /// 1-based attempt number within the current sequence.
        attempt: u32,
    },
    /// Waiting for the backoff timer before attempt `attempt`.
    Backoff {
        /// Attempt number that starts when the timer fires.
        attempt: u32,
    },
    /// Socket open.
    Connected,
    /// Established connection lost, starting a fresh sequence.
    Restarting,
    /// Terminal.
    Closed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Attempting { attempt } => write!(f, "attempting({attempt})"),
            Self::Backoff { attempt } => write!(f, "backoff({attempt})"),
            Self::Connected => write!(f, "connected"),
            Self::Restarting => write!(f, "restarting"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

// ============================================================================
// CloseReason
// ============================================================================

/// Why the transport closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseReason {
    /// [`Transport::close`](crate::Transport::close) was called.
    ClosedByCaller,
    /// Server closed with the terminal close code.
    ClosedByServer,
    /// Never connected and the retry budget ran out.
    RetriesExhausted,
    /// Every transport handle was dropped.
    Dropped,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClosedByCaller => write!(f, "closed by caller"),
            Self::ClosedByServer => write!(f, "closed by server"),
            Self::RetriesExhausted => write!(f, "retries exhausted"),
            Self::Dropped => write!(f, "dropped"),
        }
    }
}

// ============================================================================
// Listener Types
// ============================================================================

/// Handler for `open` and `disconnected`.
pub type LifecycleHandler = Arc<dyn Fn() + Send + Sync>;

/// Handler for decoded inbound messages.
pub type MessageHandler<M> = Arc<dyn Fn(&M) + Send + Sync>;

/// Handler for the terminal `close` event.
pub type CloseHandler = Arc<dyn Fn(CloseReason) + Send + Sync>;

/// One registered listener.
pub(crate) enum Listener<M> {
    Open(LifecycleHandler),
    Message(MessageHandler<M>),
    Disconnected(LifecycleHandler),
    Close(CloseHandler),
}

// ============================================================================
// TransportState
// ============================================================================

/// Shared lifecycle state of one transport.
pub(crate) struct TransportState<M> {
    closed: AtomicBool,
    phase: Mutex<Phase>,
    listeners: Mutex<BTreeMap<ListenerId, Listener<M>>>,
    emission: ReentrantMutex<()>,
    closed_tx: watch::Sender<bool>,
}

impl<M> TransportState<M> {
    pub(crate) fn new() -> Self {
        Self {
            closed: AtomicBool::new(false),
            phase: Mutex::new(Phase::Idle),
            listeners: Mutex::new(BTreeMap::new()),
            emission: ReentrantMutex::new(()),
            closed_tx: watch::Sender::new(false),
        }
    }

    #[inline]
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn phase(&self) -> Phase {
        *self.phase.lock()
    }

    /// Records a transition. `Closed` is final.
    pub(crate) fn set_phase(&self, next: Phase) {
        let mut phase = self.phase.lock();
        if *phase != Phase::Closed {
            *phase = next;
        }
    }

    pub(crate) fn subscribe_closed(&self) -> watch::Receiver<bool> {
        self.closed_tx.subscribe()
    }

    // ========================================================================
    // Listener Registry
    // ========================================================================

    /// Registers a listener. Ignored (but still given an id) once closed.
    pub(crate) fn add_listener(&self, listener: Listener<M>) -> ListenerId {
        let id = ListenerId::generate();
        if !self.is_closed() {
            self.listeners.lock().insert(id, listener);
        }
        id
    }

    pub(crate) fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.lock().remove(&id).is_some()
    }

    pub(crate) fn message_listener_count(&self) -> usize {
        self.listeners
            .lock()
            .values()
            .filter(|listener| matches!(listener, Listener::Message(_)))
            .count()
    }

    // ========================================================================
    // Emission
    // ========================================================================

    pub(crate) fn emit_open(&self) {
        let handlers = self.collect(|listener| match listener {
            Listener::Open(handler) => Some(Arc::clone(handler)),
            _ => None,
        });
        self.run_while_open(handlers, |handler| handler());
    }

    pub(crate) fn emit_disconnected(&self) {
        let handlers = self.collect(|listener| match listener {
            Listener::Disconnected(handler) => Some(Arc::clone(handler)),
            _ => None,
        });
        self.run_while_open(handlers, |handler| handler());
    }

    pub(crate) fn emit_message(&self, message: &M) {
        let handlers = self.collect(|listener| match listener {
            Listener::Message(handler) => Some(Arc::clone(handler)),
            _ => None,
        });
        self.run_while_open(handlers, |handler| handler(message));
    }

    /// Sets `closed` and emits `close`.
    ///
    /// Returns `false` without side effects if the transport was already
    /// closed. All listeners are released afterwards.
    pub(crate) fn close(&self, reason: CloseReason) -> bool {
        let _emitting = self.emission.lock();
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        *self.phase.lock() = Phase::Closed;

        let listeners = std::mem::take(&mut *self.listeners.lock());
        for listener in listeners.into_values() {
            if let Listener::Close(handler) = listener {
                handler(reason);
            }
        }

        // Waiters resume after every close listener ran.
        self.closed_tx.send_replace(true);
        true
    }

    fn collect<H>(&self, select: impl Fn(&Listener<M>) -> Option<H>) -> Vec<H> {
        self.listeners.lock().values().filter_map(select).collect()
    }

    fn run_while_open<H>(&self, handlers: Vec<H>, call: impl Fn(&H)) {
        for handler in &handlers {
            let _emitting = self.emission.lock();
            if self.is_closed() {
                break;
            }
            call(handler);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, LifecycleHandler) {
        let count = Arc::new(AtomicUsize::new(0));
        let handler_count = Arc::clone(&count);
        let handler: LifecycleHandler = Arc::new(move || {
            handler_count.fetch_add(1, Ordering::SeqCst);
        });
        (count, handler)
    }

    #[test]
    fn test_close_fires_once() {
        let state: TransportState<String> = TransportState::new();
        let closes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&closes);
        state.add_listener(Listener::Close(Arc::new(move |reason| sink.lock().push(reason))));

        assert!(state.close(CloseReason::RetriesExhausted));
        assert!(!state.close(CloseReason::ClosedByCaller));

        assert_eq!(*closes.lock(), vec![CloseReason::RetriesExhausted]);
        assert_eq!(state.phase(), Phase::Closed);
        assert!(*state.subscribe_closed().borrow());
    }

    #[test]
    fn test_no_emission_after_close() {
        let state: TransportState<String> = TransportState::new();
        let (opens, handler) = counter();
        state.add_listener(Listener::Open(handler));

        state.emit_open();
        state.close(CloseReason::ClosedByCaller);
        state.emit_open();

        assert_eq!(opens.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_registered_after_close_is_ignored() {
        let state: TransportState<String> = TransportState::new();
        state.close(CloseReason::ClosedByCaller);
        state.add_listener(Listener::Message(Arc::new(|_| {})));
        assert_eq!(state.message_listener_count(), 0);
    }

    #[test]
    fn test_remove_listener() {
        let state: TransportState<String> = TransportState::new();
        let id = state.add_listener(Listener::Message(Arc::new(|_| {})));
        assert_eq!(state.message_listener_count(), 1);

        assert!(state.remove_listener(id));
        assert!(!state.remove_listener(id));
        assert_eq!(state.message_listener_count(), 0);
    }

    #[test]
    fn test_messages_reach_listeners_in_registration_order() {
        let state: TransportState<String> = TransportState::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let sink = Arc::clone(&seen);
            state.add_listener(Listener::Message(Arc::new(move |m: &String| {
                sink.lock().push(format!("{tag}:{m}"));
            })));
        }

        state.emit_message(&"hello".to_owned());
        assert_eq!(*seen.lock(), vec!["first:hello", "second:hello"]);
    }

    #[test]
    fn test_reentrant_close_stops_remaining_listeners() {
        let state: Arc<TransportState<String>> = Arc::new(TransportState::new());
        let (later, later_handler) = counter();

        let closer = Arc::clone(&state);
        state.add_listener(Listener::Disconnected(Arc::new(move || {
            closer.close(CloseReason::ClosedByCaller);
        })));
        state.add_listener(Listener::Disconnected(later_handler));

        state.emit_disconnected();

        assert!(state.is_closed());
        assert_eq!(later.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_close_from_another_thread_waits_for_running_handler() {
        use std::sync::mpsc;
        use std::thread;
        use std::time::Duration;

        let state: Arc<TransportState<String>> = Arc::new(TransportState::new());
        let order = Arc::new(Mutex::new(Vec::new()));
        let (started_tx, started_rx) = mpsc::channel();

        let sink = Arc::clone(&order);
        state.add_listener(Listener::Open(Arc::new(move || {
            let _ = started_tx.send(());
            thread::sleep(Duration::from_millis(50));
            sink.lock().push("open");
        })));
        let sink = Arc::clone(&order);
        state.add_listener(Listener::Close(Arc::new(move |_| sink.lock().push("close"))));

        let closer = {
            let state = Arc::clone(&state);
            thread::spawn(move || {
                started_rx.recv().expect("handler started");
                state.close(CloseReason::ClosedByCaller);
            })
        };

        state.emit_open();
        closer.join().expect("closer panicked");

        assert_eq!(*order.lock(), vec!["open", "close"]);
    }

    #[test]
    fn test_closed_phase_is_final() {
        let state: TransportState<String> = TransportState::new();
        state.set_phase(Phase::Attempting { attempt: 1 });
        assert_eq!(state.phase(), Phase::Attempting { attempt: 1 });

        state.close(CloseReason::ClosedByServer);
        state.set_phase(Phase::Connected);
        assert_eq!(state.phase(), Phase::Closed);
    }
}
