//! Socket sessions and the current-session slot.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::identifiers::SessionId;
use crate::socket::{Socket, SocketCallbacks};

// ============================================================================
// SocketSession
// ============================================================================

/// One connection attempt: the socket plus the callbacks it reports through.
///
/// Never reused. A new attempt always creates a new session.
#[derive(Clone)]
pub(crate) struct SocketSession {
    id: SessionId,
    socket: Arc<dyn Socket>,
    callbacks: SocketCallbacks,
    was_connected: Arc<AtomicBool>,
}

impl SocketSession {
    pub(crate) fn new(socket: Arc<dyn Socket>, callbacks: SocketCallbacks) -> Self {
        Self {
            id: callbacks.session(),
            socket,
            callbacks,
            was_connected: Arc::new(AtomicBool::new(false)),
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> SessionId {
        self.id
    }

    #[inline]
    pub(crate) fn socket(&self) -> &Arc<dyn Socket> {
        &self.socket
    }

    /// `true` once the open event fired. Never reset.
    #[inline]
    pub(crate) fn was_connected(&self) -> bool {
        self.was_connected.load(Ordering::Acquire)
    }

    pub(crate) fn mark_connected(&self) {
        self.was_connected.store(true, Ordering::Release);
    }

    /// Stops this session's callbacks from reaching the supervisor.
    pub(crate) fn detach(&self) {
        self.callbacks.detach();
    }

    /// Detaches, then asks the socket to close. Errors are logged only.
    pub(crate) fn shutdown(&self) {
        self.detach();
        if let Err(e) = self.socket.close() {
            warn!(session = %self.id, error = %e, "Socket close failed");
        }
    }
}

impl fmt::Debug for SocketSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketSession")
            .field("id", &self.id)
            .field("ready_state", &self.socket.ready_state())
            .field("was_connected", &self.was_connected())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SessionSlot
// ============================================================================

/// Holder of the current session, shared by the handle and the supervisor.
#[derive(Debug, Default)]
pub(crate) struct SessionSlot {
    current: Mutex<Option<SocketSession>>,
}

impl SessionSlot {
    /// Installs `session`, detaching the one it supersedes.
    pub(crate) fn replace(&self, session: SocketSession) {
        let previous = self.current.lock().replace(session);
        if let Some(previous) = previous {
            trace!(session = %previous.id(), "Session superseded");
            previous.detach();
        }
    }

    pub(crate) fn current(&self) -> Option<SocketSession> {
        self.current.lock().clone()
    }

    /// Returns the current session if its id is `id`.
    pub(crate) fn get(&self, id: SessionId) -> Option<SocketSession> {
        self.current
            .lock()
            .as_ref()
            .filter(|session| session.id() == id)
            .cloned()
    }

    /// Removes and shuts down the current session, if any.
    pub(crate) fn teardown(&self) {
        let session = self.current.lock().take();
        if let Some(session) = session {
            session.shutdown();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
