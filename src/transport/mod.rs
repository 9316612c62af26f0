//! Resilient transport layer.
//!
//! Keeps one duplex channel alive across socket failures. The caller holds a
//! [`Transport`] handle; a background supervisor task owns reconnection.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐   commands    ┌──────────────────────┐
//! │   Transport     │──────────────►│ ConnectionSupervisor │
//! │   (handle)      │               │  retry / backoff     │
//! │                 │◄── listeners ─│                      │
//! └────────┬────────┘               └──────────▲───────────┘
//!          │ send                              │ session events
//!          ▼                                   │
//! ┌─────────────────┐   callbacks   ┌──────────┴───────────┐
//! │  SessionSlot    │──────────────►│  Socket (connector)  │
//! └─────────────────┘               └──────────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. Build - first attempt starts before `build` returns
//! 2. Attempt fails before opening - retry after exponential backoff
//! 3. Open - `open` emitted, retry budget no longer consumed
//! 4. Established connection drops - `disconnected`, fresh attempt sequence
//! 5. Terminal close code, exhausted budget, `close()` or drop - `close`
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | Fluent transport configuration |
//! | `core` | Public transport handle |
//! | `retry` | Retry budget bookkeeping |
//! | `session` | Per-attempt socket sessions |
//! | `state` | Closed flag, phase and listeners |
//! | `supervisor` | Reconnection event loop |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent transport configuration.
pub mod builder;

/// Public transport handle.
pub mod core;

mod retry;
mod session;

/// Lifecycle state and listener types.
pub mod state;

mod supervisor;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::TransportBuilder;
pub use core::Transport;
pub use state::{CloseHandler, CloseReason, LifecycleHandler, MessageHandler, Phase};
