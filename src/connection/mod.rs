//! Connection Module
//!
//! Everything that belongs to one client channel: the protocol state machine,
//! the guard that keeps a single worker on a connection, and the shared
//! statistics.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Reactor thread                          │
//! │                    (reactor module)                         │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ readiness edge → DispatchState::try_claim()
//!                        ▼
//!           ┌────────────────────────┐
//!           │  Task { id } queued    │
//!           └────────────┬───────────┘
//!                        │
//!                        │ worker pops
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionSlot::advance                     │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ Read chunk  │───>│ Execute cmd │───>│ Send output │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │         ▲                                     │             │
//! │         └──────────── until would-block ──────┘             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod dispatch;
pub mod session;
pub mod slot;
pub mod stats;

// Re-export commonly used types
pub use dispatch::DispatchState;
pub use session::{ConnectionId, Progress, Session, SessionContext, SessionState};
pub use slot::{ConnectionSlot, ConnectionTable};
pub use stats::ConnectionStats;
