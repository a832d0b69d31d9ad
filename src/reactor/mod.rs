//! Readiness Multiplexer
//!
//! One thread watches the listener and every client socket with
//! edge-triggered notification (epoll on Linux, kqueue on BSD/macOS, via
//! `mio`). It never performs client I/O: a ready client becomes a [`Task`]
//! on the worker pool, so a slow command can never make the loop miss an
//! edge on another socket.
//!
//! ## Event Flow
//!
//! ```text
//!                ┌──────────────────────────────────┐
//!                │     poll(events, no timeout)     │
//!                └───────────────┬──────────────────┘
//!          ┌─────────────────────┼──────────────────────┐
//!          ▼                     ▼                      ▼
//!   LISTENER_TOKEN          WAKER_TOKEN             Token(id)
//!   accept until            (commands are           try_claim() ?
//!   WouldBlock,             applied after           submit(Task{id})
//!   register R|W            every batch)            : mark NOTIFIED
//!                                │
//!                                ▼
//!                  Release(id): deregister, drop
//!                  Shutdown:    stop pool, exit
//! ```
//!
//! [`Task`]: crate::pool::Task

pub mod core;
mod dispatcher;
pub mod handle;
pub(crate) mod socket;

pub use self::core::Reactor;
pub use handle::ReactorHandle;
pub(crate) use socket::bind_listener;
