//! Command Execution Module
//!
//! This module is the boundary between the connection state machine and the
//! host operating system. Sessions hand it the raw text a client sent; it
//! hands back everything the command printed.
//!
//! ## Architecture
//!
//! ```text
//! Client chunk ("ls -la\n")
//!       │
//!       ▼
//! ┌─────────────────┐
//! │ Session         │  (connection module)
//! └────────┬────────┘
//!          │ execute(&str)
//!          ▼
//! ┌─────────────────┐
//! │ CommandExecutor │  (this module)
//! │                 │
//! │  /bin/sh -c ... │
//! │  2>&1 merged    │
//! └────────┬────────┘
//!          │ String
//!          ▼
//!   Framed reply to client
//! ```
//!
//! Execution always happens on a worker thread, never on the reactor.

pub mod executor;

pub use executor::{CommandExecutor, ShellExecutor, DEFAULT_SHELL, SPAWN_FAILURE};
