//! # rexecd - A Remote Command-Execution Server
//!
//! rexecd accepts TCP connections, optionally authenticates the peer, then
//! reads commands, runs them through the host shell, and sends the combined
//! stdout/stderr back. Many sockets share one readiness thread; the blocking
//! work happens on a fixed pool of worker threads.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              rexecd                                     │
//! │                                                                         │
//! │  ┌─────────────┐  Task{id}  ┌─────────────┐  advance  ┌─────────────┐  │
//! │  │  Reactor    │──────────> │ WorkerPool  │─────────> │  Session    │  │
//! │  │ (1 thread,  │            │ (N threads, │           │ state       │  │
//! │  │  mio poll)  │ <───────── │  TaskQueue) │           │ machine     │  │
//! │  └─────────────┘ release(id)└─────────────┘           └──────┬──────┘  │
//! │         ▲                                                     │         │
//! │         │ edge-triggered readiness                            ▼         │
//! │  ┌──────┴──────┐                                     ┌──────────────┐  │
//! │  │ TcpListener │                                     │ Command      │  │
//! │  │ + clients   │                                     │ Executor     │  │
//! │  └─────────────┘                                     │ (/bin/sh -c) │  │
//! │                                                      └──────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use rexecd::{Profile, Server, ServerConfig, ShellExecutor};
//! use std::sync::Arc;
//!
//! let config = ServerConfig::for_profile(Profile::Auth);
//! let server = Server::bind(config, Arc::new(ShellExecutor::new())).unwrap();
//! server.run().unwrap();
//! ```
//!
//! ## Wire Profiles
//!
//! - **open**: no handshake; any message containing `q` closes the session
//! - **auth**: username read, password read, then commands until `DISCONNECT`
//! - **http**: no handshake; one command, answered as `HTTP/1.1 200 OK`
//!
//! ## Module Overview
//!
//! - [`reactor`]: Edge-triggered readiness loop and listener setup
//! - [`pool`]: Fixed-size worker pool and task queue
//! - [`connection`]: Per-connection state machine, dispatch guard, statistics
//! - [`commands`]: Shell command executor
//! - [`auth`]: Credential verification
//! - [`protocol`]: Reply framing and inbound chunk interpretation
//!
//! ## Design Highlights
//!
//! ### One Worker Per Connection
//!
//! A per-connection atomic guard ensures at most one task is ever in flight
//! for a connection. An edge that arrives mid-task is remembered and the
//! worker advances the connection again instead of dropping the edge.
//!
//! ### No Framing
//!
//! Each `recv` is treated as one complete message. A command split across TCP
//! segments is seen as two commands; two commands coalesced into one segment
//! run as one shell script.

pub mod auth;
pub mod commands;
pub mod config;
pub mod connection;
pub mod error;
pub mod pool;
pub mod protocol;
pub mod reactor;
pub mod server;

// Re-export commonly used types for convenience
pub use auth::{Authenticator, StaticCredentials};
pub use commands::{CommandExecutor, ShellExecutor};
pub use config::{Credentials, Profile, ServerConfig};
pub use connection::{ConnectionStats, SessionState};
pub use error::{ServerError, SessionError};
pub use server::{Server, ServerHandle};

/// Version of rexecd
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
