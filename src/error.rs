//! Error types
//!
//! Setup failures are fatal and surface as [`ServerError`]. Everything that
//! goes wrong on an established connection is a [`SessionError`] and only ever
//! closes that one connection.

use std::io;
use std::net::SocketAddr;

/// Errors that prevent the server from starting or keep it from running.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The bind address could not be parsed or resolved
    #[error("invalid bind address '{addr}': {source}")]
    InvalidAddress {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// bind(2) failed
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// listen(2) with the configured backlog failed
    #[error("failed to listen with backlog {backlog}: {source}")]
    Listen {
        backlog: i32,
        #[source]
        source: io::Error,
    },

    /// Creating the readiness poller failed
    #[error("failed to create poller: {0}")]
    Poll(#[source] io::Error),

    /// Registering the listener or waker with the poller failed
    #[error("failed to register {what}: {source}")]
    Register {
        what: &'static str,
        #[source]
        source: io::Error,
    },

    /// A reactor or worker thread could not be spawned
    #[error("failed to spawn thread '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },

    /// The configuration cannot produce a working server
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Errors that end a single client session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// recv/send failed for a reason other than would-block
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// The peer closed its side of the connection
    #[error("Client disconnected")]
    ClientDisconnected,

    /// The peer stopped accepting bytes mid-reply
    #[error("Write returned zero bytes")]
    WriteZero,
}

/// Result alias used throughout server setup
pub type Result<T> = std::result::Result<T, ServerError>;
