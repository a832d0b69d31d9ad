//! Connection State Machine
//!
//! Each accepted client gets a [`Session`]. A worker drives it forward with
//! [`Session::advance`] every time the reactor reports readiness; the session
//! runs until a read or write would block, then parks until the next edge.
//!
//! ## Connection Lifecycle
//!
//! ```text
//!   accept
//!     │
//!     ├──── authenticator configured ────┐
//!     │                                  ▼
//!     │                        ┌──────────────────┐
//!     │                        │  HandshakeUser   │ one recv = username
//!     │                        └────────┬─────────┘
//!     │                                 ▼
//!     │                        ┌──────────────────┐
//!     │                        │  HandshakePass   │ one recv = password
//!     │                        └────────┬─────────┘
//!     │                 verified        │        rejected
//!     │             ┌───────────────────┴──────────────────┐
//!     ▼             ▼                                      │
//! ┌──────────────────────┐                                 │
//! │     CommandLoop      │ recv → execute → send           │
//! └──────────┬───────────┘                                 │
//!            │ EOF / sentinel / I/O error / single-shot    │
//!            ▼                                             ▼
//!      ┌──────────────────────────────────────────────────────┐
//!      │                       Closed                         │
//!      └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Buffer Management
//!
//! One `recv` is one message; nothing is carried between reads. Output that
//! cannot be written immediately stays in the outbound buffer and is flushed
//! first on the next advance, which a writable edge triggers.

use crate::auth::Authenticator;
use crate::commands::CommandExecutor;
use crate::connection::stats::ConnectionStats;
use crate::error::SessionError;
use crate::protocol::{decode_chunk, trim_line, Framing, Sentinel, AUTH_FAILURE, AUTH_SUCCESS};
use bytes::{Buf, Bytes, BytesMut};
use std::fmt;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Identifies a connection for the lifetime of the server.
pub type ConnectionId = usize;

/// Protocol state of a session. States only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    HandshakeUser,
    HandshakePass,
    CommandLoop,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::HandshakeUser => "HANDSHAKE_USER",
            SessionState::HandshakePass => "HANDSHAKE_PASS",
            SessionState::CommandLoop => "COMMAND_LOOP",
            SessionState::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

/// What a worker should do after an advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Waiting for the next readiness edge.
    Parked,
    /// The session is finished; release the socket.
    Closed,
}

/// Collaborators shared by every session.
pub struct SessionContext {
    pub executor: Arc<dyn CommandExecutor>,
    pub authenticator: Option<Arc<dyn Authenticator>>,
    pub framing: Framing,
    pub sentinel: Sentinel,
    pub read_buffer_size: usize,
    pub stats: Arc<ConnectionStats>,
}

/// Per-connection protocol state and buffers.
pub struct Session<S> {
    /// Connection id (the reactor token)
    id: ConnectionId,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// The client socket
    stream: S,

    state: SessionState,

    /// Every state entered, in order
    trail: Vec<SessionState>,

    /// Bytes from the most recent recv
    inbound: BytesMut,

    /// Reply bytes not yet accepted by the socket
    outbound: BytesMut,

    /// Candidate username between the two handshake reads
    username: Option<String>,

    authenticated: bool,

    /// Close once the outbound buffer drains
    close_after_flush: bool,

    /// Guards against releasing the socket twice
    released: bool,
}

impl<S: Read + Write> Session<S> {
    /// Creates a session for a freshly accepted connection.
    ///
    /// Without an authenticator the handshake is skipped and the session
    /// starts in [`SessionState::CommandLoop`].
    pub fn new(id: ConnectionId, stream: S, addr: SocketAddr, ctx: &SessionContext) -> Self {
        let initial = if ctx.authenticator.is_some() {
            SessionState::HandshakeUser
        } else {
            SessionState::CommandLoop
        };

        Self {
            id,
            addr,
            stream,
            state: initial,
            trail: vec![initial],
            inbound: BytesMut::with_capacity(ctx.read_buffer_size),
            outbound: BytesMut::new(),
            username: None,
            authenticated: ctx.authenticator.is_none(),
            close_after_flush: false,
            released: false,
        }
    }

    /// Drives the session until it would block or closes.
    ///
    /// Per-connection errors never escape: they are logged and turn into
    /// [`Progress::Closed`].
    pub fn advance(&mut self, ctx: &SessionContext) -> Progress {
        match self.drive(ctx) {
            Ok(progress) => progress,
            Err(e) => {
                match &e {
                    SessionError::ClientDisconnected => {
                        info!(conn = self.id, client = %self.addr, "Client disconnected")
                    }
                    SessionError::IoError(io_err)
                        if io_err.kind() == io::ErrorKind::ConnectionReset =>
                    {
                        debug!(conn = self.id, client = %self.addr, "Connection reset by client")
                    }
                    _ => warn!(conn = self.id, client = %self.addr, error = %e, "Connection error"),
                }
                self.transition(SessionState::Closed);
                Progress::Closed
            }
        }
    }

    /// The read-execute-respond loop.
    fn drive(&mut self, ctx: &SessionContext) -> Result<Progress, SessionError> {
        loop {
            if self.state == SessionState::Closed {
                return Ok(Progress::Closed);
            }

            if !self.flush(ctx)? {
                trace!(conn = self.id, pending = self.outbound.len(), "Write would block");
                return Ok(Progress::Parked);
            }

            if self.close_after_flush {
                self.transition(SessionState::Closed);
                return Ok(Progress::Closed);
            }

            match self.read_chunk(ctx)? {
                Some(chunk) => self.handle_chunk(chunk, ctx),
                None => return Ok(Progress::Parked),
            }
        }
    }

    /// Reads one chunk. `None` means the socket would block.
    fn read_chunk(&mut self, ctx: &SessionContext) -> Result<Option<Bytes>, SessionError> {
        self.inbound.clear();
        self.inbound.resize(ctx.read_buffer_size, 0);

        loop {
            match self.stream.read(&mut self.inbound) {
                Ok(0) => return Err(SessionError::ClientDisconnected),
                Ok(n) => {
                    self.inbound.truncate(n);
                    ctx.stats.bytes_read(n);
                    trace!(conn = self.id, bytes = n, "Read data");
                    return Ok(Some(self.inbound.split().freeze()));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Writes as much pending output as the socket takes. Returns true once
    /// the outbound buffer is empty.
    fn flush(&mut self, ctx: &SessionContext) -> Result<bool, SessionError> {
        while !self.outbound.is_empty() {
            match self.stream.write(&self.outbound) {
                Ok(0) => return Err(SessionError::WriteZero),
                Ok(n) => {
                    self.outbound.advance(n);
                    ctx.stats.bytes_written(n);
                    trace!(conn = self.id, bytes = n, "Sent response");
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(true)
    }

    fn handle_chunk(&mut self, chunk: Bytes, ctx: &SessionContext) {
        let text = decode_chunk(&chunk);

        match self.state {
            SessionState::HandshakeUser => {
                self.username = Some(trim_line(&text).to_string());
                self.transition(SessionState::HandshakePass);
            }
            SessionState::HandshakePass => {
                let username = self.username.take().unwrap_or_default();
                let password = trim_line(&text);
                let verified = ctx
                    .authenticator
                    .as_ref()
                    .map_or(true, |auth| auth.verify(&username, password));

                if verified {
                    info!(conn = self.id, client = %self.addr, user = %username, "Authentication successful");
                    self.outbound.extend_from_slice(AUTH_SUCCESS);
                    self.authenticated = true;
                    self.transition(SessionState::CommandLoop);
                } else {
                    warn!(conn = self.id, client = %self.addr, user = %username, "Authentication failed");
                    ctx.stats.auth_failed();
                    self.outbound.extend_from_slice(AUTH_FAILURE);
                    self.close_after_flush = true;
                }
            }
            SessionState::CommandLoop => {
                if ctx.sentinel.matches(&text) {
                    info!(conn = self.id, client = %self.addr, "Client requested to close the connection");
                    self.transition(SessionState::Closed);
                    return;
                }

                debug!(conn = self.id, command = %trim_line(&text), "Received command");
                let output = ctx.executor.execute(&text);
                ctx.stats.command_executed();

                self.outbound.extend_from_slice(&ctx.framing.encode(output.as_bytes()));
                if ctx.framing.is_single_shot() {
                    self.close_after_flush = true;
                }
            }
            SessionState::Closed => {}
        }
    }

    /// Moves to `next`. Backward or repeated moves are ignored.
    fn transition(&mut self, next: SessionState) {
        if next <= self.state {
            trace!(conn = self.id, from = %self.state, to = %next, "Ignored non-forward transition");
            return;
        }
        debug!(conn = self.id, from = %self.state, to = %next, "State transition");
        self.state = next;
        self.trail.push(next);
    }

    /// Marks the socket as released. Returns true only on the first call;
    /// later calls are no-ops.
    pub fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.transition(SessionState::Closed);
        self.released = true;
        true
    }
}

impl<S> Session<S> {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Every state this session has entered, oldest first.
    pub fn trail(&self) -> &[SessionState] {
        &self.trail
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Bytes queued for the peer but not yet written.
    pub fn pending_output(&self) -> usize {
        self.outbound.len()
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }
}
