use crate::connection::{ConnectionId, ConnectionSlot, ConnectionTable, Session, SessionContext};
use crate::error::{Result, ServerError};
use crate::pool::{Task, WorkerPool};
use crate::reactor::dispatcher::Dispatcher;
use crate::reactor::handle::{ReactorCommand, ReactorHandle};
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token, Waker};
use std::io;
use std::net::SocketAddr;
use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

/// Token for the listening socket
const LISTENER_TOKEN: Token = Token(0);

/// Token for the control waker
const WAKER_TOKEN: Token = Token(1);

/// First token handed to a client connection
const CONNECTION_TOKEN_START: usize = 2;

/// The readiness loop.
///
/// Owns the poller, the listener, the registration table, and the worker
/// pool. It never reads from or writes to a client socket; it only accepts,
/// registers, and turns readiness edges into tasks.
pub struct Reactor {
    poll: Poll,
    listener: TcpListener,
    table: Arc<ConnectionTable<TcpStream>>,
    ctx: Arc<SessionContext>,
    pool: WorkerPool,
    commands: Receiver<ReactorCommand>,
    max_events: usize,
    next_id: ConnectionId,
}

impl Reactor {
    /// Registers `listener`, starts a pool of `workers` threads, and returns
    /// the reactor with a handle for controlling it from other threads.
    pub fn new(
        mut listener: TcpListener,
        ctx: Arc<SessionContext>,
        workers: usize,
        max_events: usize,
    ) -> Result<(Self, ReactorHandle)> {
        if max_events == 0 {
            return Err(ServerError::Config(
                "max events per wake must be at least 1".to_string(),
            ));
        }

        let poll = Poll::new().map_err(ServerError::Poll)?;
        poll.registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)
            .map_err(|source| ServerError::Register {
                what: "listener",
                source,
            })?;

        let waker = Waker::new(poll.registry(), WAKER_TOKEN).map_err(|source| {
            ServerError::Register {
                what: "waker",
                source,
            }
        })?;

        let (sender, commands) = channel();
        let handle = ReactorHandle::new(sender, Arc::new(waker));

        let table = Arc::new(ConnectionTable::new());
        let dispatcher = Dispatcher::new(Arc::clone(&table), Arc::clone(&ctx), handle.clone());
        let pool = WorkerPool::new(workers, Arc::new(dispatcher))?;

        let reactor = Self {
            poll,
            listener,
            table,
            ctx,
            pool,
            commands,
            max_events,
            next_id: CONNECTION_TOKEN_START,
        };

        Ok((reactor, handle))
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Connections currently registered.
    pub fn connection_count(&self) -> usize {
        self.table.len()
    }

    /// Runs the loop until a shutdown request arrives.
    ///
    /// Each iteration blocks with no timeout until at least one handle is
    /// ready, handles up to `max_events` events, then applies queued control
    /// commands.
    pub fn run(mut self) -> Result<()> {
        let mut events = Events::with_capacity(self.max_events);
        info!(addr = ?self.listener.local_addr().ok(), "Reactor started");

        loop {
            if let Err(e) = self.poll.poll(&mut events, None) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                error!(error = %e, "Readiness wait failed");
                self.shutdown();
                return Err(ServerError::Poll(e));
            }

            for event in events.iter() {
                match event.token() {
                    LISTENER_TOKEN => self.accept_pending(),
                    WAKER_TOKEN => {}
                    Token(id) => self.dispatch(id),
                }
            }

            if !self.apply_commands() {
                break;
            }
        }

        self.shutdown();
        Ok(())
    }

    /// Accepts until the listener would block.
    fn accept_pending(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => self.register_client(stream, addr),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                    return;
                }
            }
        }
    }

    fn register_client(&mut self, mut stream: TcpStream, addr: SocketAddr) {
        let id = self.next_id;
        self.next_id += 1;

        if let Err(e) = self.poll.registry().register(
            &mut stream,
            Token(id),
            Interest::READABLE | Interest::WRITABLE,
        ) {
            // Dropping the stream closes it; no task is ever created.
            warn!(client = %addr, error = %e, "Failed to register client socket");
            return;
        }

        let session = Session::new(id, stream, addr, &self.ctx);
        self.table.insert(id, Arc::new(ConnectionSlot::new(session)));
        self.ctx.stats.connection_opened();
        info!(conn = id, client = %addr, "Client connected");
    }

    /// Turns a readiness edge into a task, unless one is already in flight.
    fn dispatch(&self, id: ConnectionId) {
        let Some(slot) = self.table.get(id) else {
            trace!(conn = id, "Event for unknown connection");
            return;
        };

        if slot.dispatch().try_claim() {
            trace!(conn = id, "Dispatching task");
            self.pool.submit(Task::new(id));
        } else {
            trace!(conn = id, "Task already in flight");
        }
    }

    /// Applies queued control commands. Returns false on shutdown.
    fn apply_commands(&mut self) -> bool {
        loop {
            match self.commands.try_recv() {
                Ok(ReactorCommand::Release(id)) => self.release(id),
                Ok(ReactorCommand::Shutdown) => {
                    info!("Shutdown requested");
                    return false;
                }
                Err(TryRecvError::Empty) => return true,
                // The dispatcher holds a sender for as long as the pool lives.
                Err(TryRecvError::Disconnected) => return true,
            }
        }
    }

    /// Deregisters and drops a connection. Unknown ids are ignored.
    fn release(&mut self, id: ConnectionId) {
        let Some(slot) = self.table.remove(id) else {
            trace!(conn = id, "Connection already released");
            return;
        };

        let addr = slot.with_session(|session| {
            if let Err(e) = self.poll.registry().deregister(session.stream_mut()) {
                debug!(conn = id, error = %e, "Failed to deregister client socket");
            }
            session.addr()
        });

        self.ctx.stats.connection_closed();
        info!(conn = id, client = %addr, "Connection closed");
        // The socket closes when the last reference to the slot drops.
    }

    fn shutdown(&mut self) {
        self.pool.shutdown();

        for (id, slot) in self.table.drain() {
            slot.with_session(|session| {
                session.release();
                if let Err(e) = self.poll.registry().deregister(session.stream_mut()) {
                    debug!(conn = id, error = %e, "Failed to deregister client socket");
                }
            });
            self.ctx.stats.connection_closed();
            debug!(conn = id, "Connection dropped on shutdown");
        }

        info!("Reactor stopped");
    }
}
