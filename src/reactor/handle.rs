//! Thread-safe requests to the reactor.
//!
//! Only the reactor thread touches the poll registration. Workers and the
//! server owner ask for changes by queueing a [`ReactorCommand`] and waking
//! the poll.

use crate::connection::ConnectionId;
use mio::Waker;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use tracing::{trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReactorCommand {
    /// Deregister and close a finished connection
    Release(ConnectionId),
    /// Stop the reactor and the worker pool
    Shutdown,
}

/// A cloneable handle for talking to a running reactor.
#[derive(Clone)]
pub struct ReactorHandle {
    sender: Sender<ReactorCommand>,
    waker: Arc<Waker>,
}

impl ReactorHandle {
    pub(crate) fn new(sender: Sender<ReactorCommand>, waker: Arc<Waker>) -> Self {
        Self { sender, waker }
    }

    /// Asks the reactor to deregister and drop connection `id`. Releasing an
    /// id that is already gone is a no-op.
    pub fn release(&self, id: ConnectionId) {
        self.send(ReactorCommand::Release(id));
    }

    /// Asks the reactor loop to exit.
    pub fn shutdown(&self) {
        self.send(ReactorCommand::Shutdown);
    }

    fn send(&self, command: ReactorCommand) {
        if self.sender.send(command).is_err() {
            trace!(?command, "Reactor already stopped");
            return;
        }
        if let Err(e) = self.waker.wake() {
            warn!(error = %e, "Failed to wake reactor");
        }
    }
}
