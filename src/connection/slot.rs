//! Shared connection storage.
//!
//! The reactor owns registration: it inserts a [`ConnectionSlot`] on accept and
//! removes it on release. Workers only look slots up by id, then lock the
//! session for the duration of one task.

use crate::connection::dispatch::DispatchState;
use crate::connection::session::{ConnectionId, Progress, Session, SessionContext};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// A session plus the bookkeeping that keeps one worker on it at a time.
pub struct ConnectionSlot<S> {
    session: Mutex<Session<S>>,
    dispatch: DispatchState,
    /// Workers currently inside `advance` (instrumentation; must stay <= 1)
    active: AtomicUsize,
}

impl<S: Read + Write> ConnectionSlot<S> {
    pub fn new(session: Session<S>) -> Self {
        Self {
            session: Mutex::new(session),
            dispatch: DispatchState::new(),
            active: AtomicUsize::new(0),
        }
    }

    pub fn dispatch(&self) -> &DispatchState {
        &self.dispatch
    }

    /// Advances the session once, recording per-connection concurrency.
    pub fn advance(&self, ctx: &SessionContext) -> Progress {
        let in_flight = self.active.fetch_add(1, Ordering::AcqRel) + 1;
        ctx.stats.observe_concurrency(in_flight);

        let progress = self.session.lock().unwrap().advance(ctx);

        self.active.fetch_sub(1, Ordering::AcqRel);
        progress
    }

    /// Marks the session released. True only the first time.
    pub fn release(&self) -> bool {
        self.session.lock().unwrap().release()
    }

    /// Runs `f` with exclusive access to the session.
    pub fn with_session<R>(&self, f: impl FnOnce(&mut Session<S>) -> R) -> R {
        let mut session = self.session.lock().unwrap();
        f(&mut *session)
    }
}

/// Id-to-slot map shared between the reactor and the workers.
pub struct ConnectionTable<S> {
    slots: RwLock<HashMap<ConnectionId, Arc<ConnectionSlot<S>>>>,
}

impl<S> Default for ConnectionTable<S> {
    fn default() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }
}

impl<S> ConnectionTable<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: ConnectionId, slot: Arc<ConnectionSlot<S>>) {
        self.slots.write().unwrap().insert(id, slot);
    }

    pub fn get(&self, id: ConnectionId) -> Option<Arc<ConnectionSlot<S>>> {
        self.slots.read().unwrap().get(&id).cloned()
    }

    pub fn remove(&self, id: ConnectionId) -> Option<Arc<ConnectionSlot<S>>> {
        self.slots.write().unwrap().remove(&id)
    }

    /// Removes and returns every slot.
    pub fn drain(&self) -> Vec<(ConnectionId, Arc<ConnectionSlot<S>>)> {
        self.slots.write().unwrap().drain().collect()
    }

    pub fn len(&self) -> usize {
        self.slots.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandExecutor;
    use crate::connection::stats::ConnectionStats;
    use crate::protocol::{Framing, Sentinel};
    use std::io;

    struct Idle;

    impl Read for Idle {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::ErrorKind::WouldBlock.into())
        }
    }

    impl Write for Idle {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Noop;

    impl CommandExecutor for Noop {
        fn execute(&self, _command: &str) -> String {
            String::new()
        }
    }

    fn context() -> SessionContext {
        SessionContext {
            executor: Arc::new(Noop),
            authenticator: None,
            framing: Framing::Raw,
            sentinel: Sentinel::legacy(),
            read_buffer_size: 64,
            stats: Arc::new(ConnectionStats::new()),
        }
    }

    #[test]
    fn test_table_insert_get_remove() {
        let ctx = context();
        let table = ConnectionTable::new();
        let session = Session::new(3, Idle, "127.0.0.1:1".parse().unwrap(), &ctx);
        table.insert(3, Arc::new(ConnectionSlot::new(session)));

        assert_eq!(table.len(), 1);
        assert!(table.get(3).is_some());
        assert!(table.get(4).is_none());

        assert!(table.remove(3).is_some());
        assert!(table.remove(3).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_slot_advance_records_single_worker() {
        let ctx = context();
        let session = Session::new(1, Idle, "127.0.0.1:1".parse().unwrap(), &ctx);
        let slot = ConnectionSlot::new(session);

        assert_eq!(slot.advance(&ctx), Progress::Parked);
        assert_eq!(slot.advance(&ctx), Progress::Parked);
        assert_eq!(ctx.stats.peak_tasks_per_connection(), 1);
    }

    #[test]
    fn test_slot_release_once() {
        let ctx = context();
        let session = Session::new(1, Idle, "127.0.0.1:1".parse().unwrap(), &ctx);
        let slot = ConnectionSlot::new(session);

        assert!(slot.release());
        assert!(!slot.release());
        assert!(slot.with_session(|s| s.is_released()));
    }
}
