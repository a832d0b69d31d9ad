//! The task handler the worker pool runs for every readiness event.

use crate::connection::{ConnectionTable, Progress, SessionContext};
use crate::pool::{Task, TaskHandler};
use crate::reactor::handle::ReactorHandle;
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::trace;

/// Looks up the connection for a task and advances it until it parks or
/// closes.
pub(crate) struct Dispatcher<S> {
    table: Arc<ConnectionTable<S>>,
    ctx: Arc<SessionContext>,
    reactor: ReactorHandle,
}

impl<S> Dispatcher<S> {
    pub(crate) fn new(
        table: Arc<ConnectionTable<S>>,
        ctx: Arc<SessionContext>,
        reactor: ReactorHandle,
    ) -> Self {
        Self {
            table,
            ctx,
            reactor,
        }
    }
}

impl<S: Read + Write + Send + 'static> TaskHandler for Dispatcher<S> {
    fn handle(&self, task: Task) {
        let Some(slot) = self.table.get(task.id) else {
            trace!(conn = task.id, "Task for released connection");
            return;
        };

        loop {
            match slot.advance(&self.ctx) {
                Progress::Closed => {
                    // The dispatch guard stays claimed, so no further task is
                    // ever created for this connection.
                    if slot.release() {
                        self.reactor.release(task.id);
                    }
                    return;
                }
                Progress::Parked => {
                    if slot.dispatch().finish() {
                        return;
                    }
                    trace!(conn = task.id, "Edge arrived while running, advancing again");
                }
            }
        }
    }
}
