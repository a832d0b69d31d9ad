//! Task queue shared by the reactor (producer) and the workers (consumers).
//!
//! An unbounded crossbeam channel carries pending tasks. Producers never
//! block; consumers sleep in `recv` while the channel is empty. A second
//! channel whose sender is dropped on stop wakes every sleeping consumer.

use crate::connection::ConnectionId;
use crossbeam_channel::{select, unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// "Connection `id` became ready." Consumed exactly once by a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Task {
    pub id: ConnectionId,
}

impl Task {
    pub fn new(id: ConnectionId) -> Self {
        Self { id }
    }
}

pub(crate) struct TaskQueue {
    tasks_tx: Sender<Task>,
    tasks_rx: Receiver<Task>,
    /// Dropped on stop; a closed channel wakes every consumer
    stop_tx: Mutex<Option<Sender<()>>>,
    stop_rx: Receiver<()>,
    stopped: AtomicBool,
}

impl TaskQueue {
    pub(crate) fn new() -> Self {
        let (tasks_tx, tasks_rx) = unbounded();
        let (stop_tx, stop_rx) = unbounded();
        Self {
            tasks_tx,
            tasks_rx,
            stop_tx: Mutex::new(Some(stop_tx)),
            stop_rx,
            stopped: AtomicBool::new(false),
        }
    }

    /// Enqueues a task and wakes one waiting consumer. Returns false if the
    /// queue has been stopped and the task was discarded.
    pub(crate) fn push(&self, task: Task) -> bool {
        if self.stopped.load(Ordering::Acquire) {
            return false;
        }
        self.tasks_tx.send(task).is_ok()
    }

    /// Blocks until a task is available. Returns `None` once stopped.
    pub(crate) fn pop(&self) -> Option<Task> {
        if self.stopped.load(Ordering::Acquire) {
            return None;
        }

        select! {
            recv(self.tasks_rx) -> task => match task {
                Ok(task) if !self.stopped.load(Ordering::Acquire) => Some(task),
                _ => None,
            },
            recv(self.stop_rx) -> _ => None,
        }
    }

    /// Stops the queue, wakes every consumer, and returns how many
    /// unclaimed tasks were dropped.
    pub(crate) fn stop(&self) -> usize {
        self.stopped.store(true, Ordering::Release);
        self.stop_tx.lock().unwrap().take();
        self.tasks_rx.try_iter().count()
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks_rx.len()
    }
}
