//! Worker Pool
//!
//! A fixed set of threads that pull [`Task`]s off a shared queue and run them
//! to completion, one at a time. Blocking work (socket I/O and, above all,
//! command execution) happens here so the reactor thread never stalls.
//!
//! ## Design
//!
//! ```text
//!  reactor ──submit()──> ┌───────────────────┐
//!                        │ TaskQueue         │
//!                        │ (crossbeam chan)  │
//!                        └─────────┬─────────┘
//!                                  │ pop() (blocking recv)
//!              ┌───────────────────┼───────────────────┐
//!              ▼                   ▼                   ▼
//!         worker-0            worker-1    ...     worker-N-1
//!     handler.handle()    handler.handle()    handler.handle()
//! ```
//!
//! The pool size bounds how many commands run at once. A pool saturated with
//! long-running commands delays every other queued task; there is no
//! preemption and no fairness between connections.
//!
//! On shutdown the stop flag is set and every worker is woken. A worker
//! finishes the task it already claimed and exits; tasks still queued are
//! dropped.

pub mod queue;

pub use queue::Task;

use crate::error::{Result, ServerError};
use queue::TaskQueue;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, trace};

/// Work a pool thread performs for each task.
pub trait TaskHandler: Send + Sync + 'static {
    fn handle(&self, task: Task);
}

/// Fixed-size pool of worker threads.
pub struct WorkerPool {
    queue: Arc<TaskQueue>,
    workers: Vec<JoinHandle<()>>,
    size: usize,
}

impl WorkerPool {
    /// Spawns `size` workers that feed tasks to `handler`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] for a zero-sized pool and
    /// [`ServerError::Spawn`] if a thread cannot be created; workers spawned
    /// before the failure are stopped.
    pub fn new(size: usize, handler: Arc<dyn TaskHandler>) -> Result<Self> {
        if size == 0 {
            return Err(ServerError::Config(
                "worker pool needs at least one thread".to_string(),
            ));
        }

        let mut pool = Self {
            queue: Arc::new(TaskQueue::new()),
            workers: Vec::with_capacity(size),
            size,
        };

        for index in 0..size {
            let name = format!("rexecd-worker-{}", index);
            let queue = Arc::clone(&pool.queue);
            let handler = Arc::clone(&handler);

            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || worker_loop(index, queue, handler))
                .map_err(|source| ServerError::Spawn { name, source })?;
            pool.workers.push(handle);
        }

        info!(workers = size, "Worker pool started");
        Ok(pool)
    }

    /// Enqueues a task and wakes one idle worker. Never blocks.
    pub fn submit(&self, task: Task) {
        if !self.queue.push(task) {
            trace!(conn = task.id, "Pool stopped, task dropped");
        }
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Tasks waiting for a worker.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Stops the pool and joins every worker. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.workers.is_empty() {
            return;
        }

        let dropped = self.queue.stop();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        info!(dropped_tasks = dropped, "Worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(index: usize, queue: Arc<TaskQueue>, handler: Arc<dyn TaskHandler>) {
    debug!(worker = index, "Worker started");
    while let Some(task) = queue.pop() {
        trace!(worker = index, conn = task.id, "Worker claimed task");
        handler.handle(task);
    }
    debug!(worker = index, "Worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Barrier, Mutex};
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<usize>>,
    }

    impl TaskHandler for Recorder {
        fn handle(&self, task: Task) {
            self.seen.lock().unwrap().push(task.id);
        }
    }

    fn wait_until(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    #[test]
    fn test_zero_workers_rejected() {
        let handler: Arc<dyn TaskHandler> = Arc::new(Recorder::default());
        assert!(matches!(
            WorkerPool::new(0, handler),
            Err(ServerError::Config(_))
        ));
    }

    #[test]
    fn test_single_worker_preserves_order() {
        let recorder = Arc::new(Recorder::default());
        let mut pool = WorkerPool::new(1, recorder.clone()).unwrap();
        assert_eq!(pool.size(), 1);

        for id in 0..20 {
            pool.submit(Task::new(id));
        }

        assert!(wait_until(Duration::from_secs(2), || {
            recorder.seen.lock().unwrap().len() == 20
        }));
        assert_eq!(*recorder.seen.lock().unwrap(), (0..20).collect::<Vec<_>>());

        pool.shutdown();
        pool.shutdown();
    }

    /// Blocks every worker on a barrier so the test can prove they run
    /// concurrently.
    struct Rendezvous {
        barrier: Barrier,
        done: AtomicUsize,
    }

    impl TaskHandler for Rendezvous {
        fn handle(&self, _task: Task) {
            self.barrier.wait();
            self.done.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_workers_run_in_parallel() {
        let handler = Arc::new(Rendezvous {
            barrier: Barrier::new(4),
            done: AtomicUsize::new(0),
        });
        let _pool = {
            let pool = WorkerPool::new(4, handler.clone()).unwrap();
            for id in 0..4 {
                pool.submit(Task::new(id));
            }
            pool
        };

        assert!(wait_until(Duration::from_secs(2), || {
            handler.done.load(Ordering::SeqCst) == 4
        }));
    }

    struct Slow {
        started: AtomicUsize,
        finished: AtomicUsize,
    }

    impl TaskHandler for Slow {
        fn handle(&self, _task: Task) {
            self.started.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(100));
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_shutdown_finishes_claimed_and_drops_queued() {
        let handler = Arc::new(Slow {
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        });
        let mut pool = WorkerPool::new(1, handler.clone()).unwrap();

        for id in 0..5 {
            pool.submit(Task::new(id));
        }
        assert!(wait_until(Duration::from_secs(1), || {
            handler.started.load(Ordering::SeqCst) == 1
        }));

        pool.shutdown();

        // The claimed task completed; the rest never started.
        assert_eq!(handler.started.load(Ordering::SeqCst), 1);
        assert_eq!(handler.finished.load(Ordering::SeqCst), 1);
        assert_eq!(pool.queued(), 0);

        // Submitting after shutdown is a silent no-op.
        pool.submit(Task::new(99));
        assert_eq!(pool.queued(), 0);
    }
}
