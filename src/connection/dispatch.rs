//! Per-connection dispatch guard.
//!
//! Edge-triggered readiness fires once per transition, so the reactor must not
//! drop an edge that arrives while a worker is already busy with the
//! connection. Nor may it hand the connection to a second worker. The guard
//! is a three-state atomic:
//!
//! ```text
//!            try_claim()                    edge while running
//!   IDLE ───────────────────> RUNNING ─────────────────────────> NOTIFIED
//!    ▲                          │  ▲                                │
//!    │        finish() == true  │  │   finish() == false (run again)│
//!    └──────────────────────────┘  └────────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicU8, Ordering};

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const NOTIFIED: u8 = 2;

/// Ensures at most one task per connection is in flight.
#[derive(Debug, Default)]
pub struct DispatchState {
    state: AtomicU8,
}

impl DispatchState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called by the reactor on a readiness edge.
    ///
    /// Returns true if the caller must submit a task. Returns false if a
    /// worker already owns the connection; that worker will run again.
    pub fn try_claim(&self) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            let next = if current == IDLE { RUNNING } else { NOTIFIED };
            match self
                .state
                .compare_exchange(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return current == IDLE,
                Err(actual) => current = actual,
            }
        }
    }

    /// Called by the worker once the connection has parked.
    ///
    /// Returns true if the connection went back to idle. Returns false if an
    /// edge arrived meanwhile; the worker still owns the connection and must
    /// advance it again.
    pub fn finish(&self) -> bool {
        match self
            .state
            .compare_exchange(RUNNING, IDLE, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => true,
            Err(_) => {
                self.state.store(RUNNING, Ordering::Release);
                false
            }
        }
    }

    /// Returns true while a worker owns the connection.
    pub fn is_claimed(&self) -> bool {
        self.state.load(Ordering::Acquire) != IDLE
    }
}
