//! Connection statistics shared by the reactor and every worker.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands handed to the executor
    pub commands_executed: AtomicU64,
    /// Handshakes rejected by the authenticator
    pub auth_failures: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
    /// Highest number of workers ever seen inside one connection at once
    pub peak_tasks_per_connection: AtomicUsize,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_executed(&self) {
        self.commands_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn auth_failed(&self) {
        self.auth_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Records how many workers are inside one connection right now.
    pub fn observe_concurrency(&self, in_flight: usize) {
        self.peak_tasks_per_connection.fetch_max(in_flight, Ordering::Relaxed);
    }

    /// Returns the highest per-connection concurrency observed so far.
    pub fn peak_tasks_per_connection(&self) -> usize {
        self.peak_tasks_per_connection.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_close_counters() {
        let stats = ConnectionStats::new();
        stats.connection_opened();
        stats.connection_opened();
        stats.connection_closed();

        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 2);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_peak_concurrency_keeps_maximum() {
        let stats = ConnectionStats::new();
        stats.observe_concurrency(1);
        stats.observe_concurrency(3);
        stats.observe_concurrency(2);
        assert_eq!(stats.peak_tasks_per_connection(), 3);
    }
}
