//! Per-connection bookkeeping.
//!
//! # Responsibilities
//! - Number connections so their log lines can be correlated
//! - Keep the open-connection count (and its gauge) current
//! - Log how long each connection stayed open

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::observability::metrics;

static NEXT_CONNECTION: AtomicU64 = AtomicU64::new(1);

/// Process-wide sequence number of an accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Default)]
struct Counts {
    open: AtomicU64,
    accepted: AtomicU64,
}

/// Shared open/accepted counters for the server's connections.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    counts: Arc<Counts>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection from `peer`. It counts as open until the guard drops.
    pub fn open(&self, peer: SocketAddr) -> ConnectionGuard {
        self.counts.accepted.fetch_add(1, Ordering::Relaxed);
        let open = self.counts.open.fetch_add(1, Ordering::AcqRel) + 1;
        metrics::set_active_connections(open);

        ConnectionGuard {
            counts: Arc::clone(&self.counts),
            id: ConnectionId::next(),
            peer,
            opened_at: Instant::now(),
        }
    }

    /// Connections currently open.
    pub fn open_count(&self) -> u64 {
        self.counts.open.load(Ordering::Acquire)
    }

    /// Connections accepted since the tracker was created.
    pub fn accepted_count(&self) -> u64 {
        self.counts.accepted.load(Ordering::Relaxed)
    }
}

/// An open connection; closing is recorded on drop.
#[derive(Debug)]
pub struct ConnectionGuard {
    counts: Arc<Counts>,
    id: ConnectionId,
    peer: SocketAddr,
    opened_at: Instant,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let open = self.counts.open.fetch_sub(1, Ordering::AcqRel).saturating_sub(1);
        metrics::set_active_connections(open);
        tracing::trace!(
            connection_id = %self.id,
            peer = %self.peer,
            open_ms = self.opened_at.elapsed().as_millis() as u64,
            "Connection closed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn ids_increase() {
        let tracker = ConnectionTracker::new();
        let first = tracker.open(peer(1));
        let second = tracker.open(peer(2));
        assert!(second.id() > first.id());
        assert!(first.id().to_string().starts_with("conn-"));
        assert_eq!(second.peer(), peer(2));
    }

    #[test]
    fn open_count_follows_guards() {
        let tracker = ConnectionTracker::new();
        let guards: Vec<_> = (0..3).map(|i| tracker.open(peer(i))).collect();
        assert_eq!(tracker.open_count(), 3);

        let clone = tracker.clone();
        drop(guards);
        assert_eq!(clone.open_count(), 0);
        assert_eq!(clone.accepted_count(), 3);
    }
}
