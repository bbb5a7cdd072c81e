//! Process-wide byte counters.
//!
//! Every read delivery and every write completion on an instrumented
//! endpoint adds to these totals. They are never reset.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Bytes received and sent across all instrumented connections.
#[derive(Debug, Default)]
pub struct ByteCounters {
    received: AtomicU64,
    sent: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterSnapshot {
    pub received: u64,
    pub sent: u64,
}

impl ByteCounters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record `n` bytes delivered by a read completion.
    pub fn record_received(&self, n: usize) {
        self.received.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// Record `n` bytes handed to the network by a write completion.
    pub fn record_sent(&self, n: usize) {
        self.sent.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            received: self.received(),
            sent: self.sent(),
        }
    }
}
