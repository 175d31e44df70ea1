//! Counter stubs for service monitoring

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics handle for recording counters
#[derive(Debug, Default)]
pub struct Metrics {
    requests_accepted: AtomicU64,
    requests_verified: AtomicU64,
    requests_flagged: AtomicU64,
    requests_skipped: AtomicU64,
    requests_failed: AtomicU64,
    messages_dead_lettered: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_accepted(&self) {
        self.requests_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_verified(&self) {
        self.requests_verified.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_flagged(&self) {
        self.requests_flagged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_skipped(&self) {
        self.requests_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_failed(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_dead_lettered(&self) {
        self.messages_dead_lettered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_accepted: self.requests_accepted.load(Ordering::Relaxed),
            requests_verified: self.requests_verified.load(Ordering::Relaxed),
            requests_flagged: self.requests_flagged.load(Ordering::Relaxed),
            requests_skipped: self.requests_skipped.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            messages_dead_lettered: self.messages_dead_lettered.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub requests_accepted: u64,
    pub requests_verified: u64,
    pub requests_flagged: u64,
    pub requests_skipped: u64,
    pub requests_failed: u64,
    pub messages_dead_lettered: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = Metrics::new();
        metrics.request_accepted();
        metrics.request_accepted();
        metrics.request_flagged();
        metrics.message_dead_lettered();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests_accepted, 2);
        assert_eq!(snapshot.requests_flagged, 1);
        assert_eq!(snapshot.requests_verified, 0);
        assert_eq!(snapshot.messages_dead_lettered, 1);
    }
}
