//! Probe streams and their counters

use crate::models::Config;
use crate::types::ProbeIdentity;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One stream of fixed-size echo requests
#[derive(Debug, Clone)]
pub struct Probe {
    pub identity: ProbeIdentity,
    /// Echo payload size in bytes
    pub size: usize,
    /// Stop after this many requests
    pub count: Option<u32>,
    /// Stop sending once this much time has passed
    pub duration: Option<Duration>,
    pub interval: Duration,
    /// How long a request may stay unanswered before it counts as lost
    pub timeout: Duration,
    counters: Arc<ProbeCounters>,
}

impl Probe {
    pub fn new(identity: ProbeIdentity, size: usize, config: &Config) -> Self {
        Self {
            identity,
            size,
            count: config.count,
            duration: config.duration(),
            interval: config.interval(),
            timeout: config.timeout(),
            counters: Arc::new(ProbeCounters::default()),
        }
    }

    /// Payload bytes: an incrementing pattern, like `ping`
    pub fn payload(&self) -> Vec<u8> {
        (0..self.size).map(|i| (i % 256) as u8).collect()
    }

    pub fn counters(&self) -> &Arc<ProbeCounters> {
        &self.counters
    }

    pub fn summary(&self) -> ProbeSummary {
        let sent = self.counters.sent();
        let received = self.counters.received();
        ProbeSummary {
            identity: self.identity,
            size: self.size,
            sent,
            received,
            foreign: self.counters.foreign(),
            expired: self.counters.expired(),
            loss: packet_loss(sent, received),
        }
    }
}

/// Lock-free counters updated by a probe's sender and receiver
#[derive(Debug, Default)]
pub struct ProbeCounters {
    sent: AtomicU64,
    received: AtomicU64,
    foreign: AtomicU64,
    expired: AtomicU64,
    send_failures: AtomicU64,
}

impl ProbeCounters {
    pub fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    /// A reply carrying someone else's identifier
    pub fn record_foreign(&self) {
        self.foreign.fetch_add(1, Ordering::Relaxed);
    }

    /// Requests given up on after the timeout
    pub fn record_expired(&self, n: u64) {
        self.expired.fetch_add(n, Ordering::Relaxed);
    }

    /// Take back a request counted as sent that never left the host
    pub fn record_send_failure(&self) {
        self.sent.fetch_sub(1, Ordering::Relaxed);
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn foreign(&self) -> u64 {
        self.foreign.load(Ordering::Relaxed)
    }

    pub fn expired(&self) -> u64 {
        self.expired.load(Ordering::Relaxed)
    }

    pub fn send_failures(&self) -> u64 {
        self.send_failures.load(Ordering::Relaxed)
    }
}

/// Point-in-time view of a probe's counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeSummary {
    pub identity: ProbeIdentity,
    pub size: usize,
    pub sent: u64,
    pub received: u64,
    pub foreign: u64,
    pub expired: u64,
    /// Fraction of requests left unanswered, 0.0..=1.0
    pub loss: f64,
}

/// `(sent − received) / sent`, or 0 when nothing was sent
pub fn packet_loss(sent: u64, received: u64) -> f64 {
    if sent == 0 {
        return 0.0;
    }
    sent.saturating_sub(received) as f64 / sent as f64
}
