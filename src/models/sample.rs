//! Observed round trips and their per-sequence grouping

use crate::types::ProbeIdentity;
use std::time::Duration;
use tokio::time::Instant;

/// One observed round trip
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Probe stream that produced this sample
    pub identity: ProbeIdentity,
    /// Sequence number, scoped to the probe
    pub seq: u64,
    /// Echo payload size in bytes
    pub size: usize,
    /// Round-trip time
    pub rtt: Duration,
    /// When the request left
    pub sent_at: Instant,
    /// When the reply came back
    pub received_at: Instant,
}

impl Sample {
    /// Build a sample from its two timestamps
    pub fn new(identity: ProbeIdentity, seq: u64, size: usize, sent_at: Instant, received_at: Instant) -> Self {
        Self {
            identity,
            seq,
            size,
            rtt: received_at.saturating_duration_since(sent_at),
            sent_at,
            received_at,
        }
    }
}

/// All samples sharing one sequence number across a session's probes
#[derive(Debug, Clone, PartialEq)]
pub struct SampleGroup {
    pub seq: u64,
    pub samples: Vec<Sample>,
}

impl SampleGroup {
    pub fn new(seq: u64) -> Self {
        Self {
            seq,
            samples: Vec::with_capacity(2),
        }
    }

    pub fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of different payload sizes in the group
    pub fn distinct_sizes(&self) -> usize {
        let mut sizes: Vec<usize> = self.samples.iter().map(|s| s.size).collect();
        sizes.sort_unstable();
        sizes.dedup();
        sizes.len()
    }

    /// A group can be estimated once it holds two distinct payload sizes
    pub fn is_pairable(&self) -> bool {
        self.distinct_sizes() >= 2
    }

    /// Arrival time of the earliest reply in the group
    pub fn first_received(&self) -> Option<Instant> {
        self.samples.iter().map(|s| s.received_at).min()
    }
}
