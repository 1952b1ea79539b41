//! Packet-pair dispersion math
//!
//! Round trips are modelled as `rtt = 2L + 2·size/B`: the payload crosses the
//! bottleneck once on the way out and once on the way back. Two payload sizes
//! observed under the same sequence number therefore pin down both the
//! one-way latency `L` and the bottleneck bandwidth `B`.

use crate::models::{Sample, SampleGroup, Stat};
use std::time::Duration;

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// Latency/bandwidth implied by one pair of samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairEstimate {
    /// Bytes per second; negative when the larger payload came back faster
    pub bandwidth: f64,
    /// One-way latency in seconds
    pub latency_secs: f64,
}

/// Estimate from two samples, `small.size < large.size`
///
/// Inverted RTT ordering is not special-cased: the resulting negative (or
/// infinite) bandwidth is left for the aggregator to discard.
pub fn estimate_pair(small: &Sample, large: &Sample) -> PairEstimate {
    let size_delta = large.size as f64 - small.size as f64;
    let rtt_delta_nanos = large.rtt.as_nanos() as f64 - small.rtt.as_nanos() as f64;

    let bandwidth = 2.0 * size_delta * NANOS_PER_SEC / rtt_delta_nanos;
    let latency_secs = (large.rtt.as_secs_f64() - 2.0 * large.size as f64 / bandwidth) / 2.0;

    PairEstimate {
        bandwidth,
        latency_secs,
    }
}

/// Estimate one [`Stat`] from a sequence group
///
/// Samples are ordered by payload size and each consecutive pair of distinct
/// sizes contributes one estimate; bandwidth and latency are the means of
/// those. When a size shows up twice the first reply wins. Returns `None`
/// unless the group holds at least two distinct sizes.
pub fn estimate(group: &SampleGroup) -> Option<Stat> {
    let mut ordered: Vec<&Sample> = group.samples.iter().collect();
    // stable sort keeps arrival order among equal sizes
    ordered.sort_by_key(|s| s.size);
    ordered.dedup_by_key(|s| s.size);

    if ordered.len() < 2 {
        return None;
    }

    let pairs: Vec<PairEstimate> = ordered
        .windows(2)
        .map(|w| estimate_pair(w[0], w[1]))
        .collect();

    let n = pairs.len() as f64;
    let bandwidth = pairs.iter().map(|p| p.bandwidth).sum::<f64>() / n;
    let latency_secs = pairs.iter().map(|p| p.latency_secs).sum::<f64>() / n;
    let rtt: Duration = group.samples.iter().map(|s| s.rtt).sum();

    Some(Stat {
        seq: group.seq,
        latency_secs,
        bandwidth,
        rtt,
    })
}

/// Estimate every group, skipping those that cannot be paired
pub fn estimate_all(groups: &[SampleGroup]) -> Vec<Stat> {
    groups.iter().filter_map(estimate).collect()
}
