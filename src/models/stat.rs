//! Derived per-sequence and aggregate results

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Latency/bandwidth estimate for one sequence number
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stat {
    /// Sequence number of the group this was computed from
    pub seq: u64,
    /// One-way latency in seconds; signed because noisy pairs can push it below zero
    pub latency_secs: f64,
    /// Bottleneck bandwidth in bytes per second
    pub bandwidth: f64,
    /// Sum of the group's round-trip times
    pub rtt: Duration,
}

impl Stat {
    pub fn latency_ms(&self) -> f64 {
        self.latency_secs * 1000.0
    }

    pub fn rtt_ms(&self) -> f64 {
        self.rtt.as_secs_f64() * 1000.0
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "seq={} latency={:.3}ms rtt={:.3}ms bandwidth={}",
            self.seq,
            self.latency_ms(),
            self.rtt_ms(),
            format_bandwidth(self.bandwidth)
        )
    }
}

/// Robust mean over a set of [`Stat`]s
///
/// Deliberately has no sequence field: it describes the whole session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateStat {
    /// Mean one-way latency in seconds
    pub latency_secs: f64,
    /// Mean bandwidth in bytes per second
    pub bandwidth: f64,
    /// Mean of the per-sequence RTT totals
    pub rtt: Duration,
    /// Number of stats that were averaged
    pub samples: usize,
    /// Number of stats dropped by sanitizing and outlier filtering
    pub rejected: usize,
}

impl AggregateStat {
    pub fn latency_ms(&self) -> f64 {
        self.latency_secs * 1000.0
    }

    pub fn rtt_ms(&self) -> f64 {
        self.rtt.as_secs_f64() * 1000.0
    }

    /// Latency as a duration, clamped at zero
    pub fn latency(&self) -> Duration {
        Duration::try_from_secs_f64(self.latency_secs).unwrap_or(Duration::ZERO)
    }
}

impl fmt::Display for AggregateStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "latency={:.3}ms rtt={:.3}ms bandwidth={} ({} pairs, {} rejected)",
            self.latency_ms(),
            self.rtt_ms(),
            format_bandwidth(self.bandwidth),
            self.samples,
            self.rejected
        )
    }
}

/// Human readable byte rate (decimal units, like `ping` and `iperf`)
pub fn format_bandwidth(bytes_per_sec: f64) -> String {
    format!("{}/s", format_bytes(bytes_per_sec))
}

/// Human readable byte count (decimal units)
pub fn format_bytes(bytes: f64) -> String {
    const UNITS: [&str; 5] = ["B", "kB", "MB", "GB", "TB"];

    if !bytes.is_finite() {
        return format!("{} B", bytes);
    }

    let mut value = bytes;
    let mut unit = 0;
    while value.abs() >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{:.0} {}", value, UNITS[unit])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512.0), "512 B");
        assert_eq!(format_bytes(1000.0), "1.0 kB");
        assert_eq!(format_bytes(12_500_000.0), "12.5 MB");
        assert_eq!(format_bandwidth(1_000_000_000.0), "1.0 GB/s");
    }

    #[test]
    fn test_negative_latency_clamps() {
        let aggregate = AggregateStat {
            latency_secs: -0.002,
            bandwidth: 10.0,
            rtt: Duration::from_millis(5),
            samples: 1,
            rejected: 0,
        };
        assert_eq!(aggregate.latency(), Duration::ZERO);
        assert!((aggregate.latency_ms() + 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_stat_display() {
        let stat = Stat {
            seq: 4,
            latency_secs: 0.012,
            bandwidth: 1000.0,
            rtt: Duration::from_millis(344),
        };
        let rendered = stat.to_string();
        assert!(rendered.contains("seq=4"));
        assert!(rendered.contains("latency=12.000ms"));
        assert!(rendered.contains("1.0 kB/s"));
    }
}
