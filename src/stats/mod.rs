//! Statistical engine: pair estimation, robust aggregation and reporting

pub mod estimator;
pub mod report;


pub use estimator::{estimate, estimate_all, estimate_pair, PairEstimate};
pub use report::{Report, Reporter};

use crate::error::{AppError, Result};
use crate::models::{AggregateStat, Stat};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::time::Duration;

/// Scale factor turning a MAD into a standard-deviation estimate for normal data
const MAD_CONSISTENCY: f64 = 0.6745;

/// Methods for rejecting outlying bandwidth estimates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OutlierMethod {
    /// Modified Z-score using median absolute deviation
    ModifiedZScore { threshold: f64 },
    /// Interquartile range fences (`multiplier` × IQR)
    Iqr { multiplier: f64 },
    /// Keep everything
    None,
}

impl Default for OutlierMethod {
    fn default() -> Self {
        OutlierMethod::ModifiedZScore { threshold: 3.5 }
    }
}

impl OutlierMethod {
    /// Apply the method to a set of stats, keyed on bandwidth
    pub fn filter(&self, stats: &[Stat]) -> Vec<Stat> {
        match *self {
            OutlierMethod::ModifiedZScore { threshold } => mad_filter(stats, threshold),
            OutlierMethod::Iqr { multiplier } => iqr_filter(stats, multiplier),
            OutlierMethod::None => stats.to_vec(),
        }
    }
}

impl fmt::Display for OutlierMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutlierMethod::ModifiedZScore { threshold } => write!(f, "MAD (z < {})", threshold),
            OutlierMethod::Iqr { multiplier } => write!(f, "IQR (k = {})", multiplier),
            OutlierMethod::None => write!(f, "none"),
        }
    }
}

/// Percentile of an ascending slice by linear interpolation between ranks
pub fn percentile(sorted_values: &[f64], percentile: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }

    let index = (percentile / 100.0) * (sorted_values.len() as f64 - 1.0);
    let lower_index = index.floor() as usize;
    let upper_index = index.ceil() as usize;

    if lower_index == upper_index {
        sorted_values[lower_index]
    } else {
        let lower_value = sorted_values[lower_index];
        let upper_value = sorted_values[upper_index];
        let weight = index - lower_index as f64;
        lower_value + weight * (upper_value - lower_value)
    }
}

fn sorted(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut values: Vec<f64> = values.collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    values
}

/// Median of an unordered set of values
pub fn median(values: &[f64]) -> f64 {
    percentile(&sorted(values.iter().copied()), 50.0)
}

/// First and third quartiles of an ascending slice
///
/// Q1 and Q3 are the medians of the lower and upper halves; an odd middle
/// element belongs to neither half.
pub fn quartiles(sorted_values: &[f64]) -> (f64, f64) {
    let n = sorted_values.len();
    if n < 2 {
        let only = sorted_values.first().copied().unwrap_or(0.0);
        return (only, only);
    }

    let lower = &sorted_values[..n / 2];
    let upper = &sorted_values[(n + 1) / 2..];
    (percentile(lower, 50.0), percentile(upper, 50.0))
}

/// Keep stats with a finite, strictly positive bandwidth, preserving order
pub fn sanitize(stats: &[Stat]) -> Vec<Stat> {
    stats
        .iter()
        .filter(|s| s.bandwidth.is_finite() && s.bandwidth > 0.0)
        .copied()
        .collect()
}

/// Modified Z-score filter on bandwidth
///
/// A zero MAD means at least half the values are identical; nothing is
/// rejected in that case.
pub fn mad_filter(stats: &[Stat], threshold: f64) -> Vec<Stat> {
    if stats.is_empty() {
        return Vec::new();
    }

    let bandwidths: Vec<f64> = stats.iter().map(|s| s.bandwidth).collect();
    let med = median(&bandwidths);
    let mad = median(&bandwidths.iter().map(|b| (b - med).abs()).collect::<Vec<_>>());

    if mad == 0.0 {
        return stats.to_vec();
    }

    stats
        .iter()
        .filter(|s| MAD_CONSISTENCY * (s.bandwidth - med).abs() / mad < threshold)
        .copied()
        .collect()
}

/// Interquartile range filter on bandwidth, fences inclusive
pub fn iqr_filter(stats: &[Stat], multiplier: f64) -> Vec<Stat> {
    if stats.is_empty() {
        return Vec::new();
    }

    let bandwidths = sorted(stats.iter().map(|s| s.bandwidth));
    let (q1, q3) = quartiles(&bandwidths);
    let iqr = q3 - q1;

    let lower_bound = q1 - multiplier * iqr;
    let upper_bound = q3 + multiplier * iqr;

    stats
        .iter()
        .filter(|s| s.bandwidth >= lower_bound && s.bandwidth <= upper_bound)
        .copied()
        .collect()
}

/// Arithmetic mean of latency, RTT and bandwidth
pub fn average(stats: &[Stat]) -> Result<AggregateStat> {
    if stats.is_empty() {
        return Err(AppError::NoData);
    }

    let n = stats.len() as f64;
    let latency_secs = stats.iter().map(|s| s.latency_secs).sum::<f64>() / n;
    let bandwidth = stats.iter().map(|s| s.bandwidth).sum::<f64>() / n;
    let rtt_total: Duration = stats.iter().map(|s| s.rtt).sum();
    let rtt = rtt_total / stats.len() as u32;

    Ok(AggregateStat {
        latency_secs,
        bandwidth,
        rtt,
        samples: stats.len(),
        rejected: 0,
    })
}

/// Sanitize, filter and average a batch of per-sequence stats
#[derive(Debug, Clone, Copy, Default)]
pub struct Aggregator {
    method: OutlierMethod,
}

impl Aggregator {
    pub fn new(method: OutlierMethod) -> Self {
        Self { method }
    }

    pub fn method(&self) -> OutlierMethod {
        self.method
    }

    /// Reduce `stats` to one robust [`AggregateStat`]
    ///
    /// Fails with [`AppError::NoData`] when nothing survives sanitizing and
    /// outlier rejection.
    pub fn process(&self, stats: &[Stat]) -> Result<AggregateStat> {
        if stats.is_empty() {
            return Err(AppError::NoData);
        }

        let sane = sanitize(stats);
        let kept = self.method.filter(&sane);

        let mut aggregate = average(&kept)?;
        aggregate.rejected = stats.len() - kept.len();
        Ok(aggregate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(bandwidth: f64, secs: u64) -> Stat {
        Stat {
            seq: 0,
            latency_secs: secs as f64,
            bandwidth,
            rtt: Duration::from_secs(secs),
        }
    }

    fn bandwidths(stats: &[Stat]) -> Vec<f64> {
        stats.iter().map(|s| s.bandwidth).collect()
    }

    fn spread() -> Vec<Stat> {
        [1.0, 31.0, 30.0, 35.0, 29.0, 100.0]
            .iter()
            .map(|&b| stat(b, 1))
            .collect()
    }

    #[test]
    fn test_percentile_calculation() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&values, 50.0), 3.0);
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 100.0), 5.0);
        assert_eq!(percentile(&values, 25.0), 2.0);
        assert_eq!(percentile(&[1.0, 2.0], 50.0), 1.5);
        assert_eq!(percentile(&[], 50.0), 0.0);
    }

    #[test]
    fn test_median_of_unsorted() {
        assert_eq!(median(&[5.0, 1.0, 3.0]), 3.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
    }

    #[test]
    fn test_sanitize_drops_non_positive_and_keeps_order() {
        let stats = vec![
            stat(-1.0, 1),
            stat(5.0, 2),
            stat(0.0, 3),
            stat(3.0, 4),
            stat(f64::INFINITY, 5),
            stat(f64::NAN, 6),
            stat(9.0, 7),
        ];
        assert_eq!(bandwidths(&sanitize(&stats)), vec![5.0, 3.0, 9.0]);
    }

    #[test]
    fn test_mad_filter_removes_extremes() {
        assert_eq!(bandwidths(&mad_filter(&spread(), 3.5)), vec![31.0, 30.0, 35.0, 29.0]);
    }

    #[test]
    fn test_iqr_filter_removes_extremes() {
        assert_eq!(bandwidths(&iqr_filter(&spread(), 1.5)), vec![31.0, 30.0, 35.0, 29.0]);
    }

    #[test]
    fn test_quartiles_split_halves() {
        assert_eq!(quartiles(&[10.0, 11.0, 12.0, 13.0, 20.0]), (10.5, 16.5));
        assert_eq!(quartiles(&[1.0, 29.0, 30.0, 31.0, 35.0, 100.0]), (29.0, 35.0));
        assert_eq!(quartiles(&[4.0, 8.0]), (4.0, 8.0));
        assert_eq!(quartiles(&[7.0]), (7.0, 7.0));
    }

    #[test]
    fn test_iqr_filter_odd_count_keeps_upper_value() {
        // fences are [1.5, 25.5]; interpolated quartiles would drop 20
        let stats: Vec<Stat> = [10.0, 11.0, 12.0, 13.0, 20.0].iter().map(|&b| stat(b, 1)).collect();
        assert_eq!(iqr_filter(&stats, 1.5), stats);

        // Q1 = 11, Q3 = 15, upper fence 21
        let with_outlier: Vec<Stat> = [10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 60.0]
            .iter()
            .map(|&b| stat(b, 1))
            .collect();
        assert_eq!(
            bandwidths(&iqr_filter(&with_outlier, 1.5)),
            vec![10.0, 11.0, 12.0, 13.0, 14.0, 15.0]
        );
    }

    #[test]
    fn test_mad_filter_identical_values_is_noop() {
        let stats: Vec<Stat> = (0..6).map(|_| stat(42.0, 1)).collect();
        assert_eq!(mad_filter(&stats, 3.5), stats);
    }

    #[test]
    fn test_none_method_keeps_everything() {
        assert_eq!(OutlierMethod::None.filter(&spread()), spread());
    }

    #[test]
    fn test_average() {
        let stats: Vec<Stat> = (1..=5).map(|i| stat(i as f64, i)).collect();
        let aggregate = average(&stats).unwrap();
        assert_eq!(aggregate.bandwidth, 3.0);
        assert_eq!(aggregate.latency_secs, 3.0);
        assert_eq!(aggregate.rtt, Duration::from_secs(3));
        assert_eq!(aggregate.samples, 5);
    }

    #[test]
    fn test_process_stats() {
        let stats = vec![
            stat(-30.0, 0),
            stat(1.0, 0),
            stat(100.0, 0),
            stat(30.0, 1),
            stat(31.0, 2),
            stat(29.0, 3),
            stat(32.0, 4),
            stat(33.0, 5),
        ];

        let aggregate = Aggregator::default().process(&stats).unwrap();
        assert_eq!(aggregate.bandwidth, 31.0);
        assert_eq!(aggregate.latency_secs, 3.0);
        assert_eq!(aggregate.rtt, Duration::from_secs(3));
        assert_eq!(aggregate.samples, 5);
        assert_eq!(aggregate.rejected, 3);
    }

    #[test]
    fn test_process_empty_is_no_data() {
        let result = Aggregator::default().process(&[]);
        assert!(matches!(result, Err(AppError::NoData)));
    }

    #[test]
    fn test_process_all_insane_is_no_data() {
        let stats = vec![stat(-1.0, 1), stat(0.0, 1)];
        let result = Aggregator::new(OutlierMethod::Iqr { multiplier: 1.5 }).process(&stats);
        assert!(matches!(result, Err(AppError::NoData)));
    }

    #[test]
    fn test_default_method_is_mad() {
        assert_eq!(OutlierMethod::default(), OutlierMethod::ModifiedZScore { threshold: 3.5 });
        assert_eq!(Aggregator::default().method(), OutlierMethod::default());
    }
}
