//! Thread-safe sample store pairing replies by sequence number
//!
//! Every probe stream of a session feeds the same [`Recorder`]. Samples are
//! grouped by sequence number; a group becomes pairable once it holds two
//! different payload sizes. Memory stays bounded: the recorder keeps at most
//! `capacity` groups and, when a retention horizon is set, forgets groups
//! whose first reply is older than the horizon.

use crate::models::{Sample, SampleGroup};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// Sliding window limits for the recorder
#[derive(Debug, Clone, Copy)]
pub struct RecorderConfig {
    /// Maximum number of sequence groups retained
    pub capacity: usize,
    /// Forget groups whose first reply is older than this
    pub retention: Option<Duration>,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            capacity: crate::defaults::DEFAULT_RECORDER_CAPACITY,
            retention: None,
        }
    }
}

#[derive(Debug, Default)]
struct RecorderState {
    groups: BTreeMap<u64, SampleGroup>,
    pairable: BTreeSet<u64>,
    evicted: u64,
}

impl RecorderState {
    fn evict(&mut self, seq: u64) {
        if self.groups.remove(&seq).is_some() {
            self.pairable.remove(&seq);
            self.evicted += 1;
        }
    }

    fn enforce_capacity(&mut self, capacity: usize) {
        while self.groups.len() > capacity {
            match self.groups.keys().next().copied() {
                Some(oldest) => self.evict(oldest),
                None => break,
            }
        }
    }

    fn enforce_retention(&mut self, horizon: Duration, now: Instant) {
        let expired: Vec<u64> = self
            .groups
            .iter()
            .filter(|(_, group)| {
                group
                    .first_received()
                    .is_some_and(|first| now.saturating_duration_since(first) > horizon)
            })
            .map(|(&seq, _)| seq)
            .collect();

        for seq in expired {
            self.evict(seq);
        }
    }
}

/// Session-scoped store of samples keyed by sequence number
#[derive(Debug, Default)]
pub struct Recorder {
    config: RecorderConfig,
    state: Mutex<RecorderState>,
}

impl Recorder {
    /// Create a recorder with the default window
    pub fn new() -> Self {
        Self::with_config(RecorderConfig::default())
    }

    /// Create a recorder with explicit window limits
    pub fn with_config(config: RecorderConfig) -> Self {
        Self {
            config: RecorderConfig {
                capacity: config.capacity.max(1),
                retention: config.retention,
            },
            state: Mutex::new(RecorderState::default()),
        }
    }

    // A panic while holding the lock cannot leave the map half-updated in a
    // way that matters to readers, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, RecorderState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a sample to the group for its sequence number
    pub fn add_sample(&self, sample: Sample) {
        let seq = sample.seq;
        let received_at = sample.received_at;

        let mut state = self.lock();

        let group = state.groups.entry(seq).or_insert_with(|| SampleGroup::new(seq));
        group.push(sample);
        if group.is_pairable() {
            state.pairable.insert(seq);
        }

        if let Some(horizon) = self.config.retention {
            state.enforce_retention(horizon, received_at);
        }
        state.enforce_capacity(self.config.capacity);
    }

    /// Copies of every pairable group, ascending by sequence number
    pub fn snapshot(&self) -> Vec<SampleGroup> {
        let state = self.lock();
        state
            .pairable
            .iter()
            .filter_map(|seq| state.groups.get(seq).cloned())
            .collect()
    }

    /// Number of groups currently held
    pub fn len(&self) -> usize {
        self.lock().groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().groups.is_empty()
    }

    /// Number of groups currently pairable
    pub fn pairable_len(&self) -> usize {
        self.lock().pairable.len()
    }

    /// Number of groups dropped by the sliding window so far
    pub fn evicted(&self) -> u64 {
        self.lock().evicted
    }

    /// Window limits in effect
    pub fn config(&self) -> RecorderConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ProbeIdentity, SessionId};
    use std::sync::Arc;

    fn sample_at(seq: u64, size: usize, rtt: Duration, sent: Instant) -> Sample {
        Sample::new(ProbeIdentity::new(SessionId(1), 0), seq, size, sent, sent + rtt)
    }

    fn sample(seq: u64, size: usize) -> Sample {
        sample_at(seq, size, Duration::from_millis(10), Instant::now())
    }

    #[test]
    fn test_first_sample() {
        let recorder = Recorder::new();
        recorder.add_sample(sample(1, 64));
        assert_eq!(recorder.len(), 1);
        assert_eq!(recorder.pairable_len(), 0);
        assert!(recorder.snapshot().is_empty());
    }

    #[test]
    fn test_two_sizes_same_sequence_become_pairable() {
        let recorder = Recorder::new();
        let first = sample(1, 64);
        let second = sample(1, 1024);
        recorder.add_sample(first.clone());
        recorder.add_sample(second.clone());

        assert_eq!(recorder.len(), 1);
        let snapshot = recorder.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].seq, 1);
        assert_eq!(snapshot[0].samples, vec![first, second]);
    }

    #[test]
    fn test_same_size_twice_is_not_pairable() {
        let recorder = Recorder::new();
        recorder.add_sample(sample(1, 64));
        recorder.add_sample(sample(1, 64));
        assert_eq!(recorder.len(), 1);
        assert_eq!(recorder.pairable_len(), 0);
    }

    #[test]
    fn test_different_sequences_stay_apart() {
        let recorder = Recorder::new();
        recorder.add_sample(sample(1, 64));
        recorder.add_sample(sample(2, 1024));
        assert_eq!(recorder.len(), 2);
        assert_eq!(recorder.pairable_len(), 0);
    }

    #[test]
    fn test_snapshot_is_sorted_and_detached() {
        let recorder = Recorder::new();
        for seq in [5, 3, 9] {
            recorder.add_sample(sample(seq, 64));
            recorder.add_sample(sample(seq, 512));
        }

        let snapshot = recorder.snapshot();
        let seqs: Vec<u64> = snapshot.iter().map(|g| g.seq).collect();
        assert_eq!(seqs, vec![3, 5, 9]);

        // later writes do not show up in an earlier snapshot
        recorder.add_sample(sample(3, 1400));
        assert_eq!(snapshot[0].len(), 2);
        assert_eq!(recorder.snapshot()[0].len(), 3);
    }

    #[test]
    fn test_concurrent_insertion() {
        let recorder = Arc::new(Recorder::new());
        let handles: Vec<_> = (1..=100u64)
            .map(|seq| {
                let recorder = Arc::clone(&recorder);
                std::thread::spawn(move || recorder.add_sample(sample(seq, 64)))
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(recorder.len(), 100);
        assert_eq!(recorder.evicted(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_insertion_from_tasks() {
        let recorder = Arc::new(Recorder::new());
        let tasks: Vec<_> = (1..=100u64)
            .map(|seq| {
                let recorder = Arc::clone(&recorder);
                tokio::spawn(async move {
                    recorder.add_sample(sample(seq, 64));
                    recorder.add_sample(sample(seq, 1024));
                })
            })
            .collect();

        for task in futures::future::join_all(tasks).await {
            task.unwrap();
        }

        let snapshot = recorder.snapshot();
        assert_eq!(snapshot.len(), 100);
        assert!(snapshot.iter().all(|g| g.len() == 2 && g.is_pairable()));
    }

    #[test]
    fn test_capacity_evicts_oldest_sequence() {
        let recorder = Recorder::with_config(RecorderConfig { capacity: 3, retention: None });
        for seq in 1..=5 {
            recorder.add_sample(sample(seq, 64));
            recorder.add_sample(sample(seq, 512));
        }

        assert_eq!(recorder.len(), 3);
        assert_eq!(recorder.evicted(), 2);
        let seqs: Vec<u64> = recorder.snapshot().iter().map(|g| g.seq).collect();
        assert_eq!(seqs, vec![3, 4, 5]);
    }

    #[test]
    fn test_retention_evicts_stale_groups() {
        let recorder = Recorder::with_config(RecorderConfig {
            capacity: 100,
            retention: Some(Duration::from_secs(10)),
        });
        let start = Instant::now();
        let rtt = Duration::from_millis(5);

        recorder.add_sample(sample_at(1, 64, rtt, start));
        recorder.add_sample(sample_at(1, 512, rtt, start));
        recorder.add_sample(sample_at(2, 64, rtt, start + Duration::from_secs(8)));
        assert_eq!(recorder.len(), 2);

        recorder.add_sample(sample_at(3, 64, rtt, start + Duration::from_secs(15)));
        assert_eq!(recorder.len(), 2);
        assert_eq!(recorder.evicted(), 1);
        assert_eq!(recorder.pairable_len(), 0);
    }
}
