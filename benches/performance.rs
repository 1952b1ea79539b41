//! Performance benchmarks for the estimation pipeline

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use pairprobe::{
    models::{Sample, SampleGroup, Stat},
    recorder::{Recorder, RecorderConfig},
    stats::{estimate_all, Aggregator, OutlierMethod},
    types::{ProbeIdentity, SessionId},
};
use std::hint::black_box;
use std::time::Duration;
use tokio::time::Instant;

const SIZES: [usize; 2] = [56, 1472];

/// Samples of a 10 ms, 1 MB/s path with a little deterministic jitter
fn create_samples(groups: u64) -> Vec<Sample> {
    let base = Instant::now();
    let session = SessionId(0x1234);

    (0..groups)
        .flat_map(|seq| {
            SIZES.iter().enumerate().map(move |(index, &size)| {
                let jitter = Duration::from_micros((seq * 37 + index as u64 * 11) % 400);
                let rtt = Duration::from_millis(20) + Duration::from_nanos(2 * size as u64 * 1000) + jitter;
                let sent_at = base + Duration::from_millis(seq * 10);
                Sample::new(ProbeIdentity::new(session, index as u16), seq, size, sent_at, sent_at + rtt)
            })
        })
        .collect()
}

fn create_groups(groups: u64) -> Vec<SampleGroup> {
    let recorder = Recorder::with_config(RecorderConfig {
        capacity: groups as usize,
        retention: None,
    });
    for sample in create_samples(groups) {
        recorder.add_sample(sample);
    }
    recorder.snapshot()
}

fn create_stats(count: u64) -> Vec<Stat> {
    estimate_all(&create_groups(count))
}

fn benchmark_estimation(c: &mut Criterion) {
    let mut group = c.benchmark_group("estimate_all");
    for size in [100, 1_000, 10_000] {
        let groups = create_groups(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &groups, |b, groups| {
            b.iter(|| estimate_all(black_box(groups)))
        });
    }
    group.finish();
}

fn benchmark_aggregation(c: &mut Criterion) {
    let stats = create_stats(4_096);
    let mut group = c.benchmark_group("aggregate");

    for method in [
        OutlierMethod::default(),
        OutlierMethod::Iqr { multiplier: 1.5 },
        OutlierMethod::None,
    ] {
        let aggregator = Aggregator::new(method);
        group.bench_with_input(BenchmarkId::from_parameter(method), &stats, |b, stats| {
            b.iter(|| aggregator.process(black_box(stats)))
        });
    }
    group.finish();
}

fn benchmark_recording(c: &mut Criterion) {
    let samples = create_samples(4_096);

    c.bench_function("recorder_add_sample", |b| {
        b.iter(|| {
            let recorder = Recorder::new();
            for sample in &samples {
                recorder.add_sample(black_box(sample.clone()));
            }
            recorder.pairable_len()
        })
    });
}

criterion_group!(benches, benchmark_estimation, benchmark_aggregation, benchmark_recording);
criterion_main!(benches);
