//! End-to-end sessions over a simulated path
//!
//! The simulated transport stamps replies with their modelled arrival time
//! and the clock is paused, so the estimates come out exact and the tests
//! run instantly.

use pairprobe::{
    logging::Logger,
    transport::{PathModel, SimulatedConnector},
    AppError, Config, Session,
};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const TARGET: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1));

/// 10 ms one-way and 100 kB/s: 100 and 1100 byte echoes take 22 and 42 ms
fn path() -> PathModel {
    PathModel::new(Duration::from_millis(10), 100_000.0)
}

fn config(count: u32) -> Config {
    Config {
        target: TARGET.to_string(),
        probe_sizes: vec![100, 1100],
        count: Some(count),
        duration_secs: None,
        interval_ms: 50,
        timeout_ms: 500,
        ..Config::default()
    }
}

fn session(config: &Config, connector: SimulatedConnector) -> Session {
    Session::new(config, TARGET, Arc::new(connector), Logger::new("E2E"))
}

#[tokio::test(start_paused = true)]
async fn test_session_recovers_latency_and_bandwidth() {
    let session = session(&config(10), SimulatedConnector::new(path()));
    session.run(CancellationToken::new()).await.unwrap();

    let report = session.statistics().unwrap();
    let aggregate = report.aggregate;

    assert_eq!(aggregate.samples, 10);
    assert_eq!(aggregate.rejected, 0);
    assert!((aggregate.bandwidth - 100_000.0).abs() < 1e-6, "bandwidth {}", aggregate.bandwidth);
    assert!((aggregate.latency_secs - 0.010).abs() < 1e-9, "latency {}", aggregate.latency_secs);
    assert_eq!(aggregate.rtt, Duration::from_millis(64));

    let seqs: Vec<u64> = report.per_sequence.iter().map(|s| s.seq).collect();
    assert_eq!(seqs, (1..=10).collect::<Vec<_>>());
    assert_eq!(session.packet_loss(), 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_foreign_replies_are_rejected() {
    let session = session(&config(5), SimulatedConnector::new(path()).with_foreign_replies());
    session.run(CancellationToken::new()).await.unwrap();

    let summaries = session.probe_summaries();
    assert!(summaries.iter().all(|s| s.foreign == 5), "{:?}", summaries);
    assert!(summaries.iter().all(|s| s.received == 5));

    let aggregate = session.statistics().unwrap().aggregate;
    assert_eq!(aggregate.samples, 5);
    assert!((aggregate.bandwidth - 100_000.0).abs() < 1e-6);
}

#[tokio::test(start_paused = true)]
async fn test_loss_is_reported() {
    let session = session(&config(8), SimulatedConnector::new(path().with_loss(0.25)));
    session.run(CancellationToken::new()).await.unwrap();

    for summary in session.probe_summaries() {
        assert_eq!(summary.sent, 8);
        assert_eq!(summary.received, 6);
        assert_eq!(summary.expired, 2);
        assert_eq!(summary.loss, 0.25);
    }
    assert_eq!(session.packet_loss(), 0.25);

    // Both probes drop the same sequence numbers, leaving six complete pairs
    assert_eq!(session.statistics().unwrap().aggregate.samples, 6);
}

#[tokio::test(start_paused = true)]
async fn test_total_loss_yields_no_data() {
    let session = session(&config(3), SimulatedConnector::new(path().with_loss(1.0)));
    session.run(CancellationToken::new()).await.unwrap();

    assert_eq!(session.packet_loss(), 1.0);
    assert!(matches!(session.statistics(), Err(AppError::NoData)));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_stops_promptly() {
    let config = Config {
        count: None,
        duration_secs: Some(3600),
        ..config(1)
    };
    let session = Arc::new(session(&config, SimulatedConnector::new(path())));
    let cancel = CancellationToken::new();

    let handle = tokio::spawn({
        let session = Arc::clone(&session);
        let cancel = cancel.clone();
        async move { session.run(cancel).await }
    });

    tokio::time::sleep(Duration::from_secs(1)).await;
    cancel.cancel();

    let result = tokio::time::timeout(Duration::from_millis(100), handle)
        .await
        .expect("session did not stop after cancellation")
        .unwrap();
    assert!(result.is_ok());

    let sent = session.probe_summaries()[0].sent;
    assert!((19..=21).contains(&sent), "sent {}", sent);
    assert!(session.statistics().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_failing_connector_is_a_setup_error() {
    let session = session(&config(5), SimulatedConnector::new(path()).failing());
    let result = session.run(CancellationToken::new()).await;

    assert!(matches!(result, Err(AppError::Setup(_))));
    assert!(session.probe_summaries().iter().all(|s| s.sent == 0));
}

#[tokio::test(start_paused = true)]
async fn test_failed_sends_are_not_counted_as_loss() {
    let session = session(&config(8), SimulatedConnector::new(path()).with_failed_sends(4));
    session.run(CancellationToken::new()).await.unwrap();

    for (summary, probe) in session.probe_summaries().iter().zip(session.probes()) {
        assert_eq!(summary.sent, 6);
        assert_eq!(summary.received, 6);
        assert_eq!(summary.expired, 0);
        assert_eq!(summary.loss, 0.0);
        assert_eq!(probe.counters().send_failures(), 2);
    }
    assert_eq!(session.packet_loss(), 0.0);
    assert_eq!(session.statistics().unwrap().aggregate.samples, 6);
}

#[tokio::test(start_paused = true)]
async fn test_statistics_while_running() {
    let session = Arc::new(session(&config(20), SimulatedConnector::new(path())));
    let handle = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.run(CancellationToken::new()).await }
    });

    let mut outcomes = Vec::new();
    while !handle.is_finished() {
        outcomes.push(session.statistics());
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    handle.await.unwrap().unwrap();

    assert!(matches!(outcomes.first(), Some(Err(AppError::NoData))));

    let reports: Vec<_> = outcomes
        .iter()
        .skip_while(|outcome| matches!(outcome, Err(AppError::NoData)))
        .map(|outcome| outcome.as_ref().expect("report once pairs exist"))
        .collect();
    assert!(!reports.is_empty(), "no report while the session was running");

    let mut last_samples = 0;
    for report in &reports {
        assert!(report.per_sequence.windows(2).all(|w| w[0].seq < w[1].seq));
        assert!(report.aggregate.samples >= last_samples);
        last_samples = report.aggregate.samples;
    }
    assert!(last_samples < 20);
    assert_eq!(session.statistics().unwrap().aggregate.samples, 20);
}
