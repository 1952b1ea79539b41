//! Probe driver: paced senders, matching receivers
//!
//! Every probe gets one transport and two tasks. The sender emits echo
//! requests on a fixed interval and tells its receiver what it sent; the
//! receiver validates replies, matches them to outstanding requests and
//! records samples. All tasks stop on the shared cancellation token.

pub mod probe;

pub use probe::{packet_loss, Probe, ProbeCounters, ProbeSummary};

use crate::error::{AppError, Result, TransportError};
use crate::logging::Logger;
use crate::models::Sample;
use crate::recorder::Recorder;
use crate::transport::{Connector, Reply, Transport};
use futures::future::join_all;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// A request the sender has put on the wire
#[derive(Debug, Clone, Copy)]
struct InFlight {
    seq: u64,
    wire_seq: u16,
    sent_at: Instant,
}

/// Sequence number carried in the echo header
fn wire_sequence(seq: u64) -> u16 {
    (seq & 0xffff) as u16
}

/// Runs a set of probes against one target
pub struct ProbeDriver {
    connector: Arc<dyn Connector>,
    recorder: Arc<Recorder>,
    logger: Logger,
}

impl ProbeDriver {
    pub fn new(connector: Arc<dyn Connector>, recorder: Arc<Recorder>, logger: Logger) -> Self {
        Self {
            connector,
            recorder,
            logger,
        }
    }

    /// Drive every probe until it finishes or `cancel` fires
    ///
    /// All transports are opened before any request is sent; the first
    /// failure aborts the run with a setup error.
    pub async fn run(&self, target: IpAddr, probes: &[Probe], cancel: CancellationToken) -> Result<()> {
        let mut transports = Vec::with_capacity(probes.len());
        for probe in probes {
            match self.connector.open(target, probe.timeout).await {
                Ok(transport) => transports.push(transport),
                Err(e) => {
                    self.logger
                        .error(&format!("Cannot open {} transport: {}", self.connector.name(), e))
                        .probe(&probe.identity, probe.size)
                        .error_info(&e)
                        .log()
                        .await;
                    return Err(e);
                }
            }
        }

        self.logger
            .info(&format!("Probing {} with {} streams", target, probes.len()))
            .field("transport", self.connector.name())
            .log()
            .await;

        let mut tasks = Vec::with_capacity(probes.len() * 2);
        for (probe, transport) in probes.iter().zip(transports) {
            let (tx, rx) = mpsc::unbounded_channel();

            tasks.push(tokio::spawn(run_sender(
                probe.clone(),
                Arc::clone(&transport),
                target,
                tx,
                cancel.clone(),
                self.logger.clone(),
            )));
            tasks.push(tokio::spawn(run_receiver(
                probe.clone(),
                transport,
                rx,
                Arc::clone(&self.recorder),
                cancel.clone(),
                self.logger.clone(),
            )));
        }

        for outcome in join_all(tasks).await {
            outcome.map_err(|e| AppError::internal(format!("probe task failed: {}", e)))?;
        }

        for probe in probes {
            let summary = probe.summary();
            self.logger
                .info("Probe finished")
                .probe(&probe.identity, probe.size)
                .field("sent", summary.sent)
                .field("received", summary.received)
                .field("foreign", summary.foreign)
                .field("send_failures", probe.counters().send_failures())
                .field("loss", summary.loss)
                .log()
                .await;
        }

        Ok(())
    }
}

async fn run_sender(
    probe: Probe,
    transport: Arc<dyn Transport>,
    target: IpAddr,
    records: mpsc::UnboundedSender<InFlight>,
    cancel: CancellationToken,
    logger: Logger,
) {
    let payload = probe.payload();
    let identifier = probe.identity.icmp_identifier();
    let started = Instant::now();
    let mut ticker = tokio::time::interval(probe.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut seq: u64 = 0;

    loop {
        if probe.count.is_some_and(|count| seq >= u64::from(count)) {
            break;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if probe.duration.is_some_and(|d| started.elapsed() >= d) {
            break;
        }

        seq += 1;
        let wire_seq = wire_sequence(seq);
        match transport.send(target, identifier, wire_seq, &payload).await {
            Ok(sent_at) => {
                probe.counters().record_sent();
                if records.send(InFlight { seq, wire_seq, sent_at }).is_err() {
                    break;
                }
            }
            Err(e) => {
                logger
                    .debug("Send failed")
                    .probe(&probe.identity, probe.size)
                    .field("seq", seq)
                    .transport_error(&e)
                    .log()
                    .await;
            }
        }
    }
}

/// Receiver-side bookkeeping for one probe
struct Matcher {
    probe: Probe,
    recorder: Arc<Recorder>,
    in_flight: HashMap<u16, InFlight>,
    /// Replies seen before the sender's record of the request
    early: Vec<Reply>,
    /// Send failures seen before the sender's record, with when they arrived
    failed: Vec<(u16, Instant)>,
}

impl Matcher {
    fn new(probe: Probe, recorder: Arc<Recorder>) -> Self {
        Self {
            probe,
            recorder,
            in_flight: HashMap::new(),
            early: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// Forget requests and early replies older than the timeout
    fn expire(&mut self, now: Instant) {
        let timeout = self.probe.timeout;
        let before = self.in_flight.len();
        self.in_flight
            .retain(|_, request| now.saturating_duration_since(request.sent_at) < timeout);
        let expired = (before - self.in_flight.len()) as u64;
        if expired > 0 {
            self.probe.counters().record_expired(expired);
        }
        self.early
            .retain(|reply| now.saturating_duration_since(reply.received_at) < timeout);
        self.failed
            .retain(|(_, seen_at)| now.saturating_duration_since(*seen_at) < timeout);
    }

    /// When the receiver must wake up next even if nothing arrives
    fn next_deadline(&self, now: Instant) -> Instant {
        self.in_flight
            .values()
            .map(|request| request.sent_at + self.probe.timeout)
            .min()
            .unwrap_or(now + self.probe.timeout)
    }

    fn on_record(&mut self, request: InFlight) -> Option<Sample> {
        if let Some(index) = self.failed.iter().position(|(seq, _)| *seq == request.wire_seq) {
            self.failed.swap_remove(index);
            self.probe.counters().record_send_failure();
            return None;
        }

        let position = self.early.iter().position(|reply| {
            reply.sequence == request.wire_seq && reply.received_at >= request.sent_at
        });
        match position {
            Some(index) => {
                let reply = self.early.swap_remove(index);
                self.complete(request, reply)
            }
            None => {
                self.in_flight.insert(request.wire_seq, request);
                None
            }
        }
    }

    /// `Err` carries the identifier of a reply that is not ours
    fn on_reply(&mut self, reply: Reply) -> std::result::Result<Option<Sample>, u16> {
        if reply.identifier != self.probe.identity.icmp_identifier() {
            self.probe.counters().record_foreign();
            return Err(reply.identifier);
        }

        match self.in_flight.remove(&reply.sequence) {
            Some(request) => Ok(self.complete(request, reply)),
            None => {
                self.early.push(reply);
                Ok(None)
            }
        }
    }

    /// A request the transport could not deliver is neither lost nor sent
    fn on_send_failed(&mut self, wire_seq: u16, now: Instant) {
        match self.in_flight.remove(&wire_seq) {
            Some(_) => self.probe.counters().record_send_failure(),
            None => self.failed.push((wire_seq, now)),
        }
    }

    fn complete(&mut self, request: InFlight, reply: Reply) -> Option<Sample> {
        let sample = Sample::new(
            self.probe.identity,
            request.seq,
            self.probe.size,
            request.sent_at,
            reply.received_at,
        );
        if sample.rtt > self.probe.timeout {
            self.probe.counters().record_expired(1);
            return None;
        }

        self.probe.counters().record_received();
        self.recorder.add_sample(sample.clone());
        Some(sample)
    }
}

async fn run_receiver(
    probe: Probe,
    transport: Arc<dyn Transport>,
    mut records: mpsc::UnboundedReceiver<InFlight>,
    recorder: Arc<Recorder>,
    cancel: CancellationToken,
    logger: Logger,
) {
    let identity = probe.identity;
    let size = probe.size;
    let mut matcher = Matcher::new(probe, recorder);
    let mut sender_done = false;

    loop {
        let now = Instant::now();
        matcher.expire(now);
        if sender_done && matcher.in_flight.is_empty() {
            break;
        }
        let deadline = matcher.next_deadline(now);

        let sample = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            record = records.recv(), if !sender_done => match record {
                Some(request) => matcher.on_record(request),
                None => {
                    sender_done = true;
                    None
                }
            },
            reply = transport.receive(deadline) => match reply {
                Ok(reply) => match matcher.on_reply(reply) {
                    Ok(sample) => sample,
                    Err(foreign) => {
                        logger
                            .trace("Dropped foreign reply")
                            .probe(&identity, size)
                            .field("foreign_id", foreign)
                            .log()
                            .await;
                        None
                    }
                },
                Err(TransportError::Timeout) => None,
                Err(TransportError::Closed) => break,
                Err(TransportError::SendFailed { sequence, reason }) => {
                    matcher.on_send_failed(sequence, Instant::now());
                    logger
                        .debug("Send failed")
                        .probe(&identity, size)
                        .field("wire_seq", sequence)
                        .field("detail", reason)
                        .log()
                        .await;
                    None
                }
                Err(e) => {
                    logger
                        .debug("Receive failed")
                        .probe(&identity, size)
                        .transport_error(&e)
                        .log()
                        .await;
                    None
                }
            },
        };

        if let Some(sample) = sample {
            logger.trace("Reply").probe(&identity, size).sample(&sample).log().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ProbeIdentity, SessionId};
    use crate::models::Config;
    use std::time::Duration;

    fn probe() -> Probe {
        let config = Config {
            timeout_ms: 100,
            ..Config::default()
        };
        Probe::new(ProbeIdentity::new(SessionId(10), 0), 64, &config)
    }

    fn reply(identifier: u16, sequence: u16, received_at: Instant) -> Reply {
        Reply {
            identifier,
            sequence,
            size: 64,
            received_at,
        }
    }

    #[test]
    fn test_wire_sequence_wraps() {
        assert_eq!(wire_sequence(1), 1);
        assert_eq!(wire_sequence(65_535), 65_535);
        assert_eq!(wire_sequence(65_536), 0);
        assert_eq!(wire_sequence(65_537), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_matcher_pairs_reply_with_request() {
        let recorder = Arc::new(Recorder::new());
        let mut matcher = Matcher::new(probe(), Arc::clone(&recorder));
        let sent_at = Instant::now();

        assert!(matcher.on_record(InFlight { seq: 1, wire_seq: 1, sent_at }).is_none());
        let sample = matcher
            .on_reply(reply(10, 1, sent_at + Duration::from_millis(20)))
            .unwrap()
            .unwrap();

        assert_eq!(sample.seq, 1);
        assert_eq!(sample.rtt, Duration::from_millis(20));
        assert_eq!(recorder.len(), 1);
        assert!(matcher.in_flight.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_matcher_rejects_foreign_identifier() {
        let recorder = Arc::new(Recorder::new());
        let probe = probe();
        let counters = Arc::clone(probe.counters());
        let mut matcher = Matcher::new(probe, Arc::clone(&recorder));
        let sent_at = Instant::now();

        matcher.on_record(InFlight { seq: 1, wire_seq: 1, sent_at });
        assert_eq!(matcher.on_reply(reply(11, 1, sent_at)), Err(11));
        assert_eq!(counters.foreign(), 1);
        assert!(recorder.is_empty());
        assert_eq!(matcher.in_flight.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_matcher_holds_early_reply() {
        let recorder = Arc::new(Recorder::new());
        let mut matcher = Matcher::new(probe(), recorder);
        let sent_at = Instant::now();

        assert_eq!(matcher.on_reply(reply(10, 7, sent_at + Duration::from_millis(5))), Ok(None));
        let sample = matcher.on_record(InFlight { seq: 7, wire_seq: 7, sent_at }).unwrap();
        assert_eq!(sample.rtt, Duration::from_millis(5));
        assert!(matcher.early.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_matcher_expires_and_drops_late_replies() {
        let recorder = Arc::new(Recorder::new());
        let probe = probe();
        let counters = Arc::clone(probe.counters());
        let mut matcher = Matcher::new(probe, Arc::clone(&recorder));
        let sent_at = Instant::now();

        matcher.on_record(InFlight { seq: 1, wire_seq: 1, sent_at });
        matcher.on_record(InFlight { seq: 2, wire_seq: 2, sent_at });
        assert_eq!(matcher.next_deadline(sent_at), sent_at + Duration::from_millis(100));

        // a reply slower than the timeout is not a sample
        assert_eq!(matcher.on_reply(reply(10, 2, sent_at + Duration::from_millis(150))), Ok(None));

        matcher.expire(sent_at + Duration::from_millis(100));
        assert!(matcher.in_flight.is_empty());
        assert_eq!(counters.expired(), 2);
        assert_eq!(counters.received(), 0);
        assert!(recorder.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_send_is_not_lost() {
        let recorder = Arc::new(Recorder::new());
        let probe = probe();
        let counters = Arc::clone(probe.counters());
        let mut matcher = Matcher::new(probe, recorder);
        let sent_at = Instant::now();

        // failure reported after the record
        counters.record_sent();
        matcher.on_record(InFlight { seq: 1, wire_seq: 1, sent_at });
        matcher.on_send_failed(1, sent_at + Duration::from_millis(1));

        // failure reported before the record
        counters.record_sent();
        matcher.on_send_failed(2, sent_at + Duration::from_millis(2));
        assert!(matcher.on_record(InFlight { seq: 2, wire_seq: 2, sent_at }).is_none());

        matcher.expire(sent_at + Duration::from_millis(500));
        assert!(matcher.in_flight.is_empty());
        assert!(matcher.failed.is_empty());
        assert_eq!(counters.sent(), 0);
        assert_eq!(counters.send_failures(), 2);
        assert_eq!(counters.expired(), 0);
    }
}
