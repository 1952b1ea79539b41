//! In-process path model for dry runs and deterministic tests
//!
//! Replies come back after `2·latency + 2·size/bandwidth`, the same model the
//! estimator inverts, so a run over a simulated path should recover the
//! configured latency and bandwidth.

use super::{Connector, Reply, ReplyQueue, Transport};
use crate::error::{AppError, Result, TransportError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Latency, bottleneck bandwidth and loss of a simulated path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathModel {
    /// One-way latency
    pub latency: Duration,
    /// Bottleneck bandwidth in bytes per second
    pub bandwidth: f64,
    /// Fraction of requests that never get a reply, 0.0..=1.0
    pub loss: f64,
}

impl PathModel {
    pub fn new(latency: Duration, bandwidth: f64) -> Self {
        Self {
            latency,
            bandwidth,
            loss: 0.0,
        }
    }

    pub fn with_loss(mut self, loss: f64) -> Self {
        self.loss = loss;
        self
    }

    /// Round trip of a payload of `size` bytes
    pub fn rtt(&self, size: usize) -> Duration {
        let serialization_nanos = (2.0 * size as f64 / self.bandwidth * 1e9).round() as u64;
        2 * self.latency + Duration::from_nanos(serialization_nanos)
    }
}

impl FromStr for PathModel {
    type Err = AppError;

    /// Parse `LATENCY_MS:BYTES_PER_SEC[:LOSS]`
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        if !(2..=3).contains(&parts.len()) {
            return Err(AppError::parse(format!(
                "simulated path '{}' must look like LATENCY_MS:BYTES_PER_SEC[:LOSS]",
                s
            )));
        }

        let latency_ms: f64 = parts[0].trim().parse()?;
        let bandwidth: f64 = parts[1].trim().parse()?;
        let loss: f64 = match parts.get(2) {
            Some(loss) => loss.trim().parse()?,
            None => 0.0,
        };

        if !latency_ms.is_finite() || latency_ms < 0.0 {
            return Err(AppError::validation("simulated latency must be a non-negative number of milliseconds"));
        }
        if !bandwidth.is_finite() || bandwidth <= 0.0 {
            return Err(AppError::validation("simulated bandwidth must be positive"));
        }
        if !(0.0..=1.0).contains(&loss) {
            return Err(AppError::validation("simulated loss must be between 0 and 1"));
        }

        Ok(Self {
            latency: Duration::from_nanos((latency_ms * 1e6).round() as u64),
            bandwidth,
            loss,
        })
    }
}

impl fmt::Display for PathModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.3}ms one-way, {}",
            self.latency.as_secs_f64() * 1000.0,
            crate::models::format_bandwidth(self.bandwidth)
        )?;
        if self.loss > 0.0 {
            write!(f, ", {:.1}% loss", self.loss * 100.0)?;
        }
        Ok(())
    }
}

/// Opens [`PathModel`]-backed transports
#[derive(Debug, Clone)]
pub struct SimulatedConnector {
    path: PathModel,
    inject_foreign: bool,
    fail_open: bool,
    fail_every: Option<u32>,
}

impl SimulatedConnector {
    pub fn new(path: PathModel) -> Self {
        Self {
            path,
            inject_foreign: false,
            fail_open: false,
            fail_every: None,
        }
    }

    /// Also deliver a reply with a foreign identifier ahead of every real one
    pub fn with_foreign_replies(mut self) -> Self {
        self.inject_foreign = true;
        self
    }

    /// Fail every `every`-th send after accepting it, the way a socket
    /// reports an unreachable network only once the request is underway
    pub fn with_failed_sends(mut self, every: u32) -> Self {
        self.fail_every = Some(every.max(1));
        self
    }

    /// Make every `open` fail, like a socket without permission
    pub fn failing(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn path(&self) -> PathModel {
        self.path
    }
}

#[async_trait]
impl Connector for SimulatedConnector {
    async fn open(&self, _target: IpAddr, _timeout: Duration) -> Result<Arc<dyn Transport>> {
        if self.fail_open {
            return Err(AppError::setup("simulated socket refused to open"));
        }

        Ok(Arc::new(SimulatedTransport {
            path: self.path,
            inject_foreign: self.inject_foreign,
            fail_every: self.fail_every,
            sends: AtomicU32::new(0),
            loss_credit: Mutex::new(0.0),
            replies: ReplyQueue::new(),
        }))
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}

#[derive(Debug)]
struct SimulatedTransport {
    path: PathModel,
    inject_foreign: bool,
    fail_every: Option<u32>,
    sends: AtomicU32,
    /// Accumulated loss; a request is dropped each time it reaches one
    loss_credit: Mutex<f64>,
    replies: ReplyQueue,
}

impl SimulatedTransport {
    fn should_fail(&self) -> bool {
        let n = self.sends.fetch_add(1, Ordering::Relaxed) + 1;
        self.fail_every.is_some_and(|every| n % every == 0)
    }

    fn should_drop(&self) -> bool {
        let mut credit = self.loss_credit.lock().unwrap_or_else(|p| p.into_inner());
        *credit += self.path.loss;
        if *credit >= 1.0 {
            *credit -= 1.0;
            true
        } else {
            false
        }
    }

    /// Queue `reply` once its modelled arrival time has passed
    fn deliver_at(&self, reply: Reply) {
        let replies = self.replies.sender();
        tokio::spawn(async move {
            tokio::time::sleep_until(reply.received_at).await;
            let _ = replies.send(Ok(reply));
        });
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn send(
        &self,
        _target: IpAddr,
        identifier: u16,
        sequence: u16,
        payload: &[u8],
    ) -> std::result::Result<Instant, TransportError> {
        let sent_at = Instant::now();
        if self.should_fail() {
            let _ = self
                .replies
                .sender()
                .send(Err(TransportError::send_failed(sequence, "simulated network unreachable")));
            return Ok(sent_at);
        }

        let rtt = self.path.rtt(payload.len());
        let reply = Reply {
            identifier,
            sequence,
            size: payload.len(),
            received_at: sent_at + rtt,
        };

        if self.inject_foreign {
            self.deliver_at(Reply {
                identifier: identifier ^ 0x8000,
                received_at: sent_at + rtt / 2,
                ..reply
            });
        }

        if !self.should_drop() {
            self.deliver_at(reply);
        }

        Ok(sent_at)
    }

    async fn receive(&self, deadline: Instant) -> std::result::Result<Reply, TransportError> {
        self.replies.next(deadline).await
    }
}
