//! Echo transports used by the probe driver
//!
//! A [`Connector`] opens one [`Transport`] per probe. Transports send echo
//! requests carrying a caller-chosen identifier and sequence, and hand back
//! whatever replies they see; validating and matching those replies is the
//! driver's job.

pub mod icmp;
pub mod simulated;

pub use icmp::IcmpConnector;
pub use simulated::{PathModel, SimulatedConnector};

use crate::error::{Result, TransportError};
use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;

/// An echo reply as seen on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    pub identifier: u16,
    pub sequence: u16,
    /// Payload size in bytes
    pub size: usize,
    pub received_at: Instant,
}

/// Sends echo requests and yields echo replies
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transmit one echo request, returning the send timestamp
    async fn send(
        &self,
        target: IpAddr,
        identifier: u16,
        sequence: u16,
        payload: &[u8],
    ) -> std::result::Result<Instant, TransportError>;

    /// Wait for the next reply until `deadline`
    ///
    /// Must be cancel-safe: dropping the future loses no reply.
    async fn receive(&self, deadline: Instant) -> std::result::Result<Reply, TransportError>;
}

/// Opens transports towards a target
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a transport; failures here are setup errors
    async fn open(&self, target: IpAddr, timeout: Duration) -> Result<Arc<dyn Transport>>;

    /// Short name for logs and the run header
    fn name(&self) -> &'static str;
}

type ReplyResult = std::result::Result<Reply, TransportError>;

/// Channel of replies produced by background tasks
///
/// Both transports complete requests on spawned tasks and funnel the outcome
/// through here, which gives `receive` its cancel safety for free.
#[derive(Debug)]
pub(crate) struct ReplyQueue {
    tx: mpsc::UnboundedSender<ReplyResult>,
    rx: Mutex<mpsc::UnboundedReceiver<ReplyResult>>,
}

impl ReplyQueue {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    pub(crate) fn sender(&self) -> mpsc::UnboundedSender<ReplyResult> {
        self.tx.clone()
    }

    pub(crate) async fn next(&self, deadline: Instant) -> ReplyResult {
        let mut rx = self.rx.lock().await;
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Some(reply)) => reply,
            Ok(None) => Err(TransportError::Closed),
            Err(_) => Err(TransportError::Timeout),
        }
    }
}
