//! ICMP echo transport over `surge-ping`

use super::{Connector, Reply, ReplyQueue, Transport};
use crate::error::{AppError, Result, TransportError};
use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use surge_ping::{Client, Config, IcmpPacket, PingIdentifier, PingSequence, SurgeError, ICMP};
use tokio::time::Instant;

/// Opens raw (or datagram, where the OS allows it) ICMP sockets
#[derive(Debug, Clone, Default)]
pub struct IcmpConnector {
    bind: Option<IpAddr>,
}

impl IcmpConnector {
    pub fn new(bind: Option<IpAddr>) -> Self {
        Self { bind }
    }

    /// Socket configuration for the target's address family
    fn client_config(&self, target: IpAddr) -> Result<Config> {
        let kind = match target {
            IpAddr::V4(_) => ICMP::V4,
            IpAddr::V6(_) => ICMP::V6,
        };

        let bind = match (self.bind, target) {
            (Some(addr), target) if addr.is_ipv4() != target.is_ipv4() => {
                return Err(AppError::setup(format!(
                    "bind address {} and target {} are different address families",
                    addr, target
                )));
            }
            (Some(addr), _) => addr,
            (None, IpAddr::V4(_)) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            (None, IpAddr::V6(_)) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };

        Ok(Config::builder()
            .kind(kind)
            .bind(SocketAddr::new(bind, 0))
            .build())
    }
}

#[async_trait]
impl Connector for IcmpConnector {
    async fn open(&self, target: IpAddr, timeout: Duration) -> Result<Arc<dyn Transport>> {
        let config = self.client_config(target)?;
        let client = Client::new(&config)
            .map_err(|e| AppError::setup(format!("cannot open ICMP socket: {}", e)))?;

        Ok(Arc::new(IcmpTransport {
            client,
            timeout,
            replies: ReplyQueue::new(),
        }))
    }

    fn name(&self) -> &'static str {
        "icmp"
    }
}

/// One probe's view of an ICMP socket
///
/// Each request runs on its own task inside `surge-ping`, which matches the
/// reply by (identifier, sequence); completed replies land in the queue.
struct IcmpTransport {
    client: Client,
    timeout: Duration,
    replies: ReplyQueue,
}

/// Reply for a request `surge-ping` already matched to this pinger
///
/// On Linux datagram ICMP sockets the kernel rewrites the echo identifier to
/// the socket's port, so the packet's own identifier cannot be trusted; the
/// request's identifier is used instead.
fn reply_from_packet(packet: &IcmpPacket, identifier: u16, received_at: Instant) -> Reply {
    let size = match packet {
        IcmpPacket::V4(p) => p.get_size(),
        IcmpPacket::V6(p) => p.get_size(),
    };
    Reply {
        identifier,
        sequence: packet.get_sequence().0,
        size,
        received_at,
    }
}

#[async_trait]
impl Transport for IcmpTransport {
    async fn send(
        &self,
        target: IpAddr,
        identifier: u16,
        sequence: u16,
        payload: &[u8],
    ) -> std::result::Result<Instant, TransportError> {
        let mut pinger = self.client.pinger(target, PingIdentifier(identifier)).await;
        pinger.timeout(self.timeout);

        let payload = payload.to_vec();
        let replies = self.replies.sender();
        let sent_at = Instant::now();

        tokio::spawn(async move {
            let outcome = match pinger.ping(PingSequence(sequence), &payload).await {
                Ok((packet, rtt)) => Ok(reply_from_packet(&packet, identifier, sent_at + rtt)),
                // the driver expires unanswered requests on its own
                Err(SurgeError::Timeout { .. }) => return,
                Err(SurgeError::IOError(e)) => Err(TransportError::send_failed(sequence, e.to_string())),
                Err(e) => Err(TransportError::parse(e.to_string())),
            };
            let _ = replies.send(outcome);
        });

        Ok(sent_at)
    }

    async fn receive(&self, deadline: Instant) -> std::result::Result<Reply, TransportError> {
        self.replies.next(deadline).await
    }
}
