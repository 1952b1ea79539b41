//! One measurement session: probes, recorder and reporter wired together

use crate::error::Result;
use crate::executor::{Probe, ProbeDriver, ProbeSummary};
use crate::logging::Logger;
use crate::models::Config;
use crate::recorder::{Recorder, RecorderConfig};
use crate::stats::{Aggregator, Report, Reporter};
use crate::transport::Connector;
use crate::types::{ProbeIdentity, SessionId};
use std::net::IpAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Probes towards one target sharing a [`SessionId`] and a [`Recorder`]
///
/// `run` and `statistics` take `&self`, so a session behind an `Arc` can be
/// driven on one task and queried from another.
pub struct Session {
    id: SessionId,
    target: IpAddr,
    probes: Vec<Probe>,
    driver: ProbeDriver,
    reporter: Reporter,
    logger: Logger,
}

impl Session {
    /// Build one probe per configured payload size
    pub fn new(config: &Config, target: IpAddr, connector: Arc<dyn Connector>, logger: Logger) -> Self {
        let id = SessionId::random();

        let probes = config
            .probe_sizes
            .iter()
            .enumerate()
            .map(|(index, &size)| Probe::new(ProbeIdentity::new(id, index as u16), size, config))
            .collect();

        let recorder = Arc::new(Recorder::with_config(RecorderConfig {
            capacity: config.recorder_capacity,
            retention: config.retention(),
        }));

        Self {
            id,
            target,
            probes,
            driver: ProbeDriver::new(connector, Arc::clone(&recorder), logger.named("DRIVER")),
            reporter: Reporter::new(recorder, Aggregator::new(config.outlier.method())),
            logger,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn target(&self) -> IpAddr {
        self.target
    }

    pub fn probes(&self) -> &[Probe] {
        &self.probes
    }

    /// Drive every probe to completion or cancellation
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let run_id = Logger::new_correlation_id();
        self.logger.set_session_id(self.id.to_string()).await;
        self.logger
            .info("Session started")
            .correlation_id(&run_id)
            .field("target", self.target.to_string())
            .field("sizes", self.probes.iter().map(|p| p.size).collect::<Vec<_>>())
            .log()
            .await;

        match self.driver.run(self.target, &self.probes, cancel).await {
            Ok(()) => {
                self.logger
                    .info("Session finished")
                    .correlation_id(&run_id)
                    .field("pairable", self.recorder().pairable_len())
                    .field("packet_loss", self.packet_loss())
                    .log()
                    .await;
                Ok(())
            }
            Err(e) => {
                self.logger
                    .fatal("Session aborted")
                    .correlation_id(&run_id)
                    .location(file!(), line!(), Some(module_path!()))
                    .error_info(&e)
                    .log()
                    .await;
                Err(e)
            }
        }
    }

    /// Estimate and aggregate over everything recorded so far
    pub fn statistics(&self) -> Result<Report> {
        self.reporter.statistics()
    }

    pub fn probe_summaries(&self) -> Vec<ProbeSummary> {
        self.probes.iter().map(Probe::summary).collect()
    }

    /// Loss over every probe of the session
    pub fn packet_loss(&self) -> f64 {
        let summaries = self.probe_summaries();
        let sent = summaries.iter().map(|s| s.sent).sum();
        let received = summaries.iter().map(|s| s.received).sum();
        crate::executor::packet_loss(sent, received)
    }

    pub fn recorder(&self) -> &Arc<Recorder> {
        self.reporter.recorder()
    }
}
