//! Packet-pair path prober
//!
//! Sends ICMP echo requests of several payload sizes towards one target and
//! derives the one-way path latency and the bottleneck bandwidth from the
//! dispersion between replies that share a sequence number.
//!
//! The pipeline is: [`executor::ProbeDriver`] sends and matches echoes,
//! [`recorder::Recorder`] groups the resulting samples by sequence number,
//! [`stats::estimator`] turns each group into a [`models::Stat`] and
//! [`stats::Aggregator`] reduces those to one robust [`models::AggregateStat`].

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod output;
pub mod recorder;
pub mod resolve;
pub mod session;
pub mod stats;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, Result};
pub use models::{AggregateStat, Config, Sample, SampleGroup, Stat};
pub use output::{ColoredFormatter, OutputCoordinator, OutputFormatter, OutputFormatterFactory, PlainFormatter};
pub use recorder::Recorder;
pub use session::Session;
pub use stats::{Aggregator, OutlierMethod, Report, Reporter};
pub use transport::{Connector, IcmpConnector, PathModel, SimulatedConnector, Transport};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Version line with the build metadata recorded by `build.rs`
pub fn version_info() -> String {
    format!(
        "{} v{} ({} {}, built {})",
        PKG_NAME,
        VERSION,
        env!("GIT_COMMIT"),
        env!("TARGET_TRIPLE"),
        env!("BUILD_TIME")
    )
}

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    /// Small probe for the latency floor, large one that still avoids fragmentation on a 1500-byte MTU
    pub const DEFAULT_PROBE_SIZES: &[usize] = &[56, 1472];
    pub const DEFAULT_DURATION: Duration = Duration::from_secs(5);
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(200);
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);
    pub const DEFAULT_RECORDER_CAPACITY: usize = 4096;
    pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(1);
    pub const DEFAULT_ENABLE_COLOR: bool = true;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        let info = version_info();
        assert!(info.starts_with(&format!("pairprobe v{}", VERSION)));
    }

    #[test]
    fn test_defaults_form_a_valid_config() {
        let config = Config {
            target: "192.0.2.1".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.probe_sizes, vec![56, 1472]);
        assert_eq!(config.timeout(), defaults::DEFAULT_TIMEOUT);
    }
}
