//! Configuration parsing from CLI arguments and environment variables

use crate::{
    cli::Cli,
    config::env::EnvManager,
    error::Result,
    models::Config,
};

/// Configuration parser that layers defaults, `.env`, the environment and the CLI
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    /// Create a new configuration parser with CLI arguments
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Parse and build the complete configuration
    pub fn parse(&self) -> Result<Config> {
        let mut config = Config::default();

        let loaded = EnvManager::load_env_file()?;
        if loaded && self.cli.debug {
            eprintln!("Loaded environment from .env");
        }
        if self.cli.verbose || self.cli.debug {
            for warning in EnvManager::validate_current_env() {
                eprintln!("{}", warning);
            }
        }

        config.merge_from_env()?;
        self.apply_cli_overrides(&mut config);
        config.validate()?;

        Ok(config)
    }

    /// Apply CLI argument overrides to configuration
    fn apply_cli_overrides(&self, config: &mut Config) {
        let cli = &self.cli;

        if let Some(target) = &cli.target {
            config.target = target.trim().to_string();
        }

        if !cli.sizes.is_empty() {
            config.probe_sizes = cli.sizes.clone();
        }

        // An explicit count alone bounds the session; the default duration no longer applies
        if let Some(count) = cli.count {
            config.count = Some(count);
            if cli.duration.is_none() {
                config.duration_secs = None;
            }
        }

        if let Some(duration) = cli.duration {
            config.duration_secs = Some(duration);
        }

        if let Some(interval) = cli.interval {
            config.interval_ms = interval;
        }

        if let Some(timeout) = cli.timeout {
            config.timeout_ms = timeout;
        }

        if let Some(bind) = &cli.bind {
            config.bind_address = Some(bind.clone());
        }

        if let Some(outlier) = cli.outlier {
            config.outlier = outlier;
        }

        if let Some(simulate) = &cli.simulate {
            config.simulate = Some(simulate.clone());
        }

        if cli.color {
            config.enable_color = true;
        }
        if cli.no_color {
            config.enable_color = false;
        }

        config.json_output = cli.json;
        config.verbose = cli.verbose;
        config.debug = cli.debug;

        if config.debug {
            eprintln!("Applied CLI overrides to configuration");
            eprintln!("{}", display_config_summary(config));
        }
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Display configuration summary for debug purposes
pub fn display_config_summary(config: &Config) -> String {
    let sizes: Vec<String> = config.probe_sizes.iter().map(|s| s.to_string()).collect();
    let bound = match (config.count, config.duration_secs) {
        (Some(count), Some(secs)) => format!("{} packets or {}s", count, secs),
        (Some(count), None) => format!("{} packets", count),
        (None, Some(secs)) => format!("{}s", secs),
        (None, None) => "unbounded".to_string(),
    };

    let mut summary = vec![
        format!("Target: {}", config.target),
        format!("Probe Sizes: {} bytes", sizes.join(", ")),
        format!("Bound: {}", bound),
        format!("Interval: {}ms", config.interval_ms),
        format!("Timeout: {}ms", config.timeout_ms),
        format!("Outlier Method: {}", config.outlier),
        format!("Recorder Capacity: {}", config.recorder_capacity),
    ];

    if let Some(bind) = &config.bind_address {
        summary.push(format!("Bind Address: {}", bind));
    }
    if let Some(simulate) = &config.simulate {
        summary.push(format!("Simulated Path: {}", simulate));
    }

    summary.push(format!("Color Output: {}", config.enable_color));
    summary.push(format!("Verbose: {}", config.verbose));
    summary.push(format!("Debug: {}", config.debug));

    summary.join("\n")
}
