//! Configuration data model and validation

use crate::stats::OutlierMethod;
use crate::transport::simulated::PathModel;
use crate::types::{Result, AppError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

/// Largest ICMP echo payload that fits an IPv4 datagram
pub const MAX_PAYLOAD_SIZE: usize = 65_507;

/// Outlier rejection strategy as named in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlierChoice {
    /// Modified Z-score over the median absolute deviation
    Mad,
    /// Interquartile range fences
    Iqr,
    /// Keep every sanitized estimate
    None,
}

impl OutlierChoice {
    /// Concrete filter with the standard thresholds
    pub fn method(&self) -> OutlierMethod {
        match self {
            Self::Mad => OutlierMethod::default(),
            Self::Iqr => OutlierMethod::Iqr { multiplier: 1.5 },
            Self::None => OutlierMethod::None,
        }
    }
}

impl FromStr for OutlierChoice {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mad" | "zscore" | "modified-z" => Ok(Self::Mad),
            "iqr" => Ok(Self::Iqr),
            "none" | "off" => Ok(Self::None),
            other => Err(AppError::parse(format!("Unknown outlier method '{}' (expected mad, iqr or none)", other))),
        }
    }
}

impl fmt::Display for OutlierChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Mad => "mad",
            Self::Iqr => "iqr",
            Self::None => "none",
        };
        f.write_str(name)
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host name or IP address to probe
    #[serde(default)]
    pub target: String,

    /// Echo payload sizes, one probe stream per size
    #[serde(default = "default_probe_sizes")]
    pub probe_sizes: Vec<usize>,

    /// Packets per probe; unlimited when absent
    #[serde(default)]
    pub count: Option<u32>,

    /// Session length in seconds; unlimited when absent
    #[serde(default = "default_duration_secs")]
    pub duration_secs: Option<u64>,

    /// Delay between two echo requests of the same probe
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// How long a reply may take before the packet counts as lost
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Local address to bind the ICMP sockets to
    #[serde(default)]
    pub bind_address: Option<String>,

    /// Outlier rejection strategy
    #[serde(default = "default_outlier")]
    pub outlier: OutlierChoice,

    /// Maximum number of sequence groups kept in memory
    #[serde(default = "default_recorder_capacity")]
    pub recorder_capacity: usize,

    /// Drop sequence groups older than this many seconds
    #[serde(default)]
    pub retention_secs: Option<u64>,

    /// How often the running session is summarized
    #[serde(default = "default_report_interval_ms")]
    pub report_interval_ms: u64,

    /// Probe a simulated path ("LATENCY_MS:BYTES_PER_SEC[:LOSS]") instead of the network
    #[serde(default)]
    pub simulate: Option<String>,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Print the final report as JSON
    #[serde(default)]
    pub json_output: bool,

    /// Enable verbose output
    #[serde(default)]
    pub verbose: bool,

    /// Enable debug output
    #[serde(default)]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target: String::new(),
            probe_sizes: default_probe_sizes(),
            count: None,
            duration_secs: default_duration_secs(),
            interval_ms: default_interval_ms(),
            timeout_ms: default_timeout_ms(),
            bind_address: None,
            outlier: default_outlier(),
            recorder_capacity: default_recorder_capacity(),
            retention_secs: None,
            report_interval_ms: default_report_interval_ms(),
            simulate: None,
            enable_color: default_enable_color(),
            json_output: false,
            verbose: false,
            debug: false,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-packet timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Send interval as Duration
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Session duration bound, if any
    pub fn duration(&self) -> Option<Duration> {
        self.duration_secs.map(Duration::from_secs)
    }

    /// Retention horizon of the sample recorder, if any
    pub fn retention(&self) -> Option<Duration> {
        self.retention_secs.map(Duration::from_secs)
    }

    /// Reporting cadence of the consumer loop
    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }

    /// Parsed bind address
    pub fn bind_ip(&self) -> Result<Option<IpAddr>> {
        match &self.bind_address {
            Some(addr) => IpAddr::from_str(addr.trim())
                .map(Some)
                .map_err(|e| AppError::config(format!("Invalid bind address '{}': {}", addr, e))),
            None => Ok(None),
        }
    }

    /// Parsed simulated path, if the run should not touch the network
    pub fn simulated_path(&self) -> Result<Option<PathModel>> {
        self.simulate
            .as_deref()
            .map(PathModel::from_str)
            .transpose()
    }

    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Result<()> {
        if self.target.trim().is_empty() {
            return Err(AppError::config("Target cannot be empty"));
        }

        if self.probe_sizes.len() < 2 {
            return Err(AppError::config("At least two probe sizes are required to measure dispersion"));
        }

        let mut seen = HashSet::new();
        for &size in &self.probe_sizes {
            if size > MAX_PAYLOAD_SIZE {
                return Err(AppError::config(format!(
                    "Probe size {} exceeds the maximum echo payload of {} bytes", size, MAX_PAYLOAD_SIZE
                )));
            }
            if !seen.insert(size) {
                return Err(AppError::config(format!("Probe size {} is listed more than once", size)));
            }
        }

        if self.count.is_none() && self.duration_secs.is_none() {
            return Err(AppError::config("Either a packet count or a duration must bound the session"));
        }

        if self.count == Some(0) {
            return Err(AppError::config("Packet count must be greater than 0"));
        }

        if let Some(duration) = self.duration_secs {
            if duration == 0 {
                return Err(AppError::config("Duration must be greater than 0"));
            }
            if duration > 3600 {
                return Err(AppError::config("Duration cannot exceed 3600 seconds"));
            }
        }

        if self.interval_ms == 0 {
            return Err(AppError::config("Interval must be greater than 0"));
        }

        if self.timeout_ms == 0 {
            return Err(AppError::config("Timeout must be greater than 0"));
        }

        if self.timeout_ms > 60_000 {
            return Err(AppError::config("Timeout cannot exceed 60000 ms"));
        }

        if self.recorder_capacity == 0 {
            return Err(AppError::config("Recorder capacity must be greater than 0"));
        }

        if self.report_interval_ms == 0 {
            return Err(AppError::config("Report interval must be greater than 0"));
        }

        self.bind_ip()?;
        self.simulated_path()?;

        Ok(())
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        self.merge_from_vars(|key| std::env::var(key).ok())
    }

    /// Merge settings from any key/value source shaped like the environment
    pub fn merge_from_vars<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(target) = lookup("PROBE_TARGET") {
            self.target = target.trim().to_string();
        }

        if let Some(sizes) = lookup("PROBE_SIZES") {
            self.probe_sizes = parse_size_list(&sizes)
                .map_err(|e| AppError::config(format!("Invalid PROBE_SIZES value '{}': {}", sizes, e)))?;
        }

        if let Some(count) = lookup("PROBE_COUNT") {
            self.count = Some(count.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid PROBE_COUNT value '{}': {}", count, e)))?);
        }

        if let Some(duration) = lookup("PROBE_DURATION_SECS") {
            self.duration_secs = Some(duration.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid PROBE_DURATION_SECS value '{}': {}", duration, e)))?);
        }

        if let Some(interval) = lookup("PROBE_INTERVAL_MS") {
            self.interval_ms = interval.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid PROBE_INTERVAL_MS value '{}': {}", interval, e)))?;
        }

        if let Some(timeout) = lookup("PROBE_TIMEOUT_MS") {
            self.timeout_ms = timeout.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid PROBE_TIMEOUT_MS value '{}': {}", timeout, e)))?;
        }

        if let Some(bind) = lookup("BIND_ADDRESS") {
            let bind = bind.trim();
            self.bind_address = if bind.is_empty() { None } else { Some(bind.to_string()) };
        }

        if let Some(outlier) = lookup("OUTLIER_METHOD") {
            self.outlier = outlier.parse()
                .map_err(|e| AppError::config(format!("Invalid OUTLIER_METHOD value '{}': {}", outlier, e)))?;
        }

        if let Some(capacity) = lookup("RECORDER_CAPACITY") {
            self.recorder_capacity = capacity.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid RECORDER_CAPACITY value '{}': {}", capacity, e)))?;
        }

        if let Some(enable_color) = lookup("ENABLE_COLOR") {
            self.enable_color = enable_color.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", enable_color, e)))?;
        }

        Ok(())
    }
}

/// Parse a comma-separated list of payload sizes
pub fn parse_size_list(value: &str) -> std::result::Result<Vec<usize>, std::num::ParseIntError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

// Default value functions for serde
fn default_probe_sizes() -> Vec<usize> {
    crate::defaults::DEFAULT_PROBE_SIZES.to_vec()
}

fn default_duration_secs() -> Option<u64> {
    Some(crate::defaults::DEFAULT_DURATION.as_secs())
}

fn default_interval_ms() -> u64 {
    crate::defaults::DEFAULT_INTERVAL.as_millis() as u64
}

fn default_timeout_ms() -> u64 {
    crate::defaults::DEFAULT_TIMEOUT.as_millis() as u64
}

fn default_outlier() -> OutlierChoice {
    OutlierChoice::Mad
}

fn default_recorder_capacity() -> usize {
    crate::defaults::DEFAULT_RECORDER_CAPACITY
}

fn default_report_interval_ms() -> u64 {
    crate::defaults::DEFAULT_REPORT_INTERVAL.as_millis() as u64
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}
