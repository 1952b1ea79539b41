//! Command-line interface

use crate::models::config::{OutlierChoice, MAX_PAYLOAD_SIZE};
use clap::{ArgAction, Parser};

const EXAMPLES: &str = "\
Examples:
  pairprobe 192.0.2.1                       probe with the default sizes for 5 seconds
  pairprobe example.net -s 64 -s 1400 -c 50 send 50 pairs of 64 and 1400 byte echoes
  pairprobe example.net --outlier iqr -t 30 run for 30 seconds, IQR outlier rejection
  pairprobe localhost --simulate 12:125000  dry run over a 12 ms, 1 Mbit/s model path

The default sizes are 56 and 1472 bytes; 1472 is the largest echo payload
that fits a 1500-byte MTU unfragmented. On paths with a smaller MTU (PPPoE,
VPN tunnels) pass a smaller large size, e.g. -s 56 -s 1400.

Raw ICMP sockets usually need root or CAP_NET_RAW.
Settings can also come from PROBE_* environment variables or a .env file.";

/// Packet-pair latency and bottleneck bandwidth estimator
#[derive(Parser, Debug, Clone)]
#[command(name = "pairprobe")]
#[command(version, about, long_about = None, after_help = EXAMPLES)]
pub struct Cli {
    /// Host name or IP address to probe
    #[arg(value_name = "TARGET")]
    pub target: Option<String>,

    /// Echo payload size in bytes (repeat for more probe streams) [default: 56, 1472]
    #[arg(short = 's', long = "size", value_name = "BYTES", action = ArgAction::Append, value_parser = parse_size)]
    pub sizes: Vec<usize>,

    /// Stop after this many requests per probe
    #[arg(short, long)]
    pub count: Option<u32>,

    /// Stop sending after this many seconds
    #[arg(short = 't', long = "duration", value_name = "SECONDS", value_parser = parse_duration)]
    pub duration: Option<u64>,

    /// Milliseconds between requests of one probe
    #[arg(short, long = "interval", value_name = "MS")]
    pub interval: Option<u64>,

    /// Milliseconds to wait for a reply before counting it lost
    #[arg(short = 'W', long = "timeout", value_name = "MS")]
    pub timeout: Option<u64>,

    /// Local address to send from
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,

    /// Outlier rejection: mad, iqr or none
    #[arg(long, value_name = "METHOD")]
    pub outlier: Option<OutlierChoice>,

    /// Probe a modelled path instead of the network (LATENCY_MS:BYTES_PER_SEC[:LOSS])
    #[arg(long, value_name = "MODEL")]
    pub simulate: Option<String>,

    /// Print the final report as JSON
    #[arg(long)]
    pub json: bool,

    /// Force colored output
    #[arg(long)]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Print progress and the per-sequence table
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Validate CLI arguments for conflicts
    pub fn validate(&self) -> Result<(), String> {
        if self.color && self.no_color {
            return Err("Cannot specify both --color and --no-color".to_string());
        }

        if self.json && self.verbose {
            return Err("--json and --verbose cannot be combined".to_string());
        }

        Ok(())
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        if self.color {
            true
        } else if self.no_color {
            false
        } else {
            supports_color()
        }
    }
}

fn parse_size(s: &str) -> Result<usize, String> {
    let size: usize = s.parse().map_err(|_| format!("Invalid payload size: {}", s))?;
    if size > MAX_PAYLOAD_SIZE {
        return Err(format!("Payload size cannot exceed {} bytes", MAX_PAYLOAD_SIZE));
    }
    Ok(size)
}

/// Parse duration from seconds string
fn parse_duration(s: &str) -> Result<u64, String> {
    if s.starts_with('+') || s.starts_with("0x") || s.starts_with("0X") {
        return Err(format!("Invalid duration: {}", s));
    }

    s.parse::<u64>()
        .map_err(|_| format!("Invalid duration: {}", s))
        .and_then(|secs| {
            if secs == 0 {
                Err("Duration must be greater than 0".to_string())
            } else if secs > 3600 {
                Err("Duration cannot exceed 3600 seconds".to_string())
            } else {
                Ok(secs)
            }
        })
}

/// Check if the terminal supports color output
pub fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    #[cfg(target_os = "windows")]
    {
        if std::env::var("ANSICON").is_ok() || std::env::var("ConEmuANSI").is_ok() {
            return true;
        }
    }

    cfg!(unix)
}
