//! Output formatting and display system
//!
//! Progress lines and the final report go to stdout, either as text
//! (colored or plain) or as a single JSON document.

mod colored;
mod formatter;

pub use colored::{ColorScheme, ColoredFormatter};
pub use formatter::{
    format_duration_ms, format_percentage, Alignment, Column, FormattingOptions, OutputFormatter,
    PlainFormatter, RowData, SessionInfo, TableFormat,
};

use crate::{
    error::{AppError, Result},
    executor::ProbeSummary,
    stats::Report,
    types::SessionId,
};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Output formatting factory for creating appropriate formatters
pub struct OutputFormatterFactory;

impl OutputFormatterFactory {
    /// Create a formatter based on color support and preferences
    pub fn create_formatter(enable_color: bool, verbose: bool) -> Box<dyn OutputFormatter> {
        let options = FormattingOptions {
            enable_color,
            verbose_mode: verbose,
            ..FormattingOptions::default()
        };

        if enable_color {
            Box::new(ColoredFormatter::new(options))
        } else {
            Box::new(PlainFormatter::new(options))
        }
    }

    /// Create a plain text formatter for scripts/logs
    pub fn create_plain_formatter() -> Box<dyn OutputFormatter> {
        Self::create_formatter(false, false)
    }
}

/// Machine-readable final report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonReport {
    pub session: SessionId,
    pub target: IpAddr,
    pub transport: String,
    pub elapsed_secs: f64,
    /// Absent when no pair survived aggregation
    pub report: Option<Report>,
    pub probes: Vec<ProbeSummary>,
    pub packet_loss: f64,
}

impl JsonReport {
    pub fn new(
        info: &SessionInfo,
        elapsed: Duration,
        report: Option<Report>,
        probes: Vec<ProbeSummary>,
        packet_loss: f64,
    ) -> Self {
        Self {
            session: info.session,
            target: info.target,
            transport: info.transport.to_string(),
            elapsed_secs: elapsed.as_secs_f64(),
            report,
            probes,
            packet_loss,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(AppError::from)
    }
}

/// Main output coordinator that handles all result display
pub struct OutputCoordinator {
    formatter: Box<dyn OutputFormatter>,
    verbose: bool,
}

impl OutputCoordinator {
    /// Create a new output coordinator with the specified formatter
    pub fn new(formatter: Box<dyn OutputFormatter>, verbose: bool) -> Self {
        Self { formatter, verbose }
    }

    pub fn formatter(&self) -> &dyn OutputFormatter {
        self.formatter.as_ref()
    }

    pub fn display_header(&self, info: &SessionInfo) -> Result<String> {
        self.formatter.format_header(info)
    }

    /// Progress line for a running session; `NoData` yields a placeholder
    pub fn display_progress(&self, elapsed: Duration, report: &Result<Report>) -> Result<String> {
        match report {
            Ok(report) => self.formatter.format_progress(elapsed, report),
            Err(AppError::NoData) => Ok(format!("[{:>6.1}s] waiting for complete pairs", elapsed.as_secs_f64())),
            Err(e) => self.formatter.format_error(&e.to_string()),
        }
    }

    /// Display complete results of a finished session
    pub fn display_results(&self, report: Option<&Report>, summaries: &[ProbeSummary]) -> Result<String> {
        let mut sections = Vec::new();

        match report {
            Some(report) => {
                sections.push(self.formatter.format_aggregate(&report.aggregate)?);
                if self.verbose {
                    sections.push(self.formatter.format_sequence_table(&report.per_sequence)?);
                }
            }
            None => sections.push(self.formatter.format_warning("No probe pair produced a usable estimate")?),
        }

        sections.push(self.formatter.format_probe_summaries(summaries)?);
        Ok(sections.join("\n\n"))
    }
}
