//! Core formatting traits and implementations
//!
//! This module defines the output formatting interface and provides
//! a plain text implementation with table formatting capabilities.

use crate::{
    error::{AppError, Result},
    executor::ProbeSummary,
    models::{format_bandwidth, AggregateStat, Stat},
    stats::Report,
    types::SessionId,
};
use std::fmt::Write as _;
use std::net::IpAddr;
use std::time::Duration;

/// What a session is measuring, shown once before any result
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub session: SessionId,
    pub target: IpAddr,
    /// Name of the transport the probes run over
    pub transport: &'static str,
    pub sizes: Vec<usize>,
}

/// Main trait for output formatting
pub trait OutputFormatter: Send + Sync {
    /// Format the session banner
    fn format_header(&self, info: &SessionInfo) -> Result<String>;

    /// One progress line for a running session
    fn format_progress(&self, elapsed: Duration, report: &Report) -> Result<String>;

    /// Format the aggregate path estimate
    fn format_aggregate(&self, aggregate: &AggregateStat) -> Result<String>;

    /// Format per-sequence estimates as a table
    fn format_sequence_table(&self, stats: &[Stat]) -> Result<String>;

    /// Format per-probe packet counters as a table
    fn format_probe_summaries(&self, summaries: &[ProbeSummary]) -> Result<String>;

    /// Format error messages
    fn format_error(&self, error: &str) -> Result<String>;

    /// Format warning messages
    fn format_warning(&self, warning: &str) -> Result<String>;

    /// Format success messages
    fn format_success(&self, message: &str) -> Result<String>;
}

/// Configuration options for formatting
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    /// Enable colored output
    pub enable_color: bool,
    /// Include the per-sequence table in the final report
    pub verbose_mode: bool,
    /// Show table borders
    pub table_borders: bool,
    /// Maximum rows of the per-sequence table; the most recent rows win
    pub max_sequence_rows: usize,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: true,
            verbose_mode: false,
            table_borders: true,
            max_sequence_rows: 50,
        }
    }
}

/// Table formatting configuration
#[derive(Debug, Clone)]
pub struct TableFormat {
    pub columns: Vec<Column>,
    pub show_borders: bool,
}

/// Column definition for table formatting
#[derive(Debug, Clone)]
pub struct Column {
    pub header: String,
    pub alignment: Alignment,
    pub min_width: usize,
}

impl Column {
    pub fn new(header: &str, alignment: Alignment, min_width: usize) -> Self {
        Self {
            header: header.to_string(),
            alignment,
            min_width,
        }
    }
}

/// Text alignment options
#[derive(Debug, Clone, Copy)]
pub enum Alignment {
    Left,
    Right,
}

/// Row data for table formatting
pub type RowData = Vec<String>;

pub(crate) fn write_err(e: std::fmt::Error) -> AppError {
    AppError::io(format!("Failed to format output: {}", e))
}

/// Plain text formatter implementation
pub struct PlainFormatter {
    options: FormattingOptions,
}

impl PlainFormatter {
    /// Create a new plain formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FormattingOptions {
        &self.options
    }

    /// Render rows under the given columns
    pub fn create_table(&self, format: &TableFormat, rows: &[RowData]) -> String {
        let widths = Self::column_widths(format, rows);
        let mut lines = Vec::new();

        if format.show_borders {
            lines.push(Self::horizontal_border(&widths));
        }

        let headers: Vec<String> = format.columns.iter().map(|c| c.header.clone()).collect();
        lines.push(Self::create_row(&headers, &widths, format));

        if format.show_borders {
            lines.push(Self::horizontal_border(&widths));
        }

        for row in rows {
            lines.push(Self::create_row(row, &widths, format));
        }

        if format.show_borders && !rows.is_empty() {
            lines.push(Self::horizontal_border(&widths));
        }

        lines.join("\n")
    }

    fn column_widths(format: &TableFormat, rows: &[RowData]) -> Vec<usize> {
        format
            .columns
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                rows.iter()
                    .filter_map(|row| row.get(idx))
                    .map(|cell| cell.chars().count())
                    .fold(column.min_width.max(column.header.len()), usize::max)
            })
            .collect()
    }

    fn create_row(data: &[String], widths: &[usize], format: &TableFormat) -> String {
        let mut row = String::new();

        if format.show_borders {
            row.push('|');
        }

        for ((cell, &width), column) in data.iter().zip(widths).zip(&format.columns) {
            let padded = Self::align_text(cell, width, column.alignment);
            if format.show_borders {
                row.push(' ');
                row.push_str(&padded);
                row.push_str(" |");
            } else {
                row.push_str(&padded);
                row.push_str("  ");
            }
        }

        row.trim_end().to_string()
    }

    fn horizontal_border(widths: &[usize]) -> String {
        let mut border = String::from("+");
        for &width in widths {
            border.push_str(&"-".repeat(width + 2));
            border.push('+');
        }
        border
    }

    fn align_text(text: &str, width: usize, alignment: Alignment) -> String {
        match alignment {
            Alignment::Left => format!("{:<width$}", text, width = width),
            Alignment::Right => format!("{:>width$}", text, width = width),
        }
    }

    /// Rows of the sequence table, newest `max_sequence_rows` only
    pub(crate) fn sequence_rows(&self, stats: &[Stat]) -> Vec<RowData> {
        let skip = stats.len().saturating_sub(self.options.max_sequence_rows);
        stats
            .iter()
            .skip(skip)
            .map(|stat| {
                vec![
                    stat.seq.to_string(),
                    format_duration_ms(stat.latency_ms()),
                    format_duration_ms(stat.rtt_ms()),
                    format_bandwidth(stat.bandwidth),
                ]
            })
            .collect()
    }

    pub(crate) fn sequence_format(&self) -> TableFormat {
        TableFormat {
            columns: vec![
                Column::new("Seq", Alignment::Right, 5),
                Column::new("Latency", Alignment::Right, 10),
                Column::new("Pair RTT", Alignment::Right, 10),
                Column::new("Bandwidth", Alignment::Right, 12),
            ],
            show_borders: self.options.table_borders,
        }
    }

    pub(crate) fn summary_rows(summaries: &[ProbeSummary]) -> Vec<RowData> {
        summaries
            .iter()
            .map(|s| {
                vec![
                    s.identity.to_string(),
                    s.size.to_string(),
                    s.sent.to_string(),
                    s.received.to_string(),
                    s.expired.to_string(),
                    s.foreign.to_string(),
                    format_percentage(s.loss * 100.0),
                ]
            })
            .collect()
    }

    pub(crate) fn summary_format(&self) -> TableFormat {
        TableFormat {
            columns: vec![
                Column::new("Probe", Alignment::Left, 6),
                Column::new("Size", Alignment::Right, 5),
                Column::new("Sent", Alignment::Right, 5),
                Column::new("Received", Alignment::Right, 8),
                Column::new("Expired", Alignment::Right, 7),
                Column::new("Foreign", Alignment::Right, 7),
                Column::new("Loss", Alignment::Right, 6),
            ],
            show_borders: self.options.table_borders,
        }
    }
}

/// Format a millisecond value with a unit that keeps it readable
pub fn format_duration_ms(duration_ms: f64) -> String {
    let magnitude = duration_ms.abs();
    if magnitude < 1.0 {
        format!("{:.1}μs", duration_ms * 1000.0)
    } else if magnitude < 1000.0 {
        format!("{:.3}ms", duration_ms)
    } else {
        format!("{:.3}s", duration_ms / 1000.0)
    }
}

/// Format percentage with appropriate precision
pub fn format_percentage(percentage: f64) -> String {
    if percentage >= 99.95 {
        "100.0%".to_string()
    } else if percentage < 0.05 {
        "0.0%".to_string()
    } else {
        format!("{:.1}%", percentage)
    }
}

impl OutputFormatter for PlainFormatter {
    fn format_header(&self, info: &SessionInfo) -> Result<String> {
        let title = format!("pairprobe {} ({})", info.target, info.transport);
        let border = "=".repeat(title.len() + 4);
        let sizes: Vec<String> = info.sizes.iter().map(|s| s.to_string()).collect();

        let mut output = String::new();
        writeln!(output, "{}", border).map_err(write_err)?;
        writeln!(output, "  {}", title).map_err(write_err)?;
        writeln!(output, "{}", border).map_err(write_err)?;
        writeln!(output, "Session:      {}", info.session).map_err(write_err)?;
        write!(output, "Probe Sizes:  {} bytes", sizes.join(", ")).map_err(write_err)?;

        Ok(output)
    }

    fn format_progress(&self, elapsed: Duration, report: &Report) -> Result<String> {
        let aggregate = &report.aggregate;
        Ok(format!(
            "[{:>6.1}s] latency {}  bandwidth {}  pairs {} ({} rejected)",
            elapsed.as_secs_f64(),
            format_duration_ms(aggregate.latency_ms()),
            format_bandwidth(aggregate.bandwidth),
            aggregate.samples,
            aggregate.rejected
        ))
    }

    fn format_aggregate(&self, aggregate: &AggregateStat) -> Result<String> {
        let mut output = String::new();

        writeln!(output, "Path Estimate:").map_err(write_err)?;
        writeln!(output, "--------------").map_err(write_err)?;
        writeln!(output, "One-way Latency:  {}", format_duration_ms(aggregate.latency_ms())).map_err(write_err)?;
        writeln!(output, "Pair RTT:         {}", format_duration_ms(aggregate.rtt_ms())).map_err(write_err)?;
        writeln!(output, "Bandwidth:        {}", format_bandwidth(aggregate.bandwidth)).map_err(write_err)?;
        write!(
            output,
            "Pairs:            {} used, {} rejected",
            aggregate.samples, aggregate.rejected
        )
        .map_err(write_err)?;

        Ok(output)
    }

    fn format_sequence_table(&self, stats: &[Stat]) -> Result<String> {
        let mut output = String::from("Per-sequence Estimates:\n");
        output.push_str(&self.create_table(&self.sequence_format(), &self.sequence_rows(stats)));
        Ok(output)
    }

    fn format_probe_summaries(&self, summaries: &[ProbeSummary]) -> Result<String> {
        let mut output = String::from("Probes:\n");
        output.push_str(&self.create_table(&self.summary_format(), &Self::summary_rows(summaries)));
        Ok(output)
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("ERROR: {}", error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("WARNING: {}", warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("SUCCESS: {}", message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProbeIdentity;

    fn formatter() -> PlainFormatter {
        PlainFormatter::new(FormattingOptions {
            enable_color: false,
            ..FormattingOptions::default()
        })
    }

    fn aggregate() -> AggregateStat {
        AggregateStat {
            latency_secs: 0.010,
            bandwidth: 100_000.0,
            rtt: Duration::from_millis(64),
            samples: 48,
            rejected: 2,
        }
    }

    fn stat(seq: u64) -> Stat {
        Stat {
            seq,
            latency_secs: 0.010,
            bandwidth: 100_000.0,
            rtt: Duration::from_millis(64),
        }
    }

    #[test]
    fn test_header() {
        let info = SessionInfo {
            session: SessionId(0x00ff),
            target: "192.0.2.1".parse().unwrap(),
            transport: "icmp",
            sizes: vec![56, 1472],
        };
        let header = formatter().format_header(&info).unwrap();

        assert!(header.contains("pairprobe 192.0.2.1 (icmp)"));
        assert!(header.contains("Session:      00ff"));
        assert!(header.contains("56, 1472 bytes"));
    }

    #[test]
    fn test_aggregate() {
        let output = formatter().format_aggregate(&aggregate()).unwrap();

        assert!(output.contains("One-way Latency:  10.000ms"));
        assert!(output.contains("Pair RTT:         64.000ms"));
        assert!(output.contains("Bandwidth:        100.0 kB/s"));
        assert!(output.contains("48 used, 2 rejected"));
    }

    #[test]
    fn test_progress_line() {
        let report = Report {
            aggregate: aggregate(),
            per_sequence: vec![stat(0)],
        };
        let line = formatter().format_progress(Duration::from_millis(2500), &report).unwrap();

        assert_eq!(line, "[   2.5s] latency 10.000ms  bandwidth 100.0 kB/s  pairs 48 (2 rejected)");
    }

    #[test]
    fn test_sequence_table_keeps_newest_rows() {
        let formatter = PlainFormatter::new(FormattingOptions {
            max_sequence_rows: 2,
            ..FormattingOptions::default()
        });
        let stats: Vec<Stat> = (0..5).map(stat).collect();
        let table = formatter.format_sequence_table(&stats).unwrap();

        assert!(table.contains("   Seq |"));
        assert!(table.contains("|     4 |"));
        assert!(table.contains("|     3 |"));
        assert!(!table.contains("|     2 |"));
    }

    #[test]
    fn test_probe_summary_table() {
        let summaries = vec![ProbeSummary {
            identity: ProbeIdentity::new(SessionId(0x0a0a), 1),
            size: 1472,
            sent: 20,
            received: 15,
            foreign: 3,
            expired: 5,
            loss: 0.25,
        }];
        let table = formatter().format_probe_summaries(&summaries).unwrap();

        assert!(table.contains("0a0a/1"));
        assert!(table.contains("25.0%"));
        assert!(table.contains("Foreign"));
    }

    #[test]
    fn test_borderless_table() {
        let formatter = PlainFormatter::new(FormattingOptions {
            table_borders: false,
            ..FormattingOptions::default()
        });
        let table = formatter.format_sequence_table(&[stat(7)]).unwrap();
        assert!(!table.contains('+'));
        assert!(!table.contains('|'));
    }

    #[test]
    fn test_duration_and_percentage_formatting() {
        assert_eq!(format_duration_ms(0.25), "250.0μs");
        assert_eq!(format_duration_ms(12.5), "12.500ms");
        assert_eq!(format_duration_ms(2500.0), "2.500s");
        assert_eq!(format_duration_ms(-3.0), "-3.000ms");
        assert_eq!(format_percentage(0.0), "0.0%");
        assert_eq!(format_percentage(100.0), "100.0%");
        assert_eq!(format_percentage(12.34), "12.3%");
    }
}
