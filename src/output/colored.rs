//! Colored formatter implementation with terminal color support
//!
//! Tables are laid out by [`PlainFormatter`]; this formatter adds ANSI
//! colors on top, coding latency by [`PerformanceLevel`] and loss by
//! severity.

use super::formatter::{
    format_duration_ms, format_percentage, write_err, FormattingOptions, OutputFormatter, PlainFormatter,
    SessionInfo,
};
use crate::{
    error::Result,
    executor::ProbeSummary,
    models::{format_bandwidth, AggregateStat, Stat},
    stats::Report,
    types::PerformanceLevel,
};
use colored::*;
use std::fmt::Write as _;
use std::time::Duration;

impl PerformanceLevel {
    /// Get color for this performance level
    pub fn color(&self) -> Color {
        match self {
            Self::Good => Color::Green,
            Self::Moderate => Color::Yellow,
            Self::Poor => Color::Red,
        }
    }

    /// Get descriptive text
    pub fn description(&self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Moderate => "Moderate",
            Self::Poor => "Poor",
        }
    }
}

/// Color scheme configuration
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
    pub muted: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Blue,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            info: Color::Cyan,
            muted: Color::BrightBlack,
        }
    }
}

/// Colored formatter implementation
pub struct ColoredFormatter {
    plain_formatter: PlainFormatter,
    options: FormattingOptions,
    color_scheme: ColorScheme,
}

impl ColoredFormatter {
    /// Create a new colored formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        Self::with_color_scheme(options, ColorScheme::default())
    }

    /// Create a colored formatter with custom color scheme
    pub fn with_color_scheme(options: FormattingOptions, color_scheme: ColorScheme) -> Self {
        Self {
            plain_formatter: PlainFormatter::new(options.clone()),
            options,
            color_scheme,
        }
    }

    /// Apply color to text if colors are enabled
    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.options.enable_color {
            text.color(color)
        } else {
            text.normal()
        }
    }

    fn strong(&self, text: ColoredString) -> ColoredString {
        if self.options.enable_color {
            text.bold()
        } else {
            text
        }
    }

    fn section_header(&self, title: &str) -> String {
        if self.options.enable_color {
            title.bold().color(self.color_scheme.header).to_string()
        } else {
            title.to_string()
        }
    }

    /// Latency text colored by its performance level
    fn latency_colored(&self, latency_ms: f64) -> ColoredString {
        let level = PerformanceLevel::from_latency(Duration::from_secs_f64(latency_ms.max(0.0) / 1000.0));
        self.colorize(&format_duration_ms(latency_ms), level.color())
    }

    fn loss_colored(&self, loss: f64) -> ColoredString {
        let color = if loss == 0.0 {
            self.color_scheme.success
        } else if loss < 0.05 {
            self.color_scheme.warning
        } else {
            self.color_scheme.error
        };
        self.colorize(&format_percentage(loss * 100.0), color)
    }
}

impl OutputFormatter for ColoredFormatter {
    fn format_header(&self, info: &SessionInfo) -> Result<String> {
        let sizes: Vec<String> = info.sizes.iter().map(|s| s.to_string()).collect();
        let mut output = String::new();

        writeln!(
            output,
            "{} {} {}",
            self.section_header("pairprobe"),
            self.colorize(&info.target.to_string(), self.color_scheme.info),
            self.colorize(&format!("({})", info.transport), self.color_scheme.muted)
        )
        .map_err(write_err)?;
        writeln!(output, "{}", self.colorize(&"─".repeat(40), self.color_scheme.muted)).map_err(write_err)?;
        writeln!(output, "Session:      {}", info.session).map_err(write_err)?;
        write!(output, "Probe Sizes:  {} bytes", sizes.join(", ")).map_err(write_err)?;

        Ok(output)
    }

    fn format_progress(&self, elapsed: Duration, report: &Report) -> Result<String> {
        let aggregate = &report.aggregate;
        Ok(format!(
            "{} latency {}  bandwidth {}  pairs {} {}",
            self.colorize(&format!("[{:>6.1}s]", elapsed.as_secs_f64()), self.color_scheme.muted),
            self.latency_colored(aggregate.latency_ms()),
            self.colorize(&format_bandwidth(aggregate.bandwidth), self.color_scheme.info),
            aggregate.samples,
            self.colorize(&format!("({} rejected)", aggregate.rejected), self.color_scheme.muted)
        ))
    }

    fn format_aggregate(&self, aggregate: &AggregateStat) -> Result<String> {
        let level = PerformanceLevel::from_latency(aggregate.latency());
        let mut output = String::new();

        writeln!(output, "{}", self.section_header("Path Estimate")).map_err(write_err)?;
        writeln!(
            output,
            "One-way Latency:  {} {}",
            self.latency_colored(aggregate.latency_ms()),
            self.colorize(&format!("({})", level.description()), level.color())
        )
        .map_err(write_err)?;
        writeln!(output, "Pair RTT:         {}", format_duration_ms(aggregate.rtt_ms())).map_err(write_err)?;
        writeln!(
            output,
            "Bandwidth:        {}",
            self.strong(self.colorize(&format_bandwidth(aggregate.bandwidth), self.color_scheme.info))
        )
        .map_err(write_err)?;

        let rejected = format!("{} rejected", aggregate.rejected);
        let rejected = if aggregate.rejected > 0 {
            self.colorize(&rejected, self.color_scheme.warning)
        } else {
            self.colorize(&rejected, self.color_scheme.muted)
        };
        write!(output, "Pairs:            {} used, {}", aggregate.samples, rejected).map_err(write_err)?;

        Ok(output)
    }

    fn format_sequence_table(&self, stats: &[Stat]) -> Result<String> {
        let table = self.plain_formatter.create_table(
            &self.plain_formatter.sequence_format(),
            &self.plain_formatter.sequence_rows(stats),
        );
        Ok(format!("{}\n{}", self.section_header("Per-sequence Estimates"), table))
    }

    fn format_probe_summaries(&self, summaries: &[ProbeSummary]) -> Result<String> {
        let table = self.plain_formatter.create_table(
            &self.plain_formatter.summary_format(),
            &PlainFormatter::summary_rows(summaries),
        );

        let mut output = format!("{}\n{}", self.section_header("Probes"), table);
        for summary in summaries.iter().filter(|s| s.loss > 0.0) {
            write!(
                output,
                "\n{} probe {} ({} bytes) lost {}",
                self.colorize("!", self.color_scheme.warning),
                summary.identity,
                summary.size,
                self.loss_colored(summary.loss)
            )
            .map_err(write_err)?;
        }
        Ok(output)
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("{} {}", self.strong(self.colorize("✗ ERROR:", self.color_scheme.error)), error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("{} {}", self.strong(self.colorize("⚠ WARNING:", self.color_scheme.warning)), warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("{} {}", self.strong(self.colorize("✓", self.color_scheme.success)), message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ProbeIdentity, SessionId};

    fn formatter() -> ColoredFormatter {
        ColoredFormatter::new(FormattingOptions {
            enable_color: false,
            ..FormattingOptions::default()
        })
    }

    #[test]
    fn test_performance_level_colors() {
        assert_eq!(PerformanceLevel::Good.color(), Color::Green);
        assert_eq!(PerformanceLevel::Poor.color(), Color::Red);
        assert_eq!(PerformanceLevel::Moderate.description(), "Moderate");
    }

    #[test]
    fn test_aggregate_includes_level() {
        let aggregate = AggregateStat {
            latency_secs: 0.080,
            bandwidth: 1_250_000.0,
            rtt: Duration::from_millis(170),
            samples: 10,
            rejected: 1,
        };
        let output = formatter().format_aggregate(&aggregate).unwrap();

        assert!(output.contains("80.000ms"));
        assert!(output.contains("(Moderate)"));
        assert!(output.contains("1.2 MB/s") || output.contains("1.3 MB/s"));
        assert!(output.contains("10 used, 1 rejected"));
    }

    #[test]
    fn test_lossy_probes_are_called_out() {
        let identity = ProbeIdentity::new(SessionId(1), 0);
        let summaries = vec![
            ProbeSummary { identity, size: 56, sent: 10, received: 10, foreign: 0, expired: 0, loss: 0.0 },
            ProbeSummary {
                identity: ProbeIdentity::new(SessionId(1), 1),
                size: 1472,
                sent: 10,
                received: 8,
                foreign: 0,
                expired: 2,
                loss: 0.2,
            },
        ];
        let output = formatter().format_probe_summaries(&summaries).unwrap();

        assert!(output.contains("probe 0001/1 (1472 bytes) lost 20.0%"));
        assert!(!output.contains("probe 0001/0"));
    }

    #[test]
    fn test_messages() {
        assert!(formatter().format_error("boom").unwrap().contains("boom"));
        assert!(formatter().format_warning("careful").unwrap().contains("WARNING"));
    }
}
