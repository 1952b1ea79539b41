//! Advisory checks on top of `Config::validate`

use crate::error::Result;
use crate::models::Config;
use colored::Colorize;

/// Largest echo payload that fits a 1500-byte Ethernet MTU without fragmenting
pub const UNFRAGMENTED_PAYLOAD: usize = 1472;

/// Size spread below which the dispersion signal drowns in timer noise
pub const MIN_SIZE_SPREAD: usize = 100;

/// Configuration validator producing non-fatal warnings
pub struct ConfigValidator;

impl ConfigValidator {
    /// Hard validation followed by advisory checks
    pub fn validate_comprehensive(config: &Config) -> Result<Vec<ValidationWarning>> {
        config.validate()?;

        let mut warnings = Vec::new();
        warnings.extend(Self::validate_probe_sizes(config));
        warnings.extend(Self::validate_timing(config));
        Ok(warnings)
    }

    fn validate_probe_sizes(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        for &size in &config.probe_sizes {
            if size > UNFRAGMENTED_PAYLOAD {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!(
                        "Probe size {} exceeds {} bytes and will likely be fragmented",
                        size, UNFRAGMENTED_PAYLOAD
                    ),
                ));
            }
        }

        let smallest = config.probe_sizes.iter().min();
        let largest = config.probe_sizes.iter().max();
        if let (Some(&smallest), Some(&largest)) = (smallest, largest) {
            if largest - smallest < MIN_SIZE_SPREAD {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!(
                        "Probe sizes differ by only {} bytes; bandwidth estimates will be noisy",
                        largest - smallest
                    ),
                ));
            }
        }

        warnings
    }

    fn validate_timing(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if let Some(duration) = config.duration() {
            if config.timeout() > duration {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!(
                        "Timeout of {}ms is longer than the {}s session",
                        config.timeout_ms,
                        duration.as_secs()
                    ),
                ));
            }
        }

        if config.interval_ms < 10 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "Interval of {}ms may trigger ICMP rate limiting on the path",
                    config.interval_ms
                ),
            ));
        }

        if config.count.is_some_and(|count| count < 10) {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                "Fewer than 10 pairs leave little room for outlier rejection".to_string(),
            ));
        }

        warnings
    }
}

/// Validation warning levels
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationLevel {
    Info,
    Warning,
    Error,
}

impl ValidationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

/// Configuration validation warning
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(level: ValidationLevel, message: String) -> Self {
        Self { level, message }
    }

    /// Format warning for display
    pub fn format(&self, use_color: bool) -> String {
        let tag = format!("[{}]", self.level.as_str());
        if !use_color {
            return format!("{} {}", tag, self.message);
        }

        let tag = match self.level {
            ValidationLevel::Info => tag.blue(),
            ValidationLevel::Warning => tag.yellow(),
            ValidationLevel::Error => tag.red(),
        };
        format!("{} {}", tag, self.message)
    }
}

/// Convenience function for comprehensive configuration validation
pub fn validate_config(config: &Config) -> Result<Vec<ValidationWarning>> {
    ConfigValidator::validate_comprehensive(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            target: "192.0.2.1".to_string(),
            ..Config::default()
        }
    }

    fn messages(warnings: &[ValidationWarning]) -> Vec<&str> {
        warnings.iter().map(|w| w.message.as_str()).collect()
    }

    #[test]
    fn test_defaults_produce_no_warnings() {
        let warnings = validate_config(&config()).unwrap();
        assert!(warnings.is_empty(), "{:?}", messages(&warnings));
    }

    #[test]
    fn test_fragmentation_warning() {
        let config = Config {
            probe_sizes: vec![64, 4000],
            ..config()
        };
        let warnings = validate_config(&config).unwrap();
        assert!(messages(&warnings).iter().any(|m| m.contains("fragmented")));
    }

    #[test]
    fn test_small_spread_warning() {
        let config = Config {
            probe_sizes: vec![64, 100],
            ..config()
        };
        let warnings = validate_config(&config).unwrap();
        assert!(messages(&warnings).iter().any(|m| m.contains("differ by only 36 bytes")));
    }

    #[test]
    fn test_timing_warnings() {
        let config = Config {
            duration_secs: Some(1),
            timeout_ms: 5000,
            interval_ms: 5,
            ..config()
        };
        let warnings = validate_config(&config).unwrap();
        let messages = messages(&warnings);
        assert!(messages.iter().any(|m| m.contains("longer than the 1s session")));
        assert!(messages.iter().any(|m| m.contains("rate limiting")));
    }

    #[test]
    fn test_hard_errors_propagate() {
        let config = Config {
            probe_sizes: vec![64],
            ..config()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_warning_format() {
        let warning = ValidationWarning::new(ValidationLevel::Warning, "careful".to_string());
        assert_eq!(warning.format(false), "[WARNING] careful");
    }
}
