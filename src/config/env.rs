//! Environment variable handling and .env file management

use crate::error::{AppError, Result};
use crate::models::{config::parse_size_list, OutlierChoice};
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load `.env` from the working directory if present
    ///
    /// Variables already set in the process environment win over the file.
    pub fn load_env_file() -> Result<bool> {
        Self::load_env_file_from(Path::new(".env"))
    }

    pub fn load_env_file_from(path: &Path) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }

        dotenv::from_path(path)
            .map_err(|e| AppError::config(format!("Failed to load {}: {}", path.display(), e)))?;
        Ok(true)
    }

    /// Example `.env` content listing every supported variable
    pub fn create_example_env_content() -> String {
        let mut content = String::from(
            "# pairprobe configuration\n\
             #\n\
             # Values here are defaults; environment variables and command-line\n\
             # arguments override them.\n",
        );

        for (var, description, example) in Self::get_supported_env_vars() {
            content.push_str(&format!("\n# {}\n# {}={}\n", description, var, example));
        }

        content
    }

    /// Save example .env file to disk
    pub fn save_example_env_file(path: &Path) -> Result<()> {
        std::fs::write(path, Self::create_example_env_content())
            .map_err(|e| AppError::config(format!("Failed to write example .env file: {}", e)))
    }

    /// Validate one variable's format without touching a [`crate::Config`]
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "PROBE_TARGET" => {
                if value.is_empty() {
                    return Err(AppError::config("PROBE_TARGET cannot be empty"));
                }
            }
            "PROBE_SIZES" => {
                let sizes = parse_size_list(value)
                    .map_err(|e| AppError::config(format!("Invalid PROBE_SIZES value '{}': {}", value, e)))?;
                if sizes.len() < 2 {
                    return Err(AppError::config("PROBE_SIZES needs at least two sizes"));
                }
            }
            "PROBE_COUNT" | "PROBE_DURATION_SECS" | "PROBE_INTERVAL_MS" | "PROBE_TIMEOUT_MS"
            | "RECORDER_CAPACITY" => {
                let n: u64 = value
                    .parse()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
                if n == 0 {
                    return Err(AppError::config(format!("{} must be greater than 0", key)));
                }
            }
            "BIND_ADDRESS" => {
                if !value.is_empty() {
                    value
                        .parse::<std::net::IpAddr>()
                        .map_err(|e| AppError::config(format!("Invalid BIND_ADDRESS '{}': {}", value, e)))?;
                }
            }
            "OUTLIER_METHOD" => {
                value.parse::<OutlierChoice>()?;
            }
            "ENABLE_COLOR" => {
                value
                    .parse::<bool>()
                    .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", value, e)))?;
            }
            _ => {}
        }

        Ok(())
    }

    /// Supported variables with a description and an example value
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("PROBE_TARGET", "Host name or IP address to probe", "192.0.2.1"),
            ("PROBE_SIZES", "Comma-separated echo payload sizes in bytes", "56,1472"),
            ("PROBE_COUNT", "Requests per probe", "100"),
            ("PROBE_DURATION_SECS", "Seconds to keep sending", "5"),
            ("PROBE_INTERVAL_MS", "Milliseconds between requests", "200"),
            ("PROBE_TIMEOUT_MS", "Milliseconds before a request counts as lost", "2000"),
            ("BIND_ADDRESS", "Local address to send from", "10.0.0.2"),
            ("OUTLIER_METHOD", "Outlier rejection: mad, iqr or none", "mad"),
            ("RECORDER_CAPACITY", "Sequence groups kept in memory", "4096"),
            ("ENABLE_COLOR", "Enable colored output", "true"),
        ]
    }

    /// Warnings for every currently set variable that does not parse
    pub fn validate_current_env() -> Vec<String> {
        Self::get_supported_env_vars()
            .into_iter()
            .filter_map(|(var, _, _)| {
                let value = std::env::var(var).ok()?;
                Self::validate_env_var(var, &value)
                    .err()
                    .map(|e| format!("Warning: {}", e))
            })
            .collect()
    }
}
