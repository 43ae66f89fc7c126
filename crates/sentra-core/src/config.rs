//! Configuration management for Sentra.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main application configuration.
///
/// This is loaded from `~/.config/sentra/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Scanning behavior settings
    pub scanning: ScanningConfig,
    /// Detection and scoring settings
    pub detection: DetectionConfig,
    /// Content analysis settings
    pub analysis: AnalysisConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(&config_path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `SENTRA_WORKER_COUNT`: Override worker pool size
    /// - `SENTRA_SAMPLE_ROWS`: Override smart-sample row count
    /// - `SENTRA_SCORE_THRESHOLD`: Override minimum reported score
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;

        // Override from environment
        if let Ok(val) = std::env::var("SENTRA_WORKER_COUNT") {
            if let Ok(workers) = val.parse() {
                config.scanning.worker_count = workers;
                tracing::debug!("Override worker_count from env: {}", workers);
            }
        }

        if let Ok(val) = std::env::var("SENTRA_SAMPLE_ROWS") {
            if let Ok(rows) = val.parse() {
                config.scanning.sample_rows = rows;
                tracing::debug!("Override sample_rows from env: {}", rows);
            }
        }

        if let Ok(val) = std::env::var("SENTRA_SCORE_THRESHOLD") {
            if let Ok(threshold) = val.parse() {
                config.detection.score_threshold = threshold;
                tracing::debug!("Override score_threshold from env: {}", threshold);
            }
        }

        Ok(config)
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/sentra/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "sentra", "sentra").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/sentra`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "sentra", "sentra").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.data_dir().to_path_buf())
    }
}

/// Scanning behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanningConfig {
    /// Number of concurrent item workers per target run
    pub worker_count: usize,
    /// Rows/files read per flagged item during smart sampling
    pub sample_rows: usize,
    /// Per-item classification timeout in seconds
    pub item_timeout_secs: u64,
    /// Maximum file size to read, in megabytes
    pub max_file_size_mb: u64,
}

impl Default for ScanningConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            sample_rows: 50,
            item_timeout_secs: 60,
            max_file_size_mb: 100,
        }
    }
}

/// Detection and scoring settings.
///
/// The boost increment and window radius are tunables, not constants: the
/// defaults are starting points, not calibrated values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Token radius of the context window around a match span
    pub context_window_tokens: usize,
    /// Score added per matching proximity rule
    pub proximity_boost: f64,
    /// Minimum final score for a finding to be reported
    pub score_threshold: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            context_window_tokens: 10,
            proximity_boost: 0.15,
            score_threshold: 0.4,
        }
    }
}

/// Content analysis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Shannon entropy (bits/byte) above which content is likely encrypted
    pub entropy_threshold: f64,
    /// Cosine similarity above which two documents are near-duplicates
    pub similarity_threshold: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            entropy_threshold: 7.2,
            similarity_threshold: 0.9,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.scanning.worker_count, 4);
        assert_eq!(config.scanning.sample_rows, 50);
        assert_eq!(config.detection.context_window_tokens, 10);
        assert!((config.detection.proximity_boost - 0.15).abs() < f64::EPSILON);
        assert!((config.analysis.entropy_threshold - 7.2).abs() < f64::EPSILON);
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("[scanning]"));
        assert!(toml_str.contains("[detection]"));
        assert!(toml_str.contains("[analysis]"));

        let parsed: AppConfig = toml::from_str(&toml_str).expect("parse serialized config");
        assert_eq!(parsed.scanning.worker_count, config.scanning.worker_count);
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("config.toml");

        // Create a custom config
        let mut config = AppConfig::default();
        config.scanning.worker_count = 8;
        config.detection.score_threshold = 0.6;

        // Save
        let contents = toml::to_string_pretty(&config).expect("serialize config");
        fs::write(&config_path, contents).expect("write config file");

        // Load
        let loaded_contents = fs::read_to_string(&config_path).expect("read config file");
        let loaded: AppConfig = toml::from_str(&loaded_contents).expect("parse loaded config");

        assert_eq!(loaded.scanning.worker_count, 8);
        assert!((loaded.detection.score_threshold - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn test_partial_config() {
        // Test that partial TOML configs work with defaults
        let toml_str = r#"
[detection]
proximity_boost = 0.2

[scanning]
sample_rows = 25
"#;

        let config: AppConfig = toml::from_str(toml_str).expect("parse partial config");
        assert!((config.detection.proximity_boost - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.scanning.sample_rows, 25);
        // These should be defaults
        assert_eq!(config.scanning.worker_count, 4);
        assert_eq!(config.detection.context_window_tokens, 10);
    }
}
