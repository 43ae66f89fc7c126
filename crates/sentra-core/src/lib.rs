//! Sentra Core - Foundation crate for the Sentra PII discovery engine.
//!
//! This crate provides shared types, error handling, and configuration
//! management that all other Sentra crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes and enums (`TargetId`, `RunId`, `EntityType`,
//!   `DataLocation`, `Timestamp`)
//!
//! # Example
//!
//! ```rust
//! use sentra_core::{AppConfig, EntityType, Sensitivity};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! assert_eq!(config.detection.context_window_tokens, 10);
//!
//! let entity = EntityType::new("EMAIL_ADDRESS")?;
//! assert_eq!(entity.as_str(), "EMAIL_ADDRESS");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{AnalysisConfig, AppConfig, DetectionConfig, ScanningConfig};
pub use error::{ConfigError, ConfigResult, Result, SentraError};
pub use types::{
    DataLocation, EntityType, RunId, ScanScope, Sensitivity, SourceKind, TargetId, Timestamp,
};
