//! Error types for the rule registry.

use thiserror::Error;

/// Errors that can occur while loading or compiling detection rules.
#[derive(Error, Debug)]
pub enum RuleError {
    /// Rule pattern failed to compile
    #[error("invalid pattern in rule '{name}': {source}")]
    InvalidPattern {
        /// Name of the offending rule
        name: String,
        /// Regex compile error
        #[source]
        source: regex::Error,
    },

    /// Rule references an entity type unknown to the snapshot
    #[error("rule '{name}' references unknown entity type '{entity_type}'")]
    UnknownEntityType {
        /// Name of the offending rule
        name: String,
        /// The unreferenced entity type
        entity_type: String,
    },

    /// Stored record carries a rule type outside the closed set
    #[error("rule '{name}' has unknown rule type '{rule_type}'")]
    UnknownKind {
        /// Name of the offending rule
        name: String,
        /// The raw stored rule type
        rule_type: String,
    },

    /// Invalid rule record (validation failed)
    #[error("invalid rule '{name}': {reason}")]
    ValidationError {
        /// Name of the offending rule
        name: String,
        /// Reason for validation failure
        reason: String,
    },

    /// Rule definitions directory not found
    #[error("rule definitions directory not found at {path}")]
    DirectoryNotFound {
        /// Expected directory path
        path: String,
    },

    /// Failed to parse rule definition TOML
    #[error("failed to parse rule definitions in {path}: {source}")]
    ParseError {
        /// Path to the definition file
        path: String,
        /// TOML parse error
        #[source]
        source: toml::de::Error,
    },

    /// Backing store failed to produce rule records
    #[error("rule store error: {0}")]
    Store(String),

    /// I/O error while accessing rule definitions
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid core value (entity type, score range)
    #[error("invalid value: {0}")]
    InvalidValue(#[from] sentra_core::SentraError),
}

/// Result type for rule operations.
pub type Result<T> = std::result::Result<T, RuleError>;
