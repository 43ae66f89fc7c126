//! Shared types used across the Sentra engine.
//!
//! This module defines common newtypes and enums that provide type safety
//! and clear domain modeling.

use crate::error::SentraError;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Newtype for scan target identifiers with validation.
///
/// Target IDs must be lowercase alphanumeric with hyphens, 3-50 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetId(String);

impl TargetId {
    /// Create a new `TargetId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID doesn't match the required format.
    pub fn new(id: impl Into<String>) -> Result<Self, SentraError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate target ID format: lowercase alphanumeric with hyphens, 3-50 chars.
    fn validate(id: &str) -> Result<(), SentraError> {
        static TARGET_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = TARGET_REGEX
            .get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9-]{1,48}[a-z0-9]$").expect("valid regex"));

        if id.len() < 3 || id.len() > 50 {
            return Err(SentraError::Validation(format!(
                "invalid target ID: must be 3-50 characters, got {} characters",
                id.len()
            )));
        }

        if regex.is_match(id) {
            Ok(())
        } else {
            Err(SentraError::Validation(format!(
                "invalid target ID: must be lowercase alphanumeric with hyphens, got '{id}'"
            )))
        }
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype for scan run identifiers.
///
/// Run IDs must be valid UUIDs (v4 format).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(String);

impl RunId {
    /// Create a new `RunId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID is not a valid UUID v4.
    pub fn new(id: impl Into<String>) -> Result<Self, SentraError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Create a new random `RunId` using UUID v4.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate that a string is a valid UUID v4.
    fn validate(id: &str) -> Result<(), SentraError> {
        static UUID_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = UUID_REGEX.get_or_init(|| {
            Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
                .expect("valid regex")
        });

        if regex.is_match(id) {
            Ok(())
        } else {
            Err(SentraError::Validation(format!(
                "invalid run ID: must be a valid UUID v4, got '{id}'"
            )))
        }
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype for PII entity type labels.
///
/// Entity types are uppercase identifiers such as `EMAIL_ADDRESS` or `ID_NIK`.
/// The set is open: rule records may introduce new entity types at load time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityType(String);

impl EntityType {
    /// Create a new `EntityType` from a string.
    ///
    /// # Errors
    /// Returns error if the label is not uppercase alphanumeric with underscores.
    pub fn new(label: impl Into<String>) -> Result<Self, SentraError> {
        let label = label.into();
        Self::validate(&label)?;
        Ok(Self(label))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate entity type format: uppercase alphanumeric with underscores, 2-40 chars.
    fn validate(label: &str) -> Result<(), SentraError> {
        static ENTITY_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = ENTITY_REGEX
            .get_or_init(|| Regex::new(r"^[A-Z][A-Z0-9_]{1,39}$").expect("valid regex"));

        if regex.is_match(label) {
            Ok(())
        } else {
            Err(SentraError::Validation(format!(
                "invalid entity type: must be uppercase alphanumeric with underscores, got '{label}'"
            )))
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sensitivity classification for detected PII.
///
/// `Specific` covers identity documents, tax numbers, and payment data that
/// regulations treat as a distinct class; everything else is `General`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sensitivity {
    /// General personal data (names, emails, phone numbers)
    General,
    /// Specific/sensitive personal data (identity numbers, payment data)
    Specific,
}

impl fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::General => write!(f, "General"),
            Self::Specific => write!(f, "Specific"),
        }
    }
}

/// Kind of data source a scan target points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// Local or mounted filesystem
    File,
    /// Relational database
    Database,
    /// Object store (bucket/key addressing)
    ObjectStore,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Database => write!(f, "database"),
            Self::ObjectStore => write!(f, "object-store"),
        }
    }
}

/// How much of a target a scheduled scan is allowed to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanScope {
    /// Structural metadata only, no content reads
    Metadata,
    /// Bounded sample of content
    Sample,
    /// Everything, ignoring change marks
    Full,
}

impl fmt::Display for ScanScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metadata => write!(f, "metadata"),
            Self::Sample => write!(f, "sample"),
            Self::Full => write!(f, "full"),
        }
    }
}

/// Where a finding was detected, tagged by source kind.
///
/// A closed union rather than an open map: every connector locates content
/// with the same small set of coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "source_type", rename_all = "kebab-case")]
pub enum DataLocation {
    /// A file on a filesystem source
    File {
        /// Absolute or source-relative file path
        path: String,
        /// Page or line number within the file, if known
        position: Option<u64>,
    },
    /// A cell in a relational database
    Database {
        /// Database name
        database: String,
        /// Table name
        table: String,
        /// Column name
        column: String,
        /// Row index or primary key position, if known
        row: Option<u64>,
    },
    /// An object in an object store
    ObjectStore {
        /// Bucket name
        bucket: String,
        /// Object key
        key: String,
        /// Byte or record offset within the object, if known
        position: Option<u64>,
    },
}

impl DataLocation {
    /// The containing unit: sheet/table name for structured sources,
    /// the file path or bucket otherwise.
    #[must_use]
    pub fn container(&self) -> &str {
        match self {
            Self::File { path, .. } => path,
            Self::Database { table, .. } => table,
            Self::ObjectStore { bucket, .. } => bucket,
        }
    }

    /// The field (column) name for structured sources; the object key for
    /// object stores; `None` for plain files.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::File { .. } => None,
            Self::Database { column, .. } => Some(column),
            Self::ObjectStore { key, .. } => Some(key),
        }
    }

    /// The position (row/page/offset) within the container, if known.
    #[must_use]
    pub fn position(&self) -> Option<u64> {
        match self {
            Self::File { position, .. } | Self::ObjectStore { position, .. } => *position,
            Self::Database { row, .. } => *row,
        }
    }

    /// The source kind this location belongs to.
    #[must_use]
    pub fn source_kind(&self) -> SourceKind {
        match self {
            Self::File { .. } => SourceKind::File,
            Self::Database { .. } => SourceKind::Database,
            Self::ObjectStore { .. } => SourceKind::ObjectStore,
        }
    }
}

/// Wrapper around `chrono::DateTime<Utc>` for consistent timestamp handling.
///
/// Provides serialization/deserialization and utility methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp representing the current moment.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create a timestamp from a `DateTime<Utc>`.
    #[must_use]
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Get the inner `DateTime<Utc>`.
    #[must_use]
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Parse a timestamp from an RFC3339 string.
    pub fn from_rfc3339(s: &str) -> Result<Self, SentraError> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .map_err(|e| SentraError::Validation(format!("invalid timestamp: {e}")))
    }

    /// Format as RFC3339 string.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Get seconds since Unix epoch.
    #[must_use]
    pub fn timestamp(&self) -> i64 {
        self.0.timestamp()
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}
