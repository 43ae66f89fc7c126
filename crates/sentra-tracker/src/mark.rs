//! Change marks: per-target high-water state for incremental scanning.
//!
//! A [`ChangeMark`] records how far a previous run got: a timestamp cursor
//! for row-oriented sources with an `updated_at` column, content digests for
//! files and objects, and the schema snapshot used for drift comparison.
//! Marks persist across runs and are committed only when a phase fully
//! completes, so a failed phase never advances the high-water state.

use sentra_core::Timestamp;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Structural descriptor of a target: containers and their typed fields.
///
/// `BTreeMap` keeps serialization stable so snapshots can be compared and
/// stored deterministically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    /// Containers (tables, prefixes, directories) keyed by name
    pub containers: BTreeMap<String, ContainerSchema>,
}

/// One container's fields, keyed by name, with a free-form type label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSchema {
    /// Field name → type label (`varchar`, `integer`, file extension, ...)
    pub fields: BTreeMap<String, String>,
}

impl SchemaSnapshot {
    /// Add a container with its fields.
    pub fn add_container(
        &mut self,
        name: impl Into<String>,
        fields: impl IntoIterator<Item = (String, String)>,
    ) {
        self.containers.insert(
            name.into(),
            ContainerSchema {
                fields: fields.into_iter().collect(),
            },
        );
    }
}

/// Per-target high-water state used to compute deltas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeMark {
    /// Newest `updated_at` seen in a committed phase
    pub cursor: Option<Timestamp>,
    /// Content digests keyed by unit id (file path, object key)
    pub digests: BTreeMap<String, String>,
    /// Schema snapshot from the last committed metadata phase
    pub schema: Option<SchemaSnapshot>,
}

impl ChangeMark {
    /// An empty mark: everything is considered changed against it.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether this mark has any recorded state.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cursor.is_none() && self.digests.is_empty() && self.schema.is_none()
    }
}

/// Observed state of one scannable unit (row batch, file, object).
#[derive(Debug, Clone)]
pub struct UnitState {
    /// Stable unit identifier: row id, file path, object key
    pub id: String,
    /// The unit's modification timestamp, when the source exposes one
    pub updated_at: Option<Timestamp>,
    /// SHA-256 content digest, for sources without timestamps
    pub digest: Option<String>,
}

impl UnitState {
    /// Unit tracked by modification timestamp.
    #[must_use]
    pub fn with_timestamp(id: impl Into<String>, updated_at: Timestamp) -> Self {
        Self {
            id: id.into(),
            updated_at: Some(updated_at),
            digest: None,
        }
    }

    /// Unit tracked by content digest.
    #[must_use]
    pub fn with_content(id: impl Into<String>, content: &[u8]) -> Self {
        Self {
            id: id.into(),
            updated_at: None,
            digest: Some(digest_bytes(content)),
        }
    }
}

/// SHA-256 digest of content, hex-encoded.
#[must_use]
pub fn digest_bytes(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_stable() {
        assert_eq!(digest_bytes(b"hello"), digest_bytes(b"hello"));
        assert_ne!(digest_bytes(b"hello"), digest_bytes(b"world"));
    }

    #[test]
    fn test_empty_mark() {
        let mark = ChangeMark::empty();
        assert!(mark.is_empty());
    }

    #[test]
    fn test_mark_roundtrip() {
        let mut mark = ChangeMark::empty();
        mark.cursor = Some(Timestamp::from_rfc3339("2026-01-15T10:00:00Z").expect("valid ts"));
        mark.digests
            .insert("/data/a.txt".to_string(), digest_bytes(b"content"));

        let json = serde_json::to_string(&mark).expect("serialize mark");
        let parsed: ChangeMark = serde_json::from_str(&json).expect("deserialize mark");
        assert_eq!(parsed, mark);
    }

    #[test]
    fn test_schema_snapshot_ordering_stable() {
        let mut a = SchemaSnapshot::default();
        a.add_container(
            "customers",
            vec![
                ("phone".to_string(), "varchar".to_string()),
                ("email".to_string(), "varchar".to_string()),
            ],
        );

        let mut b = SchemaSnapshot::default();
        b.add_container(
            "customers",
            vec![
                ("email".to_string(), "varchar".to_string()),
                ("phone".to_string(), "varchar".to_string()),
            ],
        );

        // Insertion order must not matter
        assert_eq!(
            serde_json::to_string(&a).expect("serialize"),
            serde_json::to_string(&b).expect("serialize")
        );
    }
}
