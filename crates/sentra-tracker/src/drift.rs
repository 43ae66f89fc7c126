//! Drift events: structural and content changes between runs.

use crate::mark::SchemaSnapshot;
use sentra_core::{TargetId, Timestamp};
use sentra_engine::mask_value;
use serde::{Deserialize, Serialize};
use tracing::info;

/// What kind of change a drift event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriftKind {
    /// Schema shape changed between runs (column/table added, removed, retyped)
    MetadataDrift,
    /// Row/object content changed in a PII-bearing field
    DataChange,
}

impl std::fmt::Display for DriftKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MetadataDrift => write!(f, "METADATA_DRIFT"),
            Self::DataChange => write!(f, "DATA_CHANGE"),
        }
    }
}

/// A structural or content change observed on a target.
///
/// Write-once: events are never mutated retroactively; corrections are new
/// events. Sample values are masked before the event is constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftEvent {
    /// Target the change was observed on
    pub target_id: TargetId,
    /// Change classification
    pub kind: DriftKind,
    /// What changed: `container.field` for schema drift, unit id for data changes
    pub subject: String,
    /// Human-readable description of the change
    pub description: String,
    /// Masked previous value, when one exists
    pub masked_before: Option<String>,
    /// Masked new value, when one exists
    pub masked_after: Option<String>,
    /// When the change was detected
    pub detected_at: Timestamp,
}

impl DriftEvent {
    /// Build a data-change event with both samples masked.
    ///
    /// The raw values stop here: only masked strings are stored. The
    /// previous value is absent when the mark only retained a digest.
    #[must_use]
    pub fn data_change(
        target_id: TargetId,
        unit_id: &str,
        field: &str,
        before_raw: Option<&str>,
        after_raw: &str,
    ) -> Self {
        Self {
            target_id,
            kind: DriftKind::DataChange,
            subject: unit_id.to_string(),
            description: format!("field '{field}' content changed"),
            masked_before: before_raw.map(mask_value),
            masked_after: Some(mask_value(after_raw)),
            detected_at: Timestamp::now(),
        }
    }
}

/// Compare two schema snapshots and emit drift events for every difference.
///
/// Additions, removals, and type changes are each reported; a renamed
/// column surfaces as one removal plus one addition. Drift must be visible
/// even when no PII content changed, so this runs before data scanning.
#[must_use]
pub fn compare_schemas(
    target_id: &TargetId,
    previous: &SchemaSnapshot,
    current: &SchemaSnapshot,
) -> Vec<DriftEvent> {
    let mut events = Vec::new();
    let now = Timestamp::now();

    for (name, prev_container) in &previous.containers {
        match current.containers.get(name) {
            None => {
                events.push(DriftEvent {
                    target_id: target_id.clone(),
                    kind: DriftKind::MetadataDrift,
                    subject: name.clone(),
                    description: "container removed".to_string(),
                    masked_before: None,
                    masked_after: None,
                    detected_at: now,
                });
            }
            Some(curr_container) => {
                for (field, prev_type) in &prev_container.fields {
                    match curr_container.fields.get(field) {
                        None => {
                            events.push(DriftEvent {
                                target_id: target_id.clone(),
                                kind: DriftKind::MetadataDrift,
                                subject: format!("{name}.{field}"),
                                description: "field removed".to_string(),
                                masked_before: None,
                                masked_after: None,
                                detected_at: now,
                            });
                        }
                        Some(curr_type) if curr_type != prev_type => {
                            events.push(DriftEvent {
                                target_id: target_id.clone(),
                                kind: DriftKind::MetadataDrift,
                                subject: format!("{name}.{field}"),
                                description: format!(
                                    "field type changed from {prev_type} to {curr_type}"
                                ),
                                masked_before: None,
                                masked_after: None,
                                detected_at: now,
                            });
                        }
                        Some(_) => {}
                    }
                }

                for field in curr_container.fields.keys() {
                    if !prev_container.fields.contains_key(field) {
                        events.push(DriftEvent {
                            target_id: target_id.clone(),
                            kind: DriftKind::MetadataDrift,
                            subject: format!("{name}.{field}"),
                            description: "field added".to_string(),
                            masked_before: None,
                            masked_after: None,
                            detected_at: now,
                        });
                    }
                }
            }
        }
    }

    for name in current.containers.keys() {
        if !previous.containers.contains_key(name) {
            events.push(DriftEvent {
                target_id: target_id.clone(),
                kind: DriftKind::MetadataDrift,
                subject: name.clone(),
                description: "container added".to_string(),
                masked_before: None,
                masked_after: None,
                detected_at: now,
            });
        }
    }

    if !events.is_empty() {
        info!(
            target = %target_id,
            count = events.len(),
            "schema drift detected"
        );
    }

    events
}
