//! Result aggregation.
//!
//! Raw findings are too granular to report; consumers want one row per
//! `(container, field, entity_type)` group with a count, the strongest
//! score, and a masked sample. Findings arrive masked, so this module
//! never handles raw values.

use sentra_core::{EntityType, Sensitivity};
use sentra_db::scan_results::NewScanResult;
use sentra_engine::Finding;
use std::collections::BTreeMap;

/// Maximum distinct masked samples retained per group for display.
const MAX_SAMPLES_PER_GROUP: usize = 5;

/// One aggregated result group.
#[derive(Debug, Clone)]
pub struct AggregatedResult {
    /// Containing table/sheet/file
    pub container: String,
    /// Column/field name, when the source is structured
    pub field: Option<String>,
    /// Detected entity type
    pub entity_type: EntityType,
    /// Number of findings in the group
    pub count: u32,
    /// Highest final score in the group
    pub max_score: f64,
    /// Masked sample from the highest-scoring finding
    pub sample_masked: Option<String>,
    /// Up to five distinct masked samples for display
    pub samples: Vec<String>,
    /// Sensitivity classification of the entity type
    pub sensitivity: Sensitivity,
}

impl AggregatedResult {
    /// Convert to the persistence row shape.
    #[must_use]
    pub fn into_record(self) -> NewScanResult {
        NewScanResult {
            container: self.container,
            field: self.field,
            entity_type: self.entity_type.to_string(),
            finding_count: self.count,
            max_score: self.max_score,
            sample_masked: self.sample_masked,
            sensitivity: self.sensitivity.to_string(),
        }
    }
}

/// Group findings by `(container, field, entity_type)`.
///
/// Groups are returned in key order for deterministic output.
#[must_use]
pub fn aggregate(findings: &[Finding]) -> Vec<AggregatedResult> {
    let mut groups: BTreeMap<(String, Option<String>, String), AggregatedResult> = BTreeMap::new();

    for finding in findings {
        let key = (
            finding.location.container().to_string(),
            finding.location.field().map(ToString::to_string),
            finding.entity_type.to_string(),
        );

        let entry = groups.entry(key).or_insert_with(|| AggregatedResult {
            container: finding.location.container().to_string(),
            field: finding.location.field().map(ToString::to_string),
            entity_type: finding.entity_type.clone(),
            count: 0,
            max_score: 0.0,
            sample_masked: None,
            samples: Vec::new(),
            sensitivity: finding.sensitivity,
        });

        entry.count += 1;

        if finding.final_score > entry.max_score || entry.sample_masked.is_none() {
            entry.max_score = entry.max_score.max(finding.final_score);
            entry.sample_masked = Some(finding.masked_sample.clone());
        }

        if entry.samples.len() < MAX_SAMPLES_PER_GROUP
            && !entry.samples.contains(&finding.masked_sample)
        {
            entry.samples.push(finding.masked_sample.clone());
        }
    }

    groups.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentra_core::DataLocation;

    fn finding(column: &str, entity: &str, score: f64, sample: &str) -> Finding {
        Finding {
            entity_type: EntityType::new(entity).expect("valid entity type"),
            masked_sample: sample.to_string(),
            final_score: score,
            sensitivity: Sensitivity::General,
            location: DataLocation::Database {
                database: "corebanking".to_string(),
                table: "customers".to_string(),
                column: column.to_string(),
                row: None,
            },
        }
    }

    #[test]
    fn test_grouping_by_field_and_entity() {
        let findings = vec![
            finding("email", "EMAIL_ADDRESS", 0.6, "a***@x.com"),
            finding("email", "EMAIL_ADDRESS", 0.75, "b***@y.com"),
            finding("phone", "PHONE_NUMBER", 0.5, "08********90"),
        ];

        let results = aggregate(&findings);
        assert_eq!(results.len(), 2);

        let email_group = results
            .iter()
            .find(|r| r.entity_type.as_str() == "EMAIL_ADDRESS")
            .expect("email group present");
        assert_eq!(email_group.count, 2);
        assert!((email_group.max_score - 0.75).abs() < 1e-9);
        // Sample comes from the highest-scoring member
        assert_eq!(email_group.sample_masked.as_deref(), Some("b***@y.com"));
    }

    #[test]
    fn test_samples_capped_and_distinct() {
        let findings: Vec<Finding> = (0..10)
            .map(|i| finding("email", "EMAIL_ADDRESS", 0.5, &format!("u{i}***@x.com")))
            .collect();
        let mut repeated = findings.clone();
        repeated.push(finding("email", "EMAIL_ADDRESS", 0.5, "u0***@x.com"));

        let results = aggregate(&repeated);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].count, 11);
        assert_eq!(results[0].samples.len(), 5);
    }

    #[test]
    fn test_empty_input() {
        assert!(aggregate(&[]).is_empty());
    }

    #[test]
    fn test_deterministic_order() {
        let findings = vec![
            finding("phone", "PHONE_NUMBER", 0.5, "08********90"),
            finding("email", "EMAIL_ADDRESS", 0.6, "a***@x.com"),
        ];

        let first = aggregate(&findings);
        let second = aggregate(&findings);
        let keys: Vec<_> = first.iter().map(|r| r.field.clone()).collect();
        let keys2: Vec<_> = second.iter().map(|r| r.field.clone()).collect();
        assert_eq!(keys, keys2);
        // BTreeMap ordering: email before phone
        assert_eq!(first[0].field.as_deref(), Some("email"));
    }

    #[test]
    fn test_into_record() {
        let findings = vec![finding("email", "EMAIL_ADDRESS", 0.6, "a***@x.com")];
        let record = aggregate(&findings).remove(0).into_record();
        assert_eq!(record.entity_type, "EMAIL_ADDRESS");
        assert_eq!(record.finding_count, 1);
        assert_eq!(record.sensitivity, "General");
    }
}
