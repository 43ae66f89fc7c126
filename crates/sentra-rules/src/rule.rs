//! Detection rule records and the tagged-variant rule kinds.
//!
//! Rule records arrive from external stores (database rows, TOML files) with
//! an open string `rule_type`. They are parsed into the closed [`RuleKind`]
//! set at load time; unknown kinds are rejected explicitly rather than
//! dispatched on by name downstream.

use crate::error::{Result, RuleError};
use sentra_core::{EntityType, Sensitivity};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of rule kinds understood by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Pattern recognizer emitting candidates at the rule's base score
    Regex,
    /// Context rule boosting candidates of its entity type
    Proximity,
    /// Removes a named built-in recognizer from the effective set
    DisableDefault,
    /// Adds literal values to an entity type's deny set
    FalsePositive,
}

impl RuleKind {
    /// Parse a stored rule type string into a kind.
    ///
    /// # Errors
    /// Returns `RuleError::UnknownKind` for anything outside the closed set.
    pub fn parse(rule_type: &str, rule_name: &str) -> Result<Self> {
        match rule_type {
            "regex" => Ok(Self::Regex),
            "proximity" => Ok(Self::Proximity),
            "disable_default" => Ok(Self::DisableDefault),
            "false_positive" => Ok(Self::FalsePositive),
            other => Err(RuleError::UnknownKind {
                name: rule_name.to_string(),
                rule_type: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Regex => write!(f, "regex"),
            Self::Proximity => write!(f, "proximity"),
            Self::DisableDefault => write!(f, "disable_default"),
            Self::FalsePositive => write!(f, "false_positive"),
        }
    }
}

/// A rule record as stored externally, before kind parsing.
///
/// This is the wire/storage shape shared by the TOML loader and the
/// database store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleRecord {
    /// Stable identifier assigned by the store
    pub id: String,
    /// Unique rule name
    pub name: String,
    /// Open rule type string, parsed into [`RuleKind`] at load time
    pub rule_type: String,
    /// Pattern, keyword, literal value, or built-in name depending on kind
    pub pattern: String,
    /// Base confidence score in `[0, 1]`
    #[serde(default = "default_score")]
    pub score: f64,
    /// Entity type the rule produces or modifies
    #[serde(default)]
    pub entity_type: Option<String>,
    /// Context keywords for proximity rules
    #[serde(default)]
    pub context_keywords: Vec<String>,
    /// Sensitivity override for the rule's entity type
    #[serde(default)]
    pub sensitivity: Option<Sensitivity>,
    /// Whether the rule participates in compilation
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_score() -> f64 {
    0.5
}

fn default_active() -> bool {
    true
}

/// Parse context keywords stored as a JSON array or comma-separated string.
///
/// Stores that predate the structured column keep keywords as
/// `"[\"nik\", \"ktp\"]"` or `"nik, ktp"`; both shapes are accepted.
#[must_use]
pub fn parse_context_keywords(raw: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }

    if let Ok(serde_json::Value::Array(items)) = serde_json::from_str(raw) {
        return items
            .into_iter()
            .filter_map(|v| match v {
                serde_json::Value::String(s) => {
                    let s = s.trim().to_string();
                    (!s.is_empty()).then_some(s)
                }
                _ => None,
            })
            .collect();
    }

    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// A validated detection rule with its kind resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionRule {
    /// Stable identifier from the store
    pub id: String,
    /// Unique rule name
    pub name: String,
    /// Parsed rule kind
    pub kind: RuleKind,
    /// Pattern, keyword list source, literal value, or built-in name
    pub pattern: String,
    /// Base confidence score in `[0, 1]`
    pub base_score: f64,
    /// Entity type the rule produces or modifies.
    ///
    /// Required for every kind except `DisableDefault`, which names a
    /// built-in recognizer instead.
    pub entity_type: Option<EntityType>,
    /// Context keywords for proximity rules
    pub context_keywords: Vec<String>,
    /// Sensitivity override for the rule's entity type
    pub sensitivity: Option<Sensitivity>,
    /// Whether the rule participates in compilation
    pub active: bool,
}

impl DetectionRule {
    /// Parse a stored record into a validated rule.
    ///
    /// # Errors
    /// Returns error if the kind is unknown, the score is out of range,
    /// or a required entity type is missing or malformed.
    pub fn from_record(record: RuleRecord) -> Result<Self> {
        let kind = RuleKind::parse(&record.rule_type, &record.name)?;

        if record.name.is_empty() {
            return Err(RuleError::ValidationError {
                name: record.id.clone(),
                reason: "rule name cannot be empty".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&record.score) {
            return Err(RuleError::ValidationError {
                name: record.name.clone(),
                reason: format!("score must be in [0, 1], got {}", record.score),
            });
        }

        if record.pattern.is_empty() {
            return Err(RuleError::ValidationError {
                name: record.name.clone(),
                reason: "pattern cannot be empty".to_string(),
            });
        }

        // DisableDefault rules reference a built-in recognizer by name in
        // `pattern`; every other kind needs an entity type.
        let entity_type = match kind {
            RuleKind::DisableDefault => None,
            _ => {
                let label = record.entity_type.as_deref().unwrap_or_default();
                if label.is_empty() {
                    return Err(RuleError::ValidationError {
                        name: record.name.clone(),
                        reason: format!("{kind} rule requires an entity type"),
                    });
                }
                Some(EntityType::new(label)?)
            }
        };

        Ok(Self {
            id: record.id,
            name: record.name,
            kind,
            pattern: record.pattern,
            base_score: record.score,
            entity_type,
            context_keywords: record.context_keywords,
            sensitivity: record.sensitivity,
            active: record.active,
        })
    }
}
