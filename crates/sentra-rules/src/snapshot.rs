//! Rule snapshot compilation.
//!
//! A [`RuleSnapshot`] is an immutable, versioned compilation of the active
//! rule set taken at the start of a scan run. Workers share it read-only for
//! the run's duration; rule edits in the store only affect subsequent runs.
//!
//! Compilation is partial-failure tolerant: one bad rule is skipped and
//! logged, never disabling the rest of the registry.

use crate::builtin::{default_recognizers, BuiltinRecognizer};
use crate::rule::{DetectionRule, RuleKind, RuleRecord};
use regex::Regex;
use sentra_core::{EntityType, Sensitivity, Timestamp};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Entity types classified `Specific` unless a rule overrides them.
const SPECIFIC_ENTITY_TYPES: &[&str] = &[
    "NATIONAL_ID",
    "TAX_ID",
    "CREDIT_CARD",
    "SSN",
    "BANK_ACCOUNT",
    "ID_NIK",
    "ID_NPWP",
];

/// A regex rule compiled and ready to run.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    /// Rule name
    pub name: String,
    /// Entity type emitted for matches
    pub entity_type: EntityType,
    /// Compiled pattern
    pub regex: Regex,
    /// Base confidence score for raw matches
    pub base_score: f64,
}

/// A proximity rule with normalized keywords.
#[derive(Debug, Clone)]
pub struct ProximityRule {
    /// Rule name
    pub name: String,
    /// Entity type whose candidates this rule boosts
    pub entity_type: EntityType,
    /// Lowercased context keywords
    pub keywords: Vec<String>,
}

/// A rule that failed compilation and was excluded from the snapshot.
#[derive(Debug, Clone)]
pub struct SkippedRule {
    /// Name (or id, when the name is unusable) of the skipped rule
    pub name: String,
    /// Human-readable reason
    pub reason: String,
}

/// Immutable compiled rule set for one scan run.
#[derive(Debug)]
pub struct RuleSnapshot {
    version: String,
    compiled_at: Timestamp,
    builtins: Vec<BuiltinRecognizer>,
    rules: Vec<CompiledRule>,
    proximity: Vec<ProximityRule>,
    deny: HashMap<EntityType, HashSet<String>>,
    sensitivity_overrides: HashMap<EntityType, Sensitivity>,
}

impl RuleSnapshot {
    /// Snapshot version (UUID v4, unique per compilation).
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// When this snapshot was compiled.
    #[must_use]
    pub fn compiled_at(&self) -> Timestamp {
        self.compiled_at
    }

    /// Built-in recognizers remaining after `disable_default` rules.
    #[must_use]
    pub fn builtins(&self) -> &[BuiltinRecognizer] {
        &self.builtins
    }

    /// Compiled regex rules.
    #[must_use]
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// Proximity rules whose entity type matches `entity`.
    pub fn proximity_rules_for<'a>(
        &'a self,
        entity: &'a EntityType,
    ) -> impl Iterator<Item = &'a ProximityRule> {
        self.proximity.iter().filter(move |p| &p.entity_type == entity)
    }

    /// Whether a normalized value sits in the entity type's deny set.
    ///
    /// Normalization is trim + lowercase; the check is case-insensitive.
    #[must_use]
    pub fn is_denied(&self, entity: &EntityType, value: &str) -> bool {
        self.deny
            .get(entity)
            .is_some_and(|set| set.contains(&normalize_deny_value(value)))
    }

    /// Sensitivity classification for an entity type.
    ///
    /// Rule-supplied overrides win; otherwise identity/tax/payment types are
    /// `Specific` and everything else `General`.
    #[must_use]
    pub fn sensitivity_for(&self, entity: &EntityType) -> Sensitivity {
        if let Some(s) = self.sensitivity_overrides.get(entity) {
            return *s;
        }
        if SPECIFIC_ENTITY_TYPES.contains(&entity.as_str()) {
            Sensitivity::Specific
        } else {
            Sensitivity::General
        }
    }

    /// Every entity type this snapshot can emit.
    #[must_use]
    pub fn known_entity_types(&self) -> HashSet<EntityType> {
        self.builtins
            .iter()
            .map(|b| b.entity_type.clone())
            .chain(self.rules.iter().map(|r| r.entity_type.clone()))
            .collect()
    }

    /// Total number of active recognizers (built-in + rule).
    #[must_use]
    pub fn recognizer_count(&self) -> usize {
        self.builtins.len() + self.rules.len()
    }
}

fn normalize_deny_value(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Compile raw records into a snapshot, skipping malformed ones.
///
/// This is the main entry point for stores: record parsing failures
/// (unknown kinds, bad scores) are collected as skips alongside
/// compilation failures.
#[must_use]
pub fn compile_records(records: Vec<RuleRecord>) -> (RuleSnapshot, Vec<SkippedRule>) {
    let mut rules = Vec::new();
    let mut skipped = Vec::new();

    for record in records {
        let name = record.name.clone();
        match DetectionRule::from_record(record) {
            Ok(rule) => rules.push(rule),
            Err(e) => {
                warn!(rule = %name, error = %e, "skipping malformed rule record");
                skipped.push(SkippedRule {
                    name,
                    reason: e.to_string(),
                });
            }
        }
    }

    let (snapshot, mut compile_skips) = compile(&rules);
    compile_skips.extend(skipped);
    (snapshot, compile_skips)
}

/// Compile validated rules into an immutable snapshot.
///
/// Inactive rules are ignored. A rule that fails compilation (invalid
/// regex, unknown entity type, unknown built-in name) is skipped and
/// logged; the remainder compiles normally.
#[must_use]
pub fn compile(rules: &[DetectionRule]) -> (RuleSnapshot, Vec<SkippedRule>) {
    let mut skipped = Vec::new();

    let active: Vec<&DetectionRule> = rules.iter().filter(|r| r.active).collect();

    // Pass 1: regex rules. Their entity types extend the known set that
    // proximity rules are validated against.
    let mut compiled_rules = Vec::new();
    let mut sensitivity_overrides = HashMap::new();
    for rule in active.iter().filter(|r| r.kind == RuleKind::Regex) {
        let entity_type = rule
            .entity_type
            .clone()
            .expect("regex rules carry an entity type after validation");

        match Regex::new(&rule.pattern) {
            Ok(regex) => {
                if let Some(s) = rule.sensitivity {
                    sensitivity_overrides.insert(entity_type.clone(), s);
                }
                compiled_rules.push(CompiledRule {
                    name: rule.name.clone(),
                    entity_type,
                    regex,
                    base_score: rule.base_score,
                });
            }
            Err(e) => {
                warn!(rule = %rule.name, error = %e, "skipping rule with invalid pattern");
                skipped.push(SkippedRule {
                    name: rule.name.clone(),
                    reason: format!("invalid pattern: {e}"),
                });
            }
        }
    }

    // Pass 2: built-ins minus disable_default targets.
    let disabled: HashSet<&str> = active
        .iter()
        .filter(|r| r.kind == RuleKind::DisableDefault)
        .map(|r| r.pattern.as_str())
        .collect();

    let all_builtins = default_recognizers();
    let known_builtin_names: HashSet<&str> = all_builtins.iter().map(|b| b.name).collect();
    for rule in active.iter().filter(|r| r.kind == RuleKind::DisableDefault) {
        if !known_builtin_names.contains(rule.pattern.as_str()) {
            warn!(
                rule = %rule.name,
                recognizer = %rule.pattern,
                "disable_default rule names unknown built-in recognizer"
            );
            skipped.push(SkippedRule {
                name: rule.name.clone(),
                reason: format!("unknown built-in recognizer '{}'", rule.pattern),
            });
        }
    }

    let builtins: Vec<BuiltinRecognizer> = all_builtins
        .into_iter()
        .filter(|b| !disabled.contains(b.name))
        .collect();

    // Pass 3: proximity rules, validated against the known entity types.
    let known_entities: HashSet<EntityType> = builtins
        .iter()
        .map(|b| b.entity_type.clone())
        .chain(compiled_rules.iter().map(|r| r.entity_type.clone()))
        .collect();

    let mut proximity = Vec::new();
    for rule in active.iter().filter(|r| r.kind == RuleKind::Proximity) {
        let entity_type = rule
            .entity_type
            .clone()
            .expect("proximity rules carry an entity type after validation");

        if !known_entities.contains(&entity_type) {
            warn!(
                rule = %rule.name,
                entity_type = %entity_type,
                "skipping proximity rule for unknown entity type"
            );
            skipped.push(SkippedRule {
                name: rule.name.clone(),
                reason: format!("unknown entity type '{entity_type}'"),
            });
            continue;
        }

        // Keywords come from context_keywords when present, otherwise the
        // pattern field carries a single keyword.
        let mut keywords: Vec<String> = rule
            .context_keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        if keywords.is_empty() {
            keywords.push(rule.pattern.trim().to_lowercase());
        }

        proximity.push(ProximityRule {
            name: rule.name.clone(),
            entity_type,
            keywords,
        });
    }

    // Pass 4: false-positive deny sets, normalized for case-insensitive lookup.
    let mut deny: HashMap<EntityType, HashSet<String>> = HashMap::new();
    for rule in active.iter().filter(|r| r.kind == RuleKind::FalsePositive) {
        let entity_type = rule
            .entity_type
            .clone()
            .expect("false_positive rules carry an entity type after validation");
        deny.entry(entity_type)
            .or_default()
            .insert(normalize_deny_value(&rule.pattern));
    }

    let snapshot = RuleSnapshot {
        version: uuid::Uuid::new_v4().to_string(),
        compiled_at: Timestamp::now(),
        builtins,
        rules: compiled_rules,
        proximity,
        deny,
        sensitivity_overrides,
    };

    info!(
        version = %snapshot.version,
        builtins = snapshot.builtins.len(),
        rules = snapshot.rules.len(),
        proximity = snapshot.proximity.len(),
        skipped = skipped.len(),
        "compiled rule snapshot"
    );
    debug!(deny_entities = snapshot.deny.len(), "deny sets populated");

    (snapshot, skipped)
}
