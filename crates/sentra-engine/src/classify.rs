//! Candidate generation and context scoring.
//!
//! Classification runs in two stages. [`ScoringEngine::classify`] produces
//! raw [`Candidate`]s from every recognizer in the snapshot and resolves
//! span overlaps. [`ScoringEngine::score`] then adjusts each candidate with
//! its surrounding context and either emits a masked [`Finding`] or drops
//! it. Raw matched text never leaves this module unmasked.

use crate::context::{context_window, window_haystack, ContextHints};
use crate::mask::mask_value;
use sentra_core::{DataLocation, DetectionConfig, EntityType, Sensitivity};
use sentra_rules::RuleSnapshot;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, trace};

/// Which recognizer class produced a candidate.
///
/// Rule matches are preferred over built-in matches on overlapping spans:
/// an administrator-supplied pattern is higher precision by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateOrigin {
    /// A built-in recognizer
    Builtin,
    /// A compiled regex rule
    Rule,
}

/// A raw pattern match before context adjustment.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Entity type emitted by the recognizer
    pub entity_type: EntityType,
    /// The matched text
    pub raw_text: String,
    /// Byte offset of the match start
    pub start: usize,
    /// Byte offset of the match end
    pub end: usize,
    /// The recognizer's base confidence
    pub base_score: f64,
    /// Recognizer class that produced the match
    pub origin: CandidateOrigin,
}

/// A scored, masked detection ready for aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// Entity type of the detection
    pub entity_type: EntityType,
    /// Masked sample of the matched value
    pub masked_sample: String,
    /// Base score plus context boost, clamped to `[0, 1]`
    pub final_score: f64,
    /// Sensitivity classification of the entity type
    pub sensitivity: Sensitivity,
    /// Where the value was found
    pub location: DataLocation,
}

/// The context scoring engine.
///
/// Holds only tunables; all rule state comes in through the snapshot
/// argument so concurrent runs can use different rule versions.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    config: DetectionConfig,
}

impl ScoringEngine {
    /// Create an engine with the given detection tunables.
    #[must_use]
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    /// Run every recognizer over `text` and resolve span overlaps.
    ///
    /// Candidates are sorted by start position, preferring rule matches
    /// over built-ins and higher base scores on ties; a greedy pass then
    /// drops any candidate starting inside the previously accepted span.
    /// Non-overlapping candidates of different entity types all survive.
    #[must_use]
    pub fn classify(&self, text: &str, snapshot: &RuleSnapshot) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for recognizer in snapshot.builtins() {
            for m in recognizer.pattern().find_iter(text) {
                if !recognizer.accepts(m.as_str()) {
                    trace!(
                        recognizer = recognizer.name,
                        "match rejected by checksum validator"
                    );
                    continue;
                }
                candidates.push(Candidate {
                    entity_type: recognizer.entity_type.clone(),
                    raw_text: m.as_str().to_string(),
                    start: m.start(),
                    end: m.end(),
                    base_score: recognizer.base_score,
                    origin: CandidateOrigin::Builtin,
                });
            }
        }

        for rule in snapshot.rules() {
            for m in rule.regex.find_iter(text) {
                candidates.push(Candidate {
                    entity_type: rule.entity_type.clone(),
                    raw_text: m.as_str().to_string(),
                    start: m.start(),
                    end: m.end(),
                    base_score: rule.base_score,
                    origin: CandidateOrigin::Rule,
                });
            }
        }

        // Best candidate for a span first: start position, then rule origin,
        // then score, then the longer match.
        candidates.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then_with(|| origin_rank(a.origin).cmp(&origin_rank(b.origin)))
                .then_with(|| {
                    b.base_score
                        .partial_cmp(&a.base_score)
                        .unwrap_or(Ordering::Equal)
                })
                .then_with(|| b.end.cmp(&a.end))
        });

        // Greedy overlap removal: the first candidate seen for a region is
        // the best one by the sort order above.
        let mut accepted: Vec<Candidate> = Vec::new();
        let mut last_end = 0;
        for candidate in candidates {
            if candidate.start < last_end {
                continue;
            }
            last_end = candidate.end;
            accepted.push(candidate);
        }

        accepted
    }

    /// Adjust a candidate's score with its context and emit a finding.
    ///
    /// Returns `None` when the value is in the entity type's deny set or
    /// the final score falls below the reporting threshold. Boosting is
    /// additive across distinct matching proximity rules and monotonic:
    /// more matching keywords never lower the score.
    #[must_use]
    pub fn score(
        &self,
        candidate: &Candidate,
        text: &str,
        hints: &ContextHints,
        snapshot: &RuleSnapshot,
        location: &DataLocation,
    ) -> Option<Finding> {
        if snapshot.is_denied(&candidate.entity_type, &candidate.raw_text) {
            debug!(
                entity_type = %candidate.entity_type,
                "candidate dropped by deny set"
            );
            return None;
        }

        let window = context_window(
            text,
            candidate.start,
            candidate.end,
            self.config.context_window_tokens,
            hints,
        );
        let haystack = window_haystack(&window);

        let mut boost = 0.0;
        for rule in snapshot.proximity_rules_for(&candidate.entity_type) {
            if rule.keywords.iter().any(|k| haystack.contains(k.as_str())) {
                trace!(rule = %rule.name, "proximity boost applied");
                boost += self.config.proximity_boost;
            }
        }

        let final_score = (candidate.base_score + boost).clamp(0.0, 1.0);

        if final_score < self.config.score_threshold {
            debug!(
                entity_type = %candidate.entity_type,
                final_score,
                "candidate below score threshold"
            );
            return None;
        }

        Some(Finding {
            entity_type: candidate.entity_type.clone(),
            masked_sample: mask_value(&candidate.raw_text),
            final_score,
            sensitivity: snapshot.sensitivity_for(&candidate.entity_type),
            location: location.clone(),
        })
    }

    /// Classify and score in one pass.
    #[must_use]
    pub fn analyze(
        &self,
        text: &str,
        hints: &ContextHints,
        snapshot: &RuleSnapshot,
        location: &DataLocation,
    ) -> Vec<Finding> {
        self.classify(text, snapshot)
            .iter()
            .filter_map(|candidate| self.score(candidate, text, hints, snapshot, location))
            .collect()
    }
}

fn origin_rank(origin: CandidateOrigin) -> u8 {
    match origin {
        CandidateOrigin::Rule => 0,
        CandidateOrigin::Builtin => 1,
    }
}
