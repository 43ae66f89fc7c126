//! Sentra Engine - Context-aware PII classification.
//!
//! The scoring engine turns text plus structural context into masked
//! findings:
//!
//! 1. [`ScoringEngine::classify`] runs every recognizer in a
//!    [`sentra_rules::RuleSnapshot`] and resolves overlapping spans.
//! 2. [`ScoringEngine::score`] gathers a context window (field name,
//!    container name, file name, nearby tokens), applies proximity boosts,
//!    filters deny-listed values, and masks the sample.
//!
//! Unmasked values never cross this crate's public API: [`Finding`] carries
//! only the masked sample.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod category;
pub mod classify;
pub mod context;
pub mod mask;

// Re-export commonly used types
pub use category::document_categories;
pub use classify::{Candidate, CandidateOrigin, Finding, ScoringEngine};
pub use context::{context_window, tokens_from_name, window_haystack, ContextHints};
pub use mask::mask_value;
