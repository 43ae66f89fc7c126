//! Sentra Rules - Detection rule registry and snapshot compiler.
//!
//! Rules live in external stores and are compiled into an immutable
//! [`RuleSnapshot`] at the start of every scan run:
//!
//! 1. Stored records ([`RuleRecord`]) are parsed into the closed
//!    [`RuleKind`] variant set; unknown kinds are rejected at the boundary.
//! 2. [`compile`]/[`compile_records`] turn the active set into a versioned
//!    snapshot: compiled regex recognizers, the built-in recognizer set
//!    minus `disable_default` targets, proximity boost rules, and
//!    per-entity-type deny sets.
//! 3. Compilation is partial-failure tolerant: malformed rules are skipped
//!    and reported, never aborting the registry.
//!
//! The snapshot is shared read-only across scan workers; rule edits only
//! affect subsequent runs.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod builtin;
pub mod error;
pub mod rule;
pub mod snapshot;
pub mod store;

// Re-export commonly used types
pub use builtin::{default_recognizers, luhn_valid, BuiltinRecognizer};
pub use error::{Result, RuleError};
pub use rule::{parse_context_keywords, DetectionRule, RuleKind, RuleRecord};
pub use snapshot::{compile, compile_records, CompiledRule, ProximityRule, RuleSnapshot, SkippedRule};
pub use store::{MemoryRuleStore, RuleStore, TomlRuleStore};
