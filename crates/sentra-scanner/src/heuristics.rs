//! Metadata-phase name heuristics.
//!
//! The metadata profile never reads content; it scores how likely an item
//! is to hold PII from its name and field names alone. This is what
//! bounds the cost of the later phases.

use crate::source::ItemDescriptor;
use sentra_engine::tokens_from_name;

/// Name fragments that signal likely PII, with their weight.
const NAME_KEYWORDS: &[(&str, f64)] = &[
    ("nik", 0.9),
    ("ktp", 0.9),
    ("ssn", 0.9),
    ("npwp", 0.8),
    ("passport", 0.8),
    ("email", 0.8),
    ("phone", 0.8),
    ("telp", 0.8),
    ("rekening", 0.8),
    ("salary", 0.7),
    ("gaji", 0.7),
    ("payroll", 0.7),
    ("birth", 0.7),
    ("dob", 0.7),
    ("address", 0.6),
    ("alamat", 0.6),
    ("contact", 0.6),
    ("customer", 0.5),
    ("nama", 0.5),
    ("name", 0.5),
    ("account", 0.5),
    ("employee", 0.4),
    ("karyawan", 0.4),
    ("person", 0.4),
    ("user", 0.3),
];

/// Items scoring at or above this advance past the metadata profile.
pub const METADATA_FLAG_THRESHOLD: f64 = 0.4;

/// Score a single name (file name, table name, column header).
///
/// The score is the best keyword hit across the name's tokens; substring
/// matching lets `customer_email_addr` hit `email`.
#[must_use]
pub fn name_score(name: &str) -> f64 {
    let tokens = tokens_from_name(name);
    let mut best: f64 = 0.0;

    for token in &tokens {
        for (keyword, weight) in NAME_KEYWORDS {
            if token.contains(keyword) {
                best = best.max(*weight);
            }
        }
    }

    best
}

/// Score an item from its own name and its field names.
#[must_use]
pub fn item_score(item: &ItemDescriptor) -> f64 {
    let mut best = name_score(&item.name);
    for field in &item.fields {
        best = best.max(name_score(field));
    }
    best
}

/// Whether the metadata profile should advance this item to sampling.
#[must_use]
pub fn is_flagged(item: &ItemDescriptor) -> bool {
    item_score(item) >= METADATA_FLAG_THRESHOLD
}
