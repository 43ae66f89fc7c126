//! Sentra Analysis - Entropy and similarity heuristics for scanned content.
//!
//! Two independent signals used around text classification:
//!
//! - [`entropy`] flags likely-encrypted content so the classifier skips it
//!   (ciphertext matches nothing meaningful) while the scan still records
//!   that encrypted data exists at the location.
//! - [`similarity`] detects near-duplicate documents so PII counts are not
//!   inflated by copies.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod entropy;
pub mod similarity;

pub use entropy::{is_likely_encrypted, shannon_entropy, string_entropy};
pub use similarity::{similarity, DuplicateDetector};
