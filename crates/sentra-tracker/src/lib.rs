//! Sentra Tracker - Lightweight change-data-capture for scan targets.
//!
//! Detects modified rows/files via timestamps or content digests rather
//! than a transaction log, so incremental re-scans touch only changed data:
//!
//! - [`ChangeMark`] is the per-target high-water state, committed only when
//!   a phase fully completes.
//! - [`diff`] computes which units changed since the previous mark.
//! - [`compare_schemas`] turns structural differences into
//!   [`DriftEvent`]s before any data scanning happens.
//!
//! All sample values carried by drift events are masked on construction.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod diff;
pub mod drift;
pub mod mark;

pub use diff::{diff, ChangeSet};
pub use drift::{compare_schemas, DriftEvent, DriftKind};
pub use mark::{digest_bytes, ChangeMark, ContainerSchema, SchemaSnapshot, UnitState};
