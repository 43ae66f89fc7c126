//! Scan run management: the persisted side of the phase state machine.
//!
//! Every phase transition is written immediately so a crashed run can
//! resume from the last completed phase instead of restarting at
//! `DependencyCheck`.

use crate::error::{DatabaseError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};

/// Discovery phases a target run moves through.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ScanPhase {
    /// Verify the source is reachable and credentials resolve
    DependencyCheck,
    /// Crawl structural metadata only
    MetadataProfile,
    /// Read a bounded sample from flagged items
    SmartSample,
    /// Scan everything not excluded by sampling
    FullScan,
    /// Terminal: all phases completed
    Done,
}

impl ScanPhase {
    /// The phase that follows this one, if any.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::DependencyCheck => Some(Self::MetadataProfile),
            Self::MetadataProfile => Some(Self::SmartSample),
            Self::SmartSample => Some(Self::FullScan),
            Self::FullScan => Some(Self::Done),
            Self::Done => None,
        }
    }

    /// Parse from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "MetadataProfile" => Self::MetadataProfile,
            "SmartSample" => Self::SmartSample,
            "FullScan" => Self::FullScan,
            "Done" => Self::Done,
            _ => Self::DependencyCheck,
        }
    }
}

impl std::fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DependencyCheck => write!(f, "DependencyCheck"),
            Self::MetadataProfile => write!(f, "MetadataProfile"),
            Self::SmartSample => write!(f, "SmartSample"),
            Self::FullScan => write!(f, "FullScan"),
            Self::Done => write!(f, "Done"),
        }
    }
}

/// Run-level status surfaced to callers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RunStatus {
    /// Run is currently executing
    InProgress,
    /// Every item processed
    Completed,
    /// Run finished but some items were skipped (read errors, timeouts)
    CompletedWithSkips,
    /// A phase-level failure aborted the run
    Failed,
    /// Run was cancelled between phases or items
    Cancelled,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InProgress => write!(f, "InProgress"),
            Self::Completed => write!(f, "Completed"),
            Self::CompletedWithSkips => write!(f, "CompletedWithSkips"),
            Self::Failed => write!(f, "Failed"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl RunStatus {
    /// Parse from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "Completed" => Self::Completed,
            "CompletedWithSkips" => Self::CompletedWithSkips,
            "Failed" => Self::Failed,
            "Cancelled" => Self::Cancelled,
            _ => Self::InProgress,
        }
    }
}

/// One scan run of one target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRun {
    /// Unique run identifier
    pub id: String,
    /// Target being scanned
    pub target_id: String,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished (if finished)
    pub completed_at: Option<DateTime<Utc>>,
    /// Last persisted phase
    pub phase: ScanPhase,
    /// Run status
    pub status: RunStatus,
    /// Version of the rule snapshot used for this run
    pub rule_snapshot_version: Option<String>,
    /// Skipped items and reasons
    pub diagnostics: Vec<String>,
    /// Error message if the run failed
    pub error_message: Option<String>,
}

/// Create a new scan run starting at `DependencyCheck`.
///
/// # Errors
/// Returns an error if the database operation fails or the target doesn't exist.
pub async fn create_run(
    pool: &Pool<Sqlite>,
    target_id: String,
    rule_snapshot_version: Option<String>,
) -> Result<ScanRun> {
    let id = uuid::Uuid::new_v4().to_string();
    let started_at = Utc::now();
    let phase = ScanPhase::DependencyCheck;
    let status = RunStatus::InProgress;

    sqlx::query(
        "INSERT INTO scan_runs (id, target_id, started_at, phase, status, rule_snapshot_version, diagnostics)
         VALUES (?, ?, ?, ?, ?, ?, '[]')",
    )
    .bind(&id)
    .bind(&target_id)
    .bind(started_at.to_rfc3339())
    .bind(phase.to_string())
    .bind(status.to_string())
    .bind(&rule_snapshot_version)
    .execute(pool)
    .await?;

    Ok(ScanRun {
        id,
        target_id,
        started_at,
        completed_at: None,
        phase,
        status,
        rule_snapshot_version,
        diagnostics: Vec::new(),
        error_message: None,
    })
}

/// Persist a phase transition.
///
/// Called the moment a phase completes so crash recovery resumes at the
/// right place.
pub async fn update_phase(pool: &Pool<Sqlite>, run_id: &str, phase: ScanPhase) -> Result<()> {
    let result = sqlx::query("UPDATE scan_runs SET phase = ? WHERE id = ?")
        .bind(phase.to_string())
        .bind(run_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFoundWithMessage(format!(
            "scan run '{run_id}' not found"
        )));
    }

    Ok(())
}

/// Mark a run as finished with its final status and diagnostics.
pub async fn complete_run(
    pool: &Pool<Sqlite>,
    run_id: &str,
    status: RunStatus,
    diagnostics: &[String],
) -> Result<()> {
    let diagnostics_json = serde_json::to_string(diagnostics)
        .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

    sqlx::query(
        "UPDATE scan_runs SET status = ?, completed_at = ?, diagnostics = ? WHERE id = ?",
    )
    .bind(status.to_string())
    .bind(Utc::now().to_rfc3339())
    .bind(diagnostics_json)
    .bind(run_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Mark a run as failed.
pub async fn fail_run(pool: &Pool<Sqlite>, run_id: &str, error_message: &str) -> Result<()> {
    sqlx::query(
        "UPDATE scan_runs SET status = 'Failed', completed_at = ?, error_message = ? WHERE id = ?",
    )
    .bind(Utc::now().to_rfc3339())
    .bind(error_message)
    .bind(run_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get a run by id.
pub async fn get_run(pool: &Pool<Sqlite>, run_id: &str) -> Result<ScanRun> {
    let row = sqlx::query(
        "SELECT id, target_id, started_at, completed_at, phase, status,
                rule_snapshot_version, diagnostics, error_message
         FROM scan_runs WHERE id = ?",
    )
    .bind(run_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFoundWithMessage(format!("scan run '{run_id}' not found")))?;

    let started_at_str: String = row.try_get("started_at")?;
    let started_at = DateTime::parse_from_rfc3339(&started_at_str)
        .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));

    let completed_at: Option<String> = row.try_get("completed_at")?;
    let completed_at = completed_at.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    });

    let phase_str: String = row.try_get("phase")?;
    let status_str: String = row.try_get("status")?;
    let diagnostics_str: String = row.try_get("diagnostics")?;
    let diagnostics: Vec<String> = serde_json::from_str(&diagnostics_str).unwrap_or_default();

    Ok(ScanRun {
        id: row.try_get("id")?,
        target_id: row.try_get("target_id")?,
        started_at,
        completed_at,
        phase: ScanPhase::parse(&phase_str),
        status: RunStatus::parse(&status_str),
        rule_snapshot_version: row.try_get("rule_snapshot_version")?,
        diagnostics,
        error_message: row.try_get("error_message")?,
    })
}

/// Latest run for a target, if any.
pub async fn latest_run_for_target(
    pool: &Pool<Sqlite>,
    target_id: &str,
) -> Result<Option<ScanRun>> {
    let id: Option<String> = sqlx::query_scalar(
        "SELECT id FROM scan_runs WHERE target_id = ? ORDER BY started_at DESC LIMIT 1",
    )
    .bind(target_id)
    .fetch_optional(pool)
    .await?;

    match id {
        Some(id) => Ok(Some(get_run(pool, &id).await?)),
        None => Ok(None),
    }
}
