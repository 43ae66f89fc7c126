//! Audit log: run lifecycle events for compliance reporting.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};

/// One audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique entry identifier
    pub id: String,
    /// When the event happened
    pub timestamp: DateTime<Utc>,
    /// Event name, e.g. `run_started`, `run_completed`, `run_failed`
    pub action: String,
    /// Target involved, when applicable
    pub target_id: Option<String>,
    /// Run involved, when applicable
    pub run_id: Option<String>,
    /// Free-form details (already masked where sensitive)
    pub details: Option<String>,
}

/// Append an audit entry.
pub async fn record(
    pool: &Pool<Sqlite>,
    action: &str,
    target_id: Option<&str>,
    run_id: Option<&str>,
    details: Option<&str>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO audit_log (id, timestamp, action, target_id, run_id, details)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(Utc::now().to_rfc3339())
    .bind(action)
    .bind(target_id)
    .bind(run_id)
    .bind(details)
    .execute(pool)
    .await?;

    Ok(())
}

/// Most recent audit entries, newest first.
pub async fn list_recent(pool: &Pool<Sqlite>, limit: u32) -> Result<Vec<AuditEntry>> {
    let rows = sqlx::query(
        "SELECT id, timestamp, action, target_id, run_id, details
         FROM audit_log ORDER BY timestamp DESC LIMIT ?",
    )
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    let mut entries = Vec::new();
    for row in rows {
        let timestamp_str: String = row.try_get("timestamp")?;
        let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
            .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));

        entries.push(AuditEntry {
            id: row.try_get("id")?,
            timestamp,
            action: row.try_get("action")?,
            target_id: row.try_get("target_id")?,
            run_id: row.try_get("run_id")?,
            details: row.try_get("details")?,
        });
    }

    Ok(entries)
}
