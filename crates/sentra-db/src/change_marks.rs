//! Change mark persistence.
//!
//! One row per target, holding the serialized [`ChangeMark`]. The mark is
//! committed in a single upsert only after a phase fully completes, so
//! a failed phase leaves the previous mark untouched.

use crate::error::{DatabaseError, Result};
use chrono::Utc;
use sentra_tracker::ChangeMark;
use sqlx::{Pool, Sqlite};

/// Load the persisted mark for a target.
///
/// Returns an empty mark when the target has never committed one, so a
/// first scan sees everything as changed.
pub async fn get_mark(pool: &Pool<Sqlite>, target_id: &str) -> Result<ChangeMark> {
    let raw: Option<String> =
        sqlx::query_scalar("SELECT mark FROM change_marks WHERE target_id = ?")
            .bind(target_id)
            .fetch_optional(pool)
            .await?;

    match raw {
        Some(json) => serde_json::from_str(&json)
            .map_err(|e| DatabaseError::Decode(format!("invalid change mark: {e}"))),
        None => Ok(ChangeMark::empty()),
    }
}

/// Commit a new mark for a target, replacing any previous one.
///
/// Called exactly once per successfully completed phase.
pub async fn commit_mark(pool: &Pool<Sqlite>, target_id: &str, mark: &ChangeMark) -> Result<()> {
    let json = serde_json::to_string(mark)
        .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

    sqlx::query(
        "INSERT INTO change_marks (target_id, mark, updated_at) VALUES (?, ?, ?)
         ON CONFLICT(target_id) DO UPDATE SET mark = excluded.mark, updated_at = excluded.updated_at",
    )
    .bind(target_id)
    .bind(json)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    tracing::debug!(target = target_id, "change mark committed");
    Ok(())
}
