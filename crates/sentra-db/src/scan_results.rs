//! Aggregated scan results.
//!
//! Results are write-once per run and never mutated retroactively;
//! corrections are new rows in later runs. Samples arrive masked, so this
//! module never sees raw values.

use crate::error::{DatabaseError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};

/// One aggregated result group: `(container, field, entity_type)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResultRecord {
    /// Unique record identifier
    pub id: String,
    /// Run that produced this record
    pub run_id: String,
    /// Target the data lives on
    pub target_id: String,
    /// Containing table/sheet/file
    pub container: String,
    /// Column/field name, when the source is structured
    pub field: Option<String>,
    /// Detected entity type
    pub entity_type: String,
    /// Number of findings in the group
    pub finding_count: u32,
    /// Highest final score in the group
    pub max_score: f64,
    /// Masked sample from the highest-scoring finding
    pub sample_masked: Option<String>,
    /// Sensitivity classification
    pub sensitivity: String,
    /// When the record was written
    pub created_at: DateTime<Utc>,
}

/// Input row for [`insert_results`].
#[derive(Debug, Clone)]
pub struct NewScanResult {
    /// Containing table/sheet/file
    pub container: String,
    /// Column/field name, when the source is structured
    pub field: Option<String>,
    /// Detected entity type
    pub entity_type: String,
    /// Number of findings in the group
    pub finding_count: u32,
    /// Highest final score in the group
    pub max_score: f64,
    /// Masked sample from the highest-scoring finding
    pub sample_masked: Option<String>,
    /// Sensitivity classification
    pub sensitivity: String,
}

/// Write one phase's aggregated results in a single transaction.
///
/// All rows commit or none do: a partially written result set would be
/// indistinguishable from a complete one to consumers.
pub async fn insert_results(
    pool: &Pool<Sqlite>,
    run_id: &str,
    target_id: &str,
    results: &[NewScanResult],
) -> Result<()> {
    let mut tx = pool.begin().await?;
    let created_at = Utc::now().to_rfc3339();

    for result in results {
        sqlx::query(
            "INSERT INTO scan_results (id, run_id, target_id, container, field, entity_type,
                                       finding_count, max_score, sample_masked, sensitivity, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(run_id)
        .bind(target_id)
        .bind(&result.container)
        .bind(&result.field)
        .bind(&result.entity_type)
        .bind(i64::from(result.finding_count))
        .bind(result.max_score)
        .bind(&result.sample_masked)
        .bind(&result.sensitivity)
        .bind(&created_at)
        .execute(tx.as_mut())
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// All results written by one run.
pub async fn get_by_run(pool: &Pool<Sqlite>, run_id: &str) -> Result<Vec<ScanResultRecord>> {
    let rows = sqlx::query(
        "SELECT id, run_id, target_id, container, field, entity_type,
                finding_count, max_score, sample_masked, sensitivity, created_at
         FROM scan_results WHERE run_id = ?
         ORDER BY container, field, entity_type",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(parse_result_row).collect()
}

/// All results ever written for a target, newest first.
pub async fn get_by_target(pool: &Pool<Sqlite>, target_id: &str) -> Result<Vec<ScanResultRecord>> {
    let rows = sqlx::query(
        "SELECT id, run_id, target_id, container, field, entity_type,
                finding_count, max_score, sample_masked, sensitivity, created_at
         FROM scan_results WHERE target_id = ?
         ORDER BY created_at DESC",
    )
    .bind(target_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(parse_result_row).collect()
}

fn parse_result_row(row: &sqlx::sqlite::SqliteRow) -> Result<ScanResultRecord> {
    let finding_count: i64 = row.try_get("finding_count")?;
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let finding_count = finding_count as u32;

    let created_at_str: String = row.try_get("created_at")?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Decode(format!("invalid timestamp in created_at: {e}")))?;

    Ok(ScanResultRecord {
        id: row.try_get("id")?,
        run_id: row.try_get("run_id")?,
        target_id: row.try_get("target_id")?,
        container: row.try_get("container")?,
        field: row.try_get("field")?,
        entity_type: row.try_get("entity_type")?,
        finding_count,
        max_score: row.try_get("max_score")?,
        sample_masked: row.try_get("sample_masked")?,
        sensitivity: row.try_get("sensitivity")?,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{scan_runs, targets, Database};
    use sentra_core::{ScanScope, SourceKind};

    async fn setup_run() -> (Database, String) {
        let db = Database::new(":memory:").await.expect("create test database");
        db.run_migrations().await.expect("run migrations");

        targets::create_target(
            db.pool(),
            "hr-database".to_string(),
            "HR Database".to_string(),
            SourceKind::Database,
            "postgres://localhost/hr".to_string(),
            ScanScope::Sample,
            7,
        )
        .await
        .expect("create test target");

        let run = scan_runs::create_run(db.pool(), "hr-database".to_string(), None)
            .await
            .expect("create run");

        (db, run.id)
    }

    fn result(container: &str, field: &str, entity: &str, count: u32) -> NewScanResult {
        NewScanResult {
            container: container.to_string(),
            field: Some(field.to_string()),
            entity_type: entity.to_string(),
            finding_count: count,
            max_score: 0.65,
            sample_masked: Some("12************78".to_string()),
            sensitivity: "Specific".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_by_run() {
        let (db, run_id) = setup_run().await;

        insert_results(
            db.pool(),
            &run_id,
            "hr-database",
            &[
                result("employees", "nik", "ID_NIK", 42),
                result("employees", "email", "EMAIL_ADDRESS", 120),
            ],
        )
        .await
        .expect("insert results");

        let records = get_by_run(db.pool(), &run_id).await.expect("get results");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].field.as_deref(), Some("email"));
        assert_eq!(records[1].entity_type, "ID_NIK");
        assert_eq!(records[1].finding_count, 42);
    }

    #[tokio::test]
    async fn test_get_by_target_spans_runs() {
        let (db, first_run) = setup_run().await;

        insert_results(
            db.pool(),
            &first_run,
            "hr-database",
            &[result("employees", "nik", "ID_NIK", 10)],
        )
        .await
        .expect("insert results");

        let second_run = scan_runs::create_run(db.pool(), "hr-database".to_string(), None)
            .await
            .expect("create second run");
        insert_results(
            db.pool(),
            &second_run.id,
            "hr-database",
            &[result("employees", "nik", "ID_NIK", 12)],
        )
        .await
        .expect("insert results");

        let records = get_by_target(db.pool(), "hr-database")
            .await
            .expect("get results");
        // History preserved: both runs' rows exist
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_insert_is_noop() {
        let (db, run_id) = setup_run().await;
        insert_results(db.pool(), &run_id, "hr-database", &[])
            .await
            .expect("insert empty result set");

        let records = get_by_run(db.pool(), &run_id).await.expect("get results");
        assert!(records.is_empty());
    }
}
