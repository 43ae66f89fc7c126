//! Scan target management.
//!
//! A scan target is a configured source (database, filesystem share, object
//! store bucket) with its scan scope and schedule.

use crate::error::{DatabaseError, Result};
use chrono::{DateTime, Utc};
use sentra_core::{ScanScope, SourceKind};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};

/// A configured scan target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanTarget {
    /// Unique target identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// What kind of source this is
    pub source_kind: SourceKind,
    /// Connection string, path, or bucket URI
    pub uri: String,
    /// How much of the target scheduled scans may read
    pub scope: ScanScope,
    /// Days between scheduled scans
    pub interval_days: u32,
    /// When the next scheduled scan is due (RFC3339)
    pub next_run_at: Option<String>,
    /// Last completed metadata profile
    pub last_metadata_scan_at: Option<DateTime<Utc>>,
    /// Last completed data scan
    pub last_data_scan_at: Option<DateTime<Utc>>,
    /// Whether the source is known to hold encrypted content
    pub encrypted: bool,
    /// Category/compliance tags accumulated by scans
    pub tags: Vec<String>,
    /// When the target was registered
    pub created_at: DateTime<Utc>,
}

/// Create a new scan target.
///
/// # Errors
/// Returns an error if the insert fails (e.g. duplicate id).
pub async fn create_target(
    pool: &Pool<Sqlite>,
    id: String,
    name: String,
    source_kind: SourceKind,
    uri: String,
    scope: ScanScope,
    interval_days: u32,
) -> Result<ScanTarget> {
    let created_at = Utc::now();

    sqlx::query(
        "INSERT INTO scan_targets (id, name, source_kind, uri, scope, interval_days, encrypted, tags, created_at)
         VALUES (?, ?, ?, ?, ?, ?, 0, '[]', ?)",
    )
    .bind(&id)
    .bind(&name)
    .bind(source_kind.to_string())
    .bind(&uri)
    .bind(scope.to_string())
    .bind(i64::from(interval_days))
    .bind(created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(ScanTarget {
        id,
        name,
        source_kind,
        uri,
        scope,
        interval_days,
        next_run_at: None,
        last_metadata_scan_at: None,
        last_data_scan_at: None,
        encrypted: false,
        tags: Vec::new(),
        created_at,
    })
}

/// Get a target by id.
///
/// # Errors
/// Returns `DatabaseError::NotFoundWithMessage` if the target doesn't exist.
pub async fn get_target(pool: &Pool<Sqlite>, target_id: &str) -> Result<ScanTarget> {
    let row = sqlx::query(
        "SELECT id, name, source_kind, uri, scope, interval_days, next_run_at,
                last_metadata_scan_at, last_data_scan_at, encrypted, tags, created_at
         FROM scan_targets WHERE id = ?",
    )
    .bind(target_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| {
        DatabaseError::NotFoundWithMessage(format!("scan target '{target_id}' not found"))
    })?;

    parse_target_row(&row)
}

/// List every configured target.
pub async fn list_targets(pool: &Pool<Sqlite>) -> Result<Vec<ScanTarget>> {
    let rows = sqlx::query(
        "SELECT id, name, source_kind, uri, scope, interval_days, next_run_at,
                last_metadata_scan_at, last_data_scan_at, encrypted, tags, created_at
         FROM scan_targets ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(parse_target_row).collect()
}

/// Merge new tags into a target's tag set.
///
/// Existing tags are preserved; duplicates are ignored.
pub async fn add_tags(pool: &Pool<Sqlite>, target_id: &str, new_tags: &[String]) -> Result<()> {
    let target = get_target(pool, target_id).await?;

    let mut tags = target.tags;
    let before = tags.len();
    for tag in new_tags {
        if !tags.contains(tag) {
            tags.push(tag.clone());
        }
    }

    if tags.len() == before {
        return Ok(());
    }

    let tags_json = serde_json::to_string(&tags)
        .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

    sqlx::query("UPDATE scan_targets SET tags = ? WHERE id = ?")
        .bind(tags_json)
        .bind(target_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Record a completed metadata profile on the target.
pub async fn touch_metadata_scan(pool: &Pool<Sqlite>, target_id: &str) -> Result<()> {
    sqlx::query("UPDATE scan_targets SET last_metadata_scan_at = ? WHERE id = ?")
        .bind(Utc::now().to_rfc3339())
        .bind(target_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Schedule the next run without touching scan timestamps.
pub async fn set_next_run(pool: &Pool<Sqlite>, target_id: &str, next_run_at: &str) -> Result<()> {
    sqlx::query("UPDATE scan_targets SET next_run_at = ? WHERE id = ?")
        .bind(next_run_at)
        .bind(target_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Record a completed data scan and schedule the next run.
pub async fn touch_data_scan(
    pool: &Pool<Sqlite>,
    target_id: &str,
    next_run_at: &str,
) -> Result<()> {
    sqlx::query("UPDATE scan_targets SET last_data_scan_at = ?, next_run_at = ? WHERE id = ?")
        .bind(Utc::now().to_rfc3339())
        .bind(next_run_at)
        .bind(target_id)
        .execute(pool)
        .await?;
    Ok(())
}

fn parse_target_row(row: &sqlx::sqlite::SqliteRow) -> Result<ScanTarget> {
    let source_kind_str: String = row.try_get("source_kind")?;
    let source_kind: SourceKind = serde_json::from_str(&format!("\"{source_kind_str}\""))
        .map_err(|e| {
            DatabaseError::Decode(format!(
                "Invalid source_kind '{source_kind_str}' in scan_targets table: {e}"
            ))
        })?;

    let scope_str: String = row.try_get("scope")?;
    let scope: ScanScope = serde_json::from_str(&format!("\"{scope_str}\"")).map_err(|e| {
        DatabaseError::Decode(format!("Invalid scope '{scope_str}' in scan_targets table: {e}"))
    })?;

    let tags_str: String = row.try_get("tags")?;
    let tags: Vec<String> = serde_json::from_str(&tags_str).unwrap_or_default();

    let interval_days: i64 = row.try_get("interval_days")?;
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let interval_days = interval_days as u32;

    let encrypted: i64 = row.try_get("encrypted")?;

    Ok(ScanTarget {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        source_kind,
        uri: row.try_get("uri")?,
        scope,
        interval_days,
        next_run_at: row.try_get("next_run_at")?,
        last_metadata_scan_at: parse_optional_timestamp(row, "last_metadata_scan_at")?,
        last_data_scan_at: parse_optional_timestamp(row, "last_data_scan_at")?,
        encrypted: encrypted != 0,
        tags,
        created_at: parse_timestamp(row, "created_at")?,
    })
}

fn parse_timestamp(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<DateTime<Utc>> {
    let raw: String = row.try_get(column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Decode(format!("invalid timestamp in {column}: {e}")))
}

fn parse_optional_timestamp(
    row: &sqlx::sqlite::SqliteRow,
    column: &str,
) -> Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| DatabaseError::Decode(format!("invalid timestamp in {column}: {e}")))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    async fn setup_test_db() -> Database {
        let db = Database::new(":memory:").await.expect("create test database");
        db.run_migrations().await.expect("run migrations");
        db
    }

    #[tokio::test]
    async fn test_create_and_get_target() {
        let db = setup_test_db().await;

        let target = create_target(
            db.pool(),
            "hr-database".to_string(),
            "HR Database".to_string(),
            SourceKind::Database,
            "postgres://localhost/hr".to_string(),
            ScanScope::Sample,
            7,
        )
        .await
        .expect("create target");

        assert_eq!(target.id, "hr-database");
        assert!(target.tags.is_empty());

        let fetched = get_target(db.pool(), "hr-database").await.expect("get target");
        assert_eq!(fetched.name, "HR Database");
        assert_eq!(fetched.source_kind, SourceKind::Database);
        assert_eq!(fetched.scope, ScanScope::Sample);
    }

    #[tokio::test]
    async fn test_get_missing_target() {
        let db = setup_test_db().await;
        let result = get_target(db.pool(), "no-such-target").await;
        assert!(matches!(
            result,
            Err(DatabaseError::NotFoundWithMessage(_))
        ));
    }

    #[tokio::test]
    async fn test_add_tags_merges() {
        let db = setup_test_db().await;
        create_target(
            db.pool(),
            "finance-share".to_string(),
            "Finance Share".to_string(),
            SourceKind::File,
            "/mnt/finance".to_string(),
            ScanScope::Full,
            30,
        )
        .await
        .expect("create target");

        add_tags(
            db.pool(),
            "finance-share",
            &["Financial".to_string(), "PII_SENSITIVE".to_string()],
        )
        .await
        .expect("add tags");

        // Re-adding an existing tag is a no-op
        add_tags(db.pool(), "finance-share", &["Financial".to_string()])
            .await
            .expect("add duplicate tag");

        let target = get_target(db.pool(), "finance-share").await.expect("get target");
        assert_eq!(target.tags, vec!["Financial", "PII_SENSITIVE"]);
    }

    #[tokio::test]
    async fn test_touch_scan_times() {
        let db = setup_test_db().await;
        create_target(
            db.pool(),
            "s3-landing".to_string(),
            "Landing bucket".to_string(),
            SourceKind::ObjectStore,
            "s3://landing".to_string(),
            ScanScope::Sample,
            7,
        )
        .await
        .expect("create target");

        touch_metadata_scan(db.pool(), "s3-landing")
            .await
            .expect("touch metadata scan");
        touch_data_scan(db.pool(), "s3-landing", "2026-09-01T00:00:00Z")
            .await
            .expect("touch data scan");

        let target = get_target(db.pool(), "s3-landing").await.expect("get target");
        assert!(target.last_metadata_scan_at.is_some());
        assert!(target.last_data_scan_at.is_some());
        assert_eq!(target.next_run_at.as_deref(), Some("2026-09-01T00:00:00Z"));
    }

    #[tokio::test]
    async fn test_list_targets_ordered() {
        let db = setup_test_db().await;
        for id in ["zeta-db", "alpha-db"] {
            create_target(
                db.pool(),
                id.to_string(),
                id.to_string(),
                SourceKind::Database,
                format!("postgres://localhost/{id}"),
                ScanScope::Sample,
                7,
            )
            .await
            .expect("create target");
        }

        let targets = list_targets(db.pool()).await.expect("list targets");
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].id, "alpha-db");
    }
}
