//! Drift event persistence.
//!
//! Events arrive from the change tracker with samples already masked and
//! are write-once: corrections are new events.

use crate::error::{DatabaseError, Result};
use sentra_core::TargetId;
use sentra_tracker::{DriftEvent, DriftKind};
use sqlx::{Pool, Row, Sqlite};

/// Persist a batch of drift events in one transaction.
pub async fn insert_events(
    pool: &Pool<Sqlite>,
    run_id: Option<&str>,
    events: &[DriftEvent],
) -> Result<()> {
    let mut tx = pool.begin().await?;

    for event in events {
        sqlx::query(
            "INSERT INTO drift_events (id, target_id, run_id, kind, subject, description,
                                       masked_before, masked_after, detected_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(event.target_id.as_str())
        .bind(run_id)
        .bind(event.kind.to_string())
        .bind(&event.subject)
        .bind(&event.description)
        .bind(&event.masked_before)
        .bind(&event.masked_after)
        .bind(event.detected_at.to_rfc3339())
        .execute(tx.as_mut())
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// All drift events recorded for a target, newest first.
pub async fn get_by_target(pool: &Pool<Sqlite>, target_id: &str) -> Result<Vec<DriftEvent>> {
    let rows = sqlx::query(
        "SELECT target_id, kind, subject, description, masked_before, masked_after, detected_at
         FROM drift_events WHERE target_id = ?
         ORDER BY detected_at DESC",
    )
    .bind(target_id)
    .fetch_all(pool)
    .await?;

    let mut events = Vec::new();
    for row in rows {
        let target_id_str: String = row.try_get("target_id")?;
        let target_id = TargetId::new(&target_id_str).map_err(|e| {
            DatabaseError::Decode(format!("invalid target id in drift_events: {e}"))
        })?;

        let kind_str: String = row.try_get("kind")?;
        let kind = match kind_str.as_str() {
            "DATA_CHANGE" => DriftKind::DataChange,
            _ => DriftKind::MetadataDrift,
        };

        let detected_at_str: String = row.try_get("detected_at")?;
        let detected_at = sentra_core::Timestamp::from_rfc3339(&detected_at_str)
            .map_err(|e| DatabaseError::Decode(format!("invalid drift timestamp: {e}")))?;

        events.push(DriftEvent {
            target_id,
            kind,
            subject: row.try_get("subject")?,
            description: row.try_get("description")?,
            masked_before: row.try_get("masked_before")?,
            masked_after: row.try_get("masked_after")?,
            detected_at,
        });
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{targets, Database};
    use sentra_core::{ScanScope, SourceKind};
    use sentra_tracker::compare_schemas;
    use sentra_tracker::SchemaSnapshot;

    async fn setup_test_db() -> Database {
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

        db
    }

    #[tokio::test]
    async fn test_insert_and_query_drift_events() {
        let db = setup_test_db().await;
        let target = TargetId::new("hr-database").expect("valid target ID");

        let mut previous = SchemaSnapshot::default();
        previous.add_container(
            "employees",
            vec![("phone".to_string(), "varchar".to_string())],
        );
        let mut current = SchemaSnapshot::default();
        current.add_container(
            "employees",
            vec![("phone_number".to_string(), "varchar".to_string())],
        );

        let events = compare_schemas(&target, &previous, &current);
        insert_events(db.pool(), Some("run-1"), &events)
            .await
            .expect("insert drift events");

        let stored = get_by_target(db.pool(), "hr-database")
            .await
            .expect("get drift events");
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|e| e.kind == DriftKind::MetadataDrift));
    }

    #[tokio::test]
    async fn test_data_change_event_roundtrip() {
        let db = setup_test_db().await;
        let target = TargetId::new("hr-database").expect("valid target ID");

        let event = DriftEvent::data_change(
            target,
            "row-17",
            "customer_phone",
            Some("081234567890"),
            "081298765432",
        );
        insert_events(db.pool(), None, &[event]).await.expect("insert event");

        let stored = get_by_target(db.pool(), "hr-database")
            .await
            .expect("get drift events");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].kind, DriftKind::DataChange);
        // Only masked samples reach the database
        assert_eq!(stored[0].masked_before.as_deref(), Some("08********90"));
    }
}
