//! Database-backed rule store.
//!
//! The `detection_rules` table is the source of truth for the rule set in a
//! deployed scanner; the TOML store in `sentra-rules` covers file-based
//! setups and tests.

use async_trait::async_trait;
use sentra_core::Sensitivity;
use sentra_rules::{parse_context_keywords, RuleError, RuleRecord, RuleStore};
use sqlx::{Pool, Row, Sqlite};
use tracing::debug;

/// Rule store reading active records from the `detection_rules` table.
#[derive(Debug, Clone)]
pub struct SqliteRuleStore {
    pool: Pool<Sqlite>,
}

impl SqliteRuleStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RuleStore for SqliteRuleStore {
    async fn load_active_rules(&self) -> sentra_rules::Result<Vec<RuleRecord>> {
        let rows = sqlx::query(
            "SELECT id, name, rule_type, pattern, score, entity_type, context_keywords, sensitivity
             FROM detection_rules WHERE is_active = 1 ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RuleError::Store(e.to_string()))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let context_raw: Option<String> = row
                .try_get("context_keywords")
                .map_err(|e| RuleError::Store(e.to_string()))?;
            let context_keywords = context_raw
                .as_deref()
                .map(parse_context_keywords)
                .unwrap_or_default();

            let sensitivity_raw: Option<String> = row
                .try_get("sensitivity")
                .map_err(|e| RuleError::Store(e.to_string()))?;
            let sensitivity = sensitivity_raw.as_deref().and_then(|s| match s {
                "specific" | "Specific" => Some(Sensitivity::Specific),
                "general" | "General" => Some(Sensitivity::General),
                _ => None,
            });

            records.push(RuleRecord {
                id: row
                    .try_get("id")
                    .map_err(|e| RuleError::Store(e.to_string()))?,
                name: row
                    .try_get("name")
                    .map_err(|e| RuleError::Store(e.to_string()))?,
                rule_type: row
                    .try_get("rule_type")
                    .map_err(|e| RuleError::Store(e.to_string()))?,
                pattern: row
                    .try_get("pattern")
                    .map_err(|e| RuleError::Store(e.to_string()))?,
                score: row
                    .try_get("score")
                    .map_err(|e| RuleError::Store(e.to_string()))?,
                entity_type: row
                    .try_get("entity_type")
                    .map_err(|e| RuleError::Store(e.to_string()))?,
                context_keywords,
                sensitivity,
                active: true,
            });
        }

        debug!(count = records.len(), "loaded active rules from database");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use sentra_rules::compile_records;

    async fn setup_test_db() -> Database {
        let db = Database::new(":memory:").await.expect("create test database");
        db.run_migrations().await.expect("run migrations");
        db
    }

    #[tokio::test]
    async fn test_load_seed_rules() {
        let db = setup_test_db().await;
        let store = SqliteRuleStore::new(db.pool().clone());

        let records = store.load_active_rules().await.expect("load active rules");
        assert!(records.len() >= 8);

        let ktp = records
            .iter()
            .find(|r| r.name == "KTPRecognizer")
            .expect("seed KTP rule present");
        assert_eq!(ktp.rule_type, "regex");
        assert_eq!(ktp.entity_type.as_deref(), Some("ID_NIK"));

        let ktp_ctx = records
            .iter()
            .find(|r| r.name == "KTPContext")
            .expect("seed KTP context rule present");
        assert!(ktp_ctx.context_keywords.contains(&"ktp".to_string()));
    }

    #[tokio::test]
    async fn test_inactive_rules_excluded() {
        let db = setup_test_db().await;

        sqlx::query("UPDATE detection_rules SET is_active = 0 WHERE name = 'KTPRecognizer'")
            .execute(db.pool())
            .await
            .expect("deactivate rule");

        let store = SqliteRuleStore::new(db.pool().clone());
        let records = store.load_active_rules().await.expect("load active rules");
        assert!(records.iter().all(|r| r.name != "KTPRecognizer"));
    }

    #[tokio::test]
    async fn test_seed_rules_compile_cleanly() {
        let db = setup_test_db().await;
        let store = SqliteRuleStore::new(db.pool().clone());

        let records = store.load_active_rules().await.expect("load active rules");
        let (snapshot, skipped) = compile_records(records);

        assert!(skipped.is_empty(), "seed rules must all compile: {skipped:?}");
        assert!(!snapshot.rules().is_empty());
    }
}
