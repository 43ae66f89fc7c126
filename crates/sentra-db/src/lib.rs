//! Sentra Database Layer
//!
//! Provides `SQLite` database access via `SQLx` with embedded, versioned
//! migrations for the scanner's persisted state: targets, runs, results,
//! drift events, change marks, rules, and the audit log.
//!
//! # Example
//!
//! ```ignore
//! use sentra_db::Database;
//!
//! let db = Database::new("sentra.db").await?;
//! db.run_migrations().await?;
//! ```
//!
//! # Design Principles
//!
//! - Samples are masked before they reach this crate; raw values are never
//!   stored or logged
//! - `scan_results` and `drift_events` are write-once; corrections are new rows
//! - `change_marks` commit only after a phase fully completes
//! - Migrations run automatically on first connection

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod audit;
pub mod change_marks;
pub mod connection;
pub mod drift_events;
pub mod error;
pub mod migrations;
pub mod rules;
pub mod scan_results;
pub mod scan_runs;
pub mod targets;

// Re-export commonly used types
pub use connection::ScannerPool;
pub use error::{DatabaseError, Result};
pub use rules::SqliteRuleStore;
pub use scan_runs::{RunStatus, ScanPhase, ScanRun};

use std::path::Path;

/// High-level database interface with migrations.
///
/// This provides a convenient wrapper around `ScannerPool` that handles
/// initialization and migration automatically.
#[derive(Debug)]
pub struct Database {
    pool: ScannerPool,
}

impl Database {
    /// Create a new database connection.
    ///
    /// # Arguments
    /// * `path` - Path to the database file (or `:memory:` for in-memory)
    ///
    /// # Errors
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let pool = ScannerPool::new(path).await?;
        Ok(Self { pool })
    }

    /// Create a database instance from an existing pool.
    #[must_use]
    pub fn from_scanner_pool(pool: ScannerPool) -> Self {
        Self { pool }
    }

    /// Run all pending database migrations.
    ///
    /// This should be called after creating a new database instance to ensure
    /// the schema is up to date.
    ///
    /// # Errors
    /// Returns `DatabaseError::Migration` if any migration fails.
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(self.pool.pool()).await
    }

    /// Get the current schema version.
    ///
    /// Returns the number of applied migrations.
    ///
    /// # Errors
    /// Returns `DatabaseError` if the version cannot be queried.
    pub async fn get_schema_version(&self) -> Result<i64> {
        migrations::get_schema_version(self.pool.pool()).await
    }

    /// Get a reference to the underlying connection pool.
    ///
    /// This allows direct access to the `SQLx` pool for custom queries.
    #[must_use]
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Sqlite> {
        self.pool.pool()
    }

    /// Close the database connection gracefully.
    ///
    /// This ensures all connections are properly closed and resources are cleaned up.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_creation() {
        let db = Database::new(":memory:").await.expect("create database");
        sqlx::query("SELECT 1")
            .execute(db.pool())
            .await
            .expect("run trivial query");
    }

    #[tokio::test]
    async fn test_database_migrations() {
        let db = Database::new(":memory:").await.expect("create database");

        let version_before = db.get_schema_version().await.expect("get version");
        assert_eq!(version_before, 0);

        db.run_migrations().await.expect("run migrations");

        let version_after = db.get_schema_version().await.expect("get version");
        assert_eq!(version_after, 2);
    }

    #[tokio::test]
    async fn test_database_schema() {
        let db = Database::new(":memory:").await.expect("create database");
        db.run_migrations().await.expect("run migrations");

        // Verify all tables exist
        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name != '_sqlx_migrations' ORDER BY name"
        )
        .fetch_all(db.pool())
        .await
        .expect("query tables");

        assert_eq!(
            tables,
            vec![
                "audit_log",
                "change_marks",
                "detection_rules",
                "drift_events",
                "scan_results",
                "scan_runs",
                "scan_targets",
            ]
        );

        // Verify scan_runs table schema
        let run_columns: Vec<String> =
            sqlx::query_scalar("SELECT name FROM pragma_table_info('scan_runs') ORDER BY cid")
                .fetch_all(db.pool())
                .await
                .expect("query columns");

        assert_eq!(
            run_columns,
            vec![
                "id",
                "target_id",
                "started_at",
                "completed_at",
                "phase",
                "status",
                "rule_snapshot_version",
                "diagnostics",
                "error_message"
            ]
        );
    }

    #[tokio::test]
    async fn test_database_close() {
        let db = Database::new(":memory:").await.expect("create database");
        db.close().await; // Should not panic
    }
}
