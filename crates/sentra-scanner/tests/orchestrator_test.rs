use sentra_core::{AppConfig, DataLocation, ScanScope, SourceKind, Timestamp};
use sentra_db::scan_runs::{RunStatus, ScanPhase};
use sentra_db::{change_marks, drift_events, scan_results, scan_runs, targets, Database};
use sentra_engine::ContextHints;
use sentra_rules::{MemoryRuleStore, RuleRecord};
use sentra_scanner::source::{ItemDescriptor, MemorySource, SourceRecord};
use sentra_scanner::{DataSource, ScanError, ScanOrchestrator, TaskOutcome, WorkerPool};
use sentra_tracker::{DriftKind, SchemaSnapshot};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Rule records equivalent to the seed set's NIK rules.
fn nik_rules() -> Vec<RuleRecord> {
    vec![
        RuleRecord {
            id: "rule-nik".to_string(),
            name: "KTPRecognizer".to_string(),
            rule_type: "regex".to_string(),
            pattern: r"\b\d{16}\b".to_string(),
            score: 0.5,
            entity_type: Some("ID_NIK".to_string()),
            context_keywords: Vec::new(),
            sensitivity: None,
            active: true,
        },
        RuleRecord {
            id: "rule-nik-ctx".to_string(),
            name: "KTPContext".to_string(),
            rule_type: "proximity".to_string(),
            pattern: "nik".to_string(),
            score: 0.5,
            entity_type: Some("ID_NIK".to_string()),
            context_keywords: vec!["nik".to_string(), "ktp".to_string()],
            sensitivity: None,
            active: true,
        },
    ]
}

fn employee_record(row: u64, value: &str) -> SourceRecord {
    SourceRecord {
        unit_id: format!("employees:{row}"),
        content: value.as_bytes().to_vec(),
        hints: ContextHints::for_column("employees", "nik"),
        location: DataLocation::Database {
            database: "hr".to_string(),
            table: "employees".to_string(),
            column: "nik".to_string(),
            row: Some(row),
        },
        updated_at: None,
    }
}

fn employees_item() -> ItemDescriptor {
    ItemDescriptor {
        id: "employees".to_string(),
        name: "employees".to_string(),
        fields: vec!["nik".to_string(), "dept".to_string()],
        updated_at: None,
    }
}

fn hr_schema() -> SchemaSnapshot {
    let mut schema = SchemaSnapshot::default();
    schema.add_container(
        "employees",
        vec![
            ("nik".to_string(), "varchar".to_string()),
            ("dept".to_string(), "varchar".to_string()),
        ],
    );
    schema
}

/// Standard test rig: one database-like target with a NIK-bearing table.
async fn setup(scope: ScanScope) -> (Arc<Database>, Arc<MemorySource>, ScanOrchestrator) {
    let db = Arc::new(Database::new(":memory:").await.expect("create database"));
    db.run_migrations().await.expect("run migrations");

    targets::create_target(
        db.pool(),
        "hr-database".to_string(),
        "HR Database".to_string(),
        SourceKind::Database,
        "memory://hr".to_string(),
        scope,
        7,
    )
    .await
    .expect("create target");

    let source = Arc::new(MemorySource::new());
    source.set_schema(hr_schema());
    source.add_item(
        employees_item(),
        vec![
            employee_record(1, "nik karyawan: 1234567812345678"),
            employee_record(2, "no identity data in this row"),
        ],
    );
    // An item with no PII-looking name: filtered out at the metadata phase
    source.add_item(
        ItemDescriptor {
            id: "build-artifacts".to_string(),
            name: "build_artifacts".to_string(),
            fields: vec!["hash".to_string(), "size".to_string()],
            updated_at: None,
        },
        vec![],
    );

    let rule_store = Arc::new(MemoryRuleStore::new(nik_rules()));
    let orchestrator = ScanOrchestrator::new(
        Arc::clone(&source) as Arc<dyn DataSource>,
        rule_store,
        Arc::clone(&db),
        AppConfig::default(),
    );

    (db, source, orchestrator)
}

#[tokio::test]
async fn test_full_run_produces_masked_results() {
    let (db, _source, orchestrator) = setup(ScanScope::Full).await;

    let summary = orchestrator
        .run_target("hr-database")
        .await
        .expect("run target");

    assert_eq!(summary.status, RunStatus::Completed);

    let run = scan_runs::get_run(db.pool(), &summary.run_id)
        .await
        .expect("get run");
    assert_eq!(run.phase, ScanPhase::Done);
    assert!(run.rule_snapshot_version.is_some());

    let results = scan_results::get_by_run(db.pool(), &summary.run_id)
        .await
        .expect("get results");
    assert!(!results.is_empty());

    let nik = results
        .iter()
        .find(|r| r.entity_type == "ID_NIK")
        .expect("NIK result group present");
    assert_eq!(nik.container, "employees");
    assert_eq!(nik.field.as_deref(), Some("nik"));
    assert_eq!(nik.sensitivity, "Specific");
    // Context boost from the column name and row text
    assert!(nik.max_score > 0.5);
    // Raw value never persisted
    assert_eq!(nik.sample_masked.as_deref(), Some("12************78"));

    // Specific PII found: the target picks up the sensitive tags
    let target = targets::get_target(db.pool(), "hr-database")
        .await
        .expect("get target");
    assert!(target.tags.contains(&"PII_SENSITIVE".to_string()));
    assert!(target.last_data_scan_at.is_some());
    assert!(target.next_run_at.is_some());
}

#[tokio::test]
async fn test_unreachable_source_fails_without_state() {
    let (db, source, orchestrator) = setup(ScanScope::Full).await;
    source.set_unreachable(true);

    let result = orchestrator.run_target("hr-database").await;
    assert!(matches!(result, Err(ScanError::SourceUnreachable { .. })));

    // The scope is unattempted: no run row, no results, no change mark
    let latest = scan_runs::latest_run_for_target(db.pool(), "hr-database")
        .await
        .expect("query runs");
    assert!(latest.is_none());
    let mark = change_marks::get_mark(db.pool(), "hr-database")
        .await
        .expect("get mark");
    assert!(mark.is_empty());
}

#[tokio::test]
async fn test_broken_item_is_skipped_not_fatal() {
    let (db, source, orchestrator) = setup(ScanScope::Full).await;

    // A second PII-named item that cannot be read
    source.add_item(
        ItemDescriptor {
            id: "customer-emails".to_string(),
            name: "customer_emails".to_string(),
            fields: vec!["email".to_string()],
            updated_at: None,
        },
        vec![],
    );
    source.fail_item("customer-emails");

    let summary = orchestrator
        .run_target("hr-database")
        .await
        .expect("run target");

    assert_eq!(summary.status, RunStatus::CompletedWithSkips);
    assert!(summary
        .diagnostics
        .iter()
        .any(|d| d.contains("customer-emails")));

    // The healthy item still produced results
    let results = scan_results::get_by_run(db.pool(), &summary.run_id)
        .await
        .expect("get results");
    assert!(results.iter().any(|r| r.entity_type == "ID_NIK"));

    let run = scan_runs::get_run(db.pool(), &summary.run_id)
        .await
        .expect("get run");
    assert_eq!(run.status, RunStatus::CompletedWithSkips);
    assert!(!run.diagnostics.is_empty());
}

#[tokio::test]
async fn test_unchanged_target_full_scan_is_incremental() {
    let (db, _source, orchestrator) = setup(ScanScope::Sample).await;

    let first = orchestrator
        .run_target("hr-database")
        .await
        .expect("first run");
    assert_eq!(first.status, RunStatus::Completed);

    let first_results = scan_results::get_by_run(db.pool(), &first.run_id)
        .await
        .expect("first results");
    let mark_after_first = change_marks::get_mark(db.pool(), "hr-database")
        .await
        .expect("mark after first run");
    assert!(!mark_after_first.digests.is_empty());

    // Second run over identical content
    let second = orchestrator
        .run_target("hr-database")
        .await
        .expect("second run");
    assert_eq!(second.status, RunStatus::Completed);

    // No data changed: no drift events, mark digests unchanged
    let events = drift_events::get_by_target(db.pool(), "hr-database")
        .await
        .expect("drift events");
    assert!(events.is_empty());

    let mark_after_second = change_marks::get_mark(db.pool(), "hr-database")
        .await
        .expect("mark after second run");
    assert_eq!(mark_after_second.digests, mark_after_first.digests);

    // First run's result history is untouched
    let first_results_again = scan_results::get_by_run(db.pool(), &first.run_id)
        .await
        .expect("first results again");
    assert_eq!(first_results.len(), first_results_again.len());
}

#[tokio::test]
async fn test_schema_drift_emitted_before_full_scan() {
    let (db, source, orchestrator) = setup(ScanScope::Sample).await;

    orchestrator
        .run_target("hr-database")
        .await
        .expect("first run");

    // Rename a column between runs
    let mut renamed = SchemaSnapshot::default();
    renamed.add_container(
        "employees",
        vec![
            ("nik_number".to_string(), "varchar".to_string()),
            ("dept".to_string(), "varchar".to_string()),
        ],
    );
    source.set_schema(renamed);

    orchestrator
        .run_target("hr-database")
        .await
        .expect("second run");

    let events = drift_events::get_by_target(db.pool(), "hr-database")
        .await
        .expect("drift events");
    let metadata_drift: Vec<_> = events
        .iter()
        .filter(|e| e.kind == DriftKind::MetadataDrift)
        .collect();
    // Rename = one removal + one addition
    assert_eq!(metadata_drift.len(), 2);
    assert!(metadata_drift
        .iter()
        .any(|e| e.subject == "employees.nik"));
    assert!(metadata_drift
        .iter()
        .any(|e| e.subject == "employees.nik_number"));
}

#[tokio::test]
async fn test_encrypted_content_recorded_not_classified() {
    let (db, source, orchestrator) = setup(ScanScope::Full).await;

    // High-entropy bytes: a full byte-value cycle reads as ciphertext
    let cipherish: Vec<u8> = (0..4096u32).map(|i| (i % 256) as u8).collect();
    source.add_item(
        ItemDescriptor {
            id: "backups-encrypted".to_string(),
            name: "customer_backup.enc".to_string(),
            fields: Vec::new(),
            updated_at: None,
        },
        vec![SourceRecord {
            unit_id: "backups-encrypted".to_string(),
            content: cipherish,
            hints: ContextHints::for_file("customer_backup.enc"),
            location: DataLocation::File {
                path: "/backups/customer_backup.enc".to_string(),
                position: None,
            },
            updated_at: None,
        }],
    );

    let summary = orchestrator
        .run_target("hr-database")
        .await
        .expect("run target");

    let results = scan_results::get_by_run(db.pool(), &summary.run_id)
        .await
        .expect("get results");
    let encrypted = results
        .iter()
        .find(|r| r.entity_type == "ENCRYPTED_CONTENT")
        .expect("encrypted content recorded");
    assert_eq!(encrypted.container, "/backups/customer_backup.enc");
    // No text classification ran against the ciphertext
    assert!(results
        .iter()
        .filter(|r| r.container == "/backups/customer_backup.enc")
        .all(|r| r.entity_type == "ENCRYPTED_CONTENT"));
}

#[tokio::test]
async fn test_cancellation_before_run() {
    let (_db, _source, orchestrator) = setup(ScanScope::Full).await;

    orchestrator.cancellation_token().cancel();

    let result = orchestrator.run_target("hr-database").await;
    assert!(matches!(result, Err(ScanError::Cancelled { .. })));
}

#[tokio::test]
async fn test_worker_pool_drives_phases_in_order() {
    let (db, _source, orchestrator) = setup(ScanScope::Full).await;

    let cancel = CancellationToken::new();
    let mut pool = WorkerPool::spawn(Arc::new(orchestrator), 2, cancel);
    pool.enqueue_target("hr-database");

    let mut phases = Vec::new();
    while let Some(report) = pool.next_report().await {
        assert_eq!(report.outcome, TaskOutcome::Success);
        phases.push(report.task.phase);
        if report.task.phase == ScanPhase::FullScan {
            break;
        }
    }

    assert_eq!(
        phases,
        vec![
            ScanPhase::DependencyCheck,
            ScanPhase::MetadataProfile,
            ScanPhase::SmartSample,
            ScanPhase::FullScan,
        ]
    );

    pool.shutdown().await;

    // The worker finalized the run after its last phase
    let latest = scan_runs::latest_run_for_target(db.pool(), "hr-database")
        .await
        .expect("query runs")
        .expect("run present");
    assert_eq!(latest.phase, ScanPhase::Done);
    assert_eq!(latest.status, RunStatus::Completed);
}

#[tokio::test]
async fn test_low_risk_items_excluded_after_sampling() {
    let (db, source, orchestrator) = setup(ScanScope::Full).await;

    // PII-looking name, but the content never matches anything
    source.add_item(
        ItemDescriptor {
            id: "customer-notes".to_string(),
            name: "customer_notes".to_string(),
            fields: vec!["note".to_string()],
            updated_at: None,
        },
        vec![SourceRecord {
            unit_id: "customer-notes:1".to_string(),
            content: b"routine maintenance notes only".to_vec(),
            hints: ContextHints::for_column("customer_notes", "note"),
            location: DataLocation::Database {
                database: "hr".to_string(),
                table: "customer_notes".to_string(),
                column: "note".to_string(),
                row: Some(1),
            },
            updated_at: None,
        }],
    );

    let summary = orchestrator
        .run_target("hr-database")
        .await
        .expect("run target");
    assert_eq!(summary.status, RunStatus::Completed);

    // Sampling found nothing in customer_notes, so no result group ever
    // references it
    let results = scan_results::get_by_run(db.pool(), &summary.run_id)
        .await
        .expect("get results");
    assert!(results.iter().all(|r| r.container != "customer_notes"));
}

#[tokio::test]
async fn test_timestamp_cursor_incremental_rescan() {
    let (db, source, orchestrator) = setup(ScanScope::Sample).await;

    let old = Timestamp::from_rfc3339("2026-08-01T00:00:00Z").expect("valid ts");
    let mut record_one = employee_record(1, "nik karyawan: 1234567812345678");
    record_one.updated_at = Some(old);
    let mut record_two = employee_record(2, "nik karyawan: 8765432187654321");
    record_two.updated_at = Some(old);
    source.set_records("employees", vec![record_one.clone(), record_two]);

    orchestrator
        .run_target("hr-database")
        .await
        .expect("first run");

    let mark = change_marks::get_mark(db.pool(), "hr-database")
        .await
        .expect("get mark");
    assert_eq!(mark.cursor, Some(old));

    // One row modified since the cursor
    let newer = Timestamp::from_rfc3339("2026-08-05T00:00:00Z").expect("valid ts");
    let mut changed = employee_record(1, "nik karyawan: 1234567812345678");
    changed.updated_at = Some(newer);
    let mut unchanged = employee_record(2, "nik karyawan: 8765432187654321");
    unchanged.updated_at = Some(old);
    source.set_records("employees", vec![changed, unchanged]);

    orchestrator
        .run_target("hr-database")
        .await
        .expect("second run");

    let mark = change_marks::get_mark(db.pool(), "hr-database")
        .await
        .expect("get mark");
    // Cursor advanced to the newest observed timestamp
    assert_eq!(mark.cursor, Some(newer));
}
