//! Scan worker daemon.
//!
//! Polls the target table for due scans and feeds them to the worker pool.
//! One process serves every configured target; the pool serializes phases
//! per target while distinct targets scan in parallel.

use anyhow::Context;
use sentra_core::AppConfig;
use sentra_db::{targets, Database, SqliteRuleStore};
use sentra_scanner::{DataSource, FilesystemSource, ScanOrchestrator, WorkerPool};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How often the scheduler loop checks for due targets.
const SCHEDULE_POLL_SECS: u64 = 60;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load_with_env().context("load configuration")?;

    let db_path = AppConfig::data_dir()
        .context("resolve data directory")?
        .join("sentra.db");
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).context("create data directory")?;
    }

    let db = Arc::new(
        Database::new(&db_path)
            .await
            .context("open scanner database")?,
    );
    db.run_migrations().await.context("run migrations")?;

    let rule_store = Arc::new(SqliteRuleStore::new(db.pool().clone()));
    let source: Arc<dyn DataSource> = Arc::new(FilesystemSource::new());

    let worker_count = config.scanning.worker_count;
    let orchestrator = Arc::new(ScanOrchestrator::new(
        source,
        rule_store,
        Arc::clone(&db),
        config,
    ));

    let cancel = CancellationToken::new();
    let mut pool = WorkerPool::spawn(Arc::clone(&orchestrator), worker_count, cancel.clone());
    let mut reports = pool
        .take_report_receiver()
        .expect("report receiver available at startup");

    // Shut down cleanly on ctrl-c: stop admitting work, let in-flight
    // items finish.
    let orchestrator_cancel = orchestrator.cancellation_token();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            orchestrator_cancel.cancel();
            signal_cancel.cancel();
        }
    });

    info!(workers = worker_count, "scan worker started");

    // Targets with a phase chain in flight; re-enqueueing one would break
    // per-target serialization.
    let mut in_flight: HashSet<String> = HashSet::new();

    let mut poll = tokio::time::interval(Duration::from_secs(SCHEDULE_POLL_SECS));
    loop {
        tokio::select! {
            _ = poll.tick() => {
                if let Err(e) = enqueue_due_targets(&db, &pool, &mut in_flight).await {
                    warn!(error = %e, "schedule poll failed");
                }
            }
            report = reports.recv() => {
                match report {
                    Some(report) => {
                        info!(
                            target = %report.task.target_id,
                            phase = %report.task.phase,
                            outcome = ?report.outcome,
                            skipped = report.diagnostics.len(),
                            "phase report"
                        );
                        if report.run_finished {
                            in_flight.remove(&report.task.target_id);
                        }
                    }
                    None => break,
                }
            }
            () = cancel.cancelled() => break,
        }
    }

    pool.shutdown().await;
    info!("scan worker stopped");
    Ok(())
}

/// Enqueue every idle target whose `next_run_at` has passed (or was never set).
async fn enqueue_due_targets(
    db: &Database,
    pool: &WorkerPool,
    in_flight: &mut HashSet<String>,
) -> anyhow::Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    let all_targets = targets::list_targets(db.pool()).await?;

    for target in all_targets {
        if in_flight.contains(&target.id) {
            continue;
        }

        let due = match &target.next_run_at {
            Some(next_run_at) => sentra_scheduler::is_job_due(next_run_at, &now),
            None => true,
        };

        if due {
            info!(target = %target.id, "target due for scan");
            in_flight.insert(target.id.clone());
            pool.enqueue_target(&target.id);
        }
    }

    Ok(())
}
