//! Typed task queue between the orchestrator and its worker pool.
//!
//! Work units are `(target, phase)` pairs. A worker executes one phase and
//! enqueues the successor on success, so one target's phases are naturally
//! serialized while distinct targets run in parallel across workers. The
//! queue transport here is in-process mpsc; a distributed queue would sit
//! behind the same message shapes.

use crate::error::ScanError;
use crate::orchestrator::ScanOrchestrator;
use sentra_db::scan_runs::ScanPhase;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One unit of scan work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTask {
    /// Target to scan
    pub target_id: String,
    /// Phase to execute
    pub phase: ScanPhase,
}

/// Worker-reported outcome of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskOutcome {
    /// Phase executed; successor enqueued if one exists
    Success,
    /// Phase was skipped (cancelled before execution)
    Skipped,
    /// Phase failed; the run is over
    Failed,
}

/// Report sent back after each executed task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    /// The task that ran
    pub task: PhaseTask,
    /// What happened
    pub outcome: TaskOutcome,
    /// Skipped items and failure reasons
    pub diagnostics: Vec<String>,
    /// Whether the target's run ended with this task (last phase, failure,
    /// or cancellation); once true, the target may be enqueued again
    pub run_finished: bool,
}

/// Handle to a running worker pool.
pub struct WorkerPool {
    task_tx: mpsc::UnboundedSender<PhaseTask>,
    report_rx: Option<mpsc::UnboundedReceiver<TaskReport>>,
    handles: Vec<JoinHandle<()>>,
    // Workers keep task_tx clones for successor phases, so closing the
    // channel alone can never drain the pool; shutdown uses this instead.
    shutdown: CancellationToken,
}

impl WorkerPool {
    /// Spawn `worker_count` workers draining the task queue.
    #[must_use]
    pub fn spawn(
        orchestrator: Arc<ScanOrchestrator>,
        worker_count: usize,
        cancel: CancellationToken,
    ) -> Self {
        let (task_tx, task_rx) = mpsc::unbounded_channel::<PhaseTask>();
        let (report_tx, report_rx) = mpsc::unbounded_channel::<TaskReport>();
        let shutdown = CancellationToken::new();

        // Workers share one receiver behind a mutex: each task goes to
        // exactly one worker.
        let task_rx = Arc::new(tokio::sync::Mutex::new(task_rx));

        let mut handles = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let orchestrator = Arc::clone(&orchestrator);
            let task_rx = Arc::clone(&task_rx);
            let task_tx = task_tx.clone();
            let report_tx = report_tx.clone();
            let cancel = cancel.clone();
            let shutdown = shutdown.clone();

            handles.push(tokio::spawn(async move {
                loop {
                    let task = {
                        let mut rx = task_rx.lock().await;
                        tokio::select! {
                            task = rx.recv() => task,
                            () = cancel.cancelled() => None,
                            () = shutdown.cancelled() => None,
                        }
                    };

                    let Some(task) = task else {
                        debug!(worker_id, "worker shutting down");
                        break;
                    };

                    if cancel.is_cancelled() {
                        let _ = report_tx.send(TaskReport {
                            task,
                            outcome: TaskOutcome::Skipped,
                            diagnostics: vec!["cancelled before execution".to_string()],
                            run_finished: true,
                        });
                        continue;
                    }

                    info!(worker_id, target = %task.target_id, phase = %task.phase, "executing phase task");

                    match orchestrator
                        .execute_phase(&task.target_id, task.phase)
                        .await
                    {
                        Ok(outcome) => {
                            let run_finished = outcome.next_phase.is_none();
                            match outcome.next_phase {
                                Some(next) => {
                                    let _ = task_tx.send(PhaseTask {
                                        target_id: task.target_id.clone(),
                                        phase: next,
                                    });
                                }
                                None => {
                                    if let Err(e) =
                                        orchestrator.finalize_run(&task.target_id).await
                                    {
                                        warn!(
                                            worker_id,
                                            target = %task.target_id,
                                            error = %e,
                                            "run finalization failed"
                                        );
                                    }
                                }
                            }
                            let _ = report_tx.send(TaskReport {
                                task,
                                outcome: TaskOutcome::Success,
                                diagnostics: outcome.diagnostics,
                                run_finished,
                            });
                        }
                        Err(e) => {
                            let outcome = if matches!(e, ScanError::Cancelled { .. }) {
                                TaskOutcome::Skipped
                            } else {
                                TaskOutcome::Failed
                            };
                            let message = e.to_string();
                            warn!(worker_id, target = %task.target_id, error = %message, "phase task failed");
                            let _ = orchestrator.abort_run(&task.target_id, e).await;
                            let _ = report_tx.send(TaskReport {
                                task,
                                outcome,
                                diagnostics: vec![message],
                                run_finished: true,
                            });
                        }
                    }
                }
            }));
        }

        Self {
            task_tx,
            report_rx: Some(report_rx),
            handles,
            shutdown,
        }
    }

    /// Enqueue a target's first phase.
    ///
    /// Callers must not enqueue a target that already has phases in flight;
    /// per-target serialization relies on one chain of tasks per target.
    pub fn enqueue_target(&self, target_id: &str) {
        let _ = self.task_tx.send(PhaseTask {
            target_id: target_id.to_string(),
            phase: ScanPhase::DependencyCheck,
        });
    }

    /// Receive the next task report, or `None` when all workers are gone.
    ///
    /// Returns `None` immediately if the receiver was taken with
    /// [`WorkerPool::take_report_receiver`].
    pub async fn next_report(&mut self) -> Option<TaskReport> {
        match &mut self.report_rx {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }

    /// Detach the report receiver so it can be polled independently of the
    /// pool handle (e.g. in a `select!` loop that also enqueues work).
    pub fn take_report_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<TaskReport>> {
        self.report_rx.take()
    }

    /// Stop accepting work and wait for workers to exit.
    ///
    /// In-flight phase executions complete; queued tasks are discarded.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        drop(self.task_tx);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}
