//! Scan orchestrator: the four-phase discovery state machine.
//!
//! Each target run walks `DependencyCheck → MetadataProfile → SmartSample →
//! FullScan → Done`, narrowing scope at every step so the expensive full
//! scan only touches items that metadata heuristics flagged and sampling
//! confirmed. Phase transitions are persisted immediately; item-level
//! failures are isolated as diagnostics and never abort a phase.

use crate::aggregate::aggregate;
use crate::error::{Result, ScanError};
use crate::heuristics;
use crate::source::{DataSource, ItemDescriptor, SourceRecord};
use futures::stream::{FuturesUnordered, StreamExt};
use sentra_analysis::{is_likely_encrypted, DuplicateDetector};
use sentra_core::{AppConfig, EntityType, Sensitivity, TargetId};
use sentra_db::scan_runs::{RunStatus, ScanPhase};
use sentra_db::targets::ScanTarget;
use sentra_db::{audit, change_marks, drift_events, scan_results, scan_runs, targets, Database};
use sentra_engine::{Finding, ScoringEngine};
use sentra_rules::{compile_records, RuleSnapshot, RuleStore};
use sentra_tracker::{compare_schemas, diff, ChangeMark, DriftEvent, UnitState};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Entity type recorded for content excluded as likely encrypted.
const ENCRYPTED_ENTITY: &str = "ENCRYPTED_CONTENT";

/// Tags applied to a target when `Specific` PII is confirmed on it.
const SENSITIVE_TAGS: &[&str] = &["PII_SENSITIVE", "CONFIDENTIAL"];

/// Result of one phase execution.
#[derive(Debug, Clone)]
pub struct PhaseOutcome {
    /// The phase that ran
    pub phase: ScanPhase,
    /// The phase to enqueue next, `None` when the run is finished
    pub next_phase: Option<ScanPhase>,
    /// Items skipped in this phase, with reasons
    pub diagnostics: Vec<String>,
}

/// Summary of a completed target run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// The run's identifier
    pub run_id: String,
    /// Final status
    pub status: RunStatus,
    /// Skipped items and reasons, across all phases
    pub diagnostics: Vec<String>,
}

/// Per-run state carried between phases.
///
/// Recomputable: if the process restarts mid-run, the next phase execution
/// rebuilds this from metadata (cheap) rather than re-reading content.
struct RunContext {
    run_id: String,
    snapshot: Arc<RuleSnapshot>,
    flagged: Vec<ItemDescriptor>,
    survivors: Vec<ItemDescriptor>,
    diagnostics: Vec<String>,
    pending_mark: Option<ChangeMark>,
    found_specific: bool,
    category_tags: Vec<String>,
}

/// Orchestrates scan runs across targets.
///
/// One orchestrator serves all targets; per-target runs are serialized by
/// the task queue while distinct targets execute in parallel. The rule
/// snapshot is compiled once per run and shared read-only.
pub struct ScanOrchestrator {
    source: Arc<dyn DataSource>,
    rule_store: Arc<dyn RuleStore>,
    db: Arc<Database>,
    engine: ScoringEngine,
    config: AppConfig,
    cancel: CancellationToken,
    contexts: Mutex<HashMap<String, RunContext>>,
}

impl ScanOrchestrator {
    /// Create a new orchestrator.
    #[must_use]
    pub fn new(
        source: Arc<dyn DataSource>,
        rule_store: Arc<dyn RuleStore>,
        db: Arc<Database>,
        config: AppConfig,
    ) -> Self {
        let engine = ScoringEngine::new(config.detection.clone());
        Self {
            source,
            rule_store,
            db,
            engine,
            config,
            cancel: CancellationToken::new(),
            contexts: Mutex::new(HashMap::new()),
        }
    }

    /// Token used to cancel in-flight runs.
    ///
    /// Cancellation is honored between phases and between items; in-flight
    /// item processing completes before the run acknowledges it.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run every phase for one target, start to finish.
    ///
    /// This is the serialized per-target entry point: callers must not
    /// invoke it concurrently for the same target.
    pub async fn run_target(&self, target_id: &str) -> Result<RunSummary> {
        let mut phase = self.resume_phase(target_id).await?;

        loop {
            let outcome = match self.execute_phase(target_id, phase).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    return self.abort_run(target_id, e).await;
                }
            };

            match outcome.next_phase {
                Some(next) => phase = next,
                None => break,
            }
        }

        self.finalize_run(target_id).await
    }

    /// Determine where a run should start: a fresh `DependencyCheck`, or
    /// the phase after the last one a crashed run persisted.
    async fn resume_phase(&self, target_id: &str) -> Result<ScanPhase> {
        let latest = scan_runs::latest_run_for_target(self.db.pool(), target_id).await?;

        if let Some(run) = latest {
            if run.status == RunStatus::InProgress {
                let resume_at = run.phase.next().unwrap_or(ScanPhase::Done);
                if resume_at != ScanPhase::Done {
                    info!(
                        target = target_id,
                        run = %run.id,
                        phase = %resume_at,
                        "resuming interrupted run"
                    );
                    self.restore_context(target_id, run.id.clone()).await?;
                    return Ok(resume_at);
                }
            }
        }

        Ok(ScanPhase::DependencyCheck)
    }

    /// Execute a single phase for a target.
    ///
    /// Queue workers call this directly; `run_target` drives it in a loop.
    pub async fn execute_phase(&self, target_id: &str, phase: ScanPhase) -> Result<PhaseOutcome> {
        if self.cancel.is_cancelled() {
            return Err(self.cancelled(target_id));
        }

        let target = targets::get_target(self.db.pool(), target_id).await?;

        let outcome = match phase {
            ScanPhase::DependencyCheck => self.phase_dependency_check(&target).await?,
            ScanPhase::MetadataProfile => self.phase_metadata_profile(&target).await?,
            ScanPhase::SmartSample => self.phase_smart_sample(&target).await?,
            ScanPhase::FullScan => self.phase_full_scan(&target).await?,
            ScanPhase::Done => PhaseOutcome {
                phase: ScanPhase::Done,
                next_phase: None,
                diagnostics: Vec::new(),
            },
        };

        // Persist the transition the moment the phase commits, so a crash
        // resumes here instead of at DependencyCheck.
        if phase != ScanPhase::Done {
            let run_id = self.run_id(target_id)?;
            scan_runs::update_phase(self.db.pool(), &run_id, phase).await?;
            self.append_diagnostics(target_id, &outcome.diagnostics);
        }

        Ok(outcome)
    }

    // ---- Phase implementations -------------------------------------------

    /// `DependencyCheck`: the source must be reachable before any state is
    /// created beyond the run row itself.
    async fn phase_dependency_check(&self, target: &ScanTarget) -> Result<PhaseOutcome> {
        info!(target = %target.id, "dependency check");

        // Compile this run's rule snapshot first: a registry that fails to
        // load outright is as fatal as an unreachable source.
        let records = self.rule_store.load_active_rules().await?;
        let (snapshot, skipped) = compile_records(records);
        for skip in &skipped {
            warn!(rule = %skip.name, reason = %skip.reason, "rule excluded from snapshot");
        }

        self.source.check(target).await?;

        let run = scan_runs::create_run(
            self.db.pool(),
            target.id.clone(),
            Some(snapshot.version().to_string()),
        )
        .await?;
        audit::record(
            self.db.pool(),
            "run_started",
            Some(target.id.as_str()),
            Some(run.id.as_str()),
            None,
        )
        .await?;

        let context = RunContext {
            run_id: run.id,
            snapshot: Arc::new(snapshot),
            flagged: Vec::new(),
            survivors: Vec::new(),
            diagnostics: skipped
                .iter()
                .map(|s| format!("rule '{}': {}", s.name, s.reason))
                .collect(),
            pending_mark: None,
            found_specific: false,
            category_tags: Vec::new(),
        };
        self.contexts
            .lock()
            .expect("contexts lock")
            .insert(target.id.clone(), context);

        Ok(PhaseOutcome {
            phase: ScanPhase::DependencyCheck,
            next_phase: Some(ScanPhase::MetadataProfile),
            diagnostics: Vec::new(),
        })
    }

    /// `MetadataProfile`: crawl structure only, compare schemas for drift,
    /// and flag likely-PII items by name heuristics.
    async fn phase_metadata_profile(&self, target: &ScanTarget) -> Result<PhaseOutcome> {
        info!(target = %target.id, "metadata profile");

        let schema = self.source.schema_snapshot(target).await?;
        let previous_mark = change_marks::get_mark(self.db.pool(), &target.id).await?;

        // Drift must be visible before any data scanning happens.
        if let Some(previous_schema) = &previous_mark.schema {
            let target_id = self.parse_target_id(&target.id)?;
            let events = compare_schemas(&target_id, previous_schema, &schema);
            if !events.is_empty() {
                let run_id = self.run_id(&target.id)?;
                drift_events::insert_events(self.db.pool(), Some(run_id.as_str()), &events).await?;
            }
        }

        let items = self.source.list_items(target).await?;
        let total = items.len();
        let flagged: Vec<ItemDescriptor> =
            items.into_iter().filter(heuristics::is_flagged).collect();

        info!(
            target = %target.id,
            total,
            flagged = flagged.len(),
            "metadata profile scored items"
        );

        // Commit the observed schema with the metadata phase: drift against
        // it has already been recorded.
        let mut mark = previous_mark;
        mark.schema = Some(schema);
        change_marks::commit_mark(self.db.pool(), &target.id, &mark).await?;
        targets::touch_metadata_scan(self.db.pool(), &target.id).await?;

        {
            let mut contexts = self.contexts.lock().expect("contexts lock");
            let context = contexts
                .get_mut(&target.id)
                .ok_or_else(|| ScanError::InvalidTarget(format!("no run context for {}", target.id)))?;
            context.flagged = flagged;
        }

        // Metadata-scoped targets stop here; content is never read.
        let next_phase = if target.scope == sentra_core::ScanScope::Metadata {
            None
        } else {
            Some(ScanPhase::SmartSample)
        };

        Ok(PhaseOutcome {
            phase: ScanPhase::MetadataProfile,
            next_phase,
            diagnostics: Vec::new(),
        })
    }

    /// `SmartSample`: bounded reads from flagged items; zero-hit items are
    /// low-risk and excluded from the full scan.
    async fn phase_smart_sample(&self, target: &ScanTarget) -> Result<PhaseOutcome> {
        info!(target = %target.id, "smart sample");

        let (flagged, snapshot) = {
            let contexts = self.contexts.lock().expect("contexts lock");
            let context = contexts
                .get(&target.id)
                .ok_or_else(|| ScanError::InvalidTarget(format!("no run context for {}", target.id)))?;
            (context.flagged.clone(), Arc::clone(&context.snapshot))
        };

        let sample_rows = self.config.scanning.sample_rows;
        let (item_findings, diagnostics) = self
            .scan_items(target, &flagged, &snapshot, Some(sample_rows))
            .await?;

        let mut survivors = Vec::new();
        let mut all_findings = Vec::new();
        for (item, findings) in item_findings {
            if findings.is_empty() {
                debug!(target = %target.id, item = %item.id, "no sample hits, marked low-risk");
            } else {
                survivors.push(item);
            }
            all_findings.extend(findings);
        }

        info!(
            target = %target.id,
            sampled = flagged.len(),
            survivors = survivors.len(),
            findings = all_findings.len(),
            "smart sample calibrated"
        );

        let run_id = self.run_id(&target.id)?;
        self.persist_findings(&run_id, &target.id, &all_findings)
            .await?;
        self.note_findings(&target.id, &all_findings, &snapshot);

        {
            let mut contexts = self.contexts.lock().expect("contexts lock");
            let context = contexts
                .get_mut(&target.id)
                .ok_or_else(|| ScanError::InvalidTarget(format!("no run context for {}", target.id)))?;
            context.survivors = survivors;
        }

        Ok(PhaseOutcome {
            phase: ScanPhase::SmartSample,
            next_phase: Some(ScanPhase::FullScan),
            diagnostics,
        })
    }

    /// `FullScan`: read everything sampling didn't exclude, using the
    /// change tracker to skip unchanged units when scope allows.
    async fn phase_full_scan(&self, target: &ScanTarget) -> Result<PhaseOutcome> {
        info!(target = %target.id, "full scan");

        let (survivors, snapshot) = {
            let contexts = self.contexts.lock().expect("contexts lock");
            let context = contexts
                .get(&target.id)
                .ok_or_else(|| ScanError::InvalidTarget(format!("no run context for {}", target.id)))?;
            (context.survivors.clone(), Arc::clone(&context.snapshot))
        };

        let previous_mark = change_marks::get_mark(self.db.pool(), &target.id).await?;

        let (item_findings, diagnostics) = self
            .scan_items_incremental(target, &survivors, &snapshot, &previous_mark)
            .await?;

        let all_findings: Vec<Finding> = item_findings
            .into_iter()
            .flat_map(|(_, findings)| findings)
            .collect();

        let run_id = self.run_id(&target.id)?;
        self.persist_findings(&run_id, &target.id, &all_findings)
            .await?;
        self.note_findings(&target.id, &all_findings, &snapshot);

        Ok(PhaseOutcome {
            phase: ScanPhase::FullScan,
            next_phase: None,
            diagnostics,
        })
    }

    // ---- Item scanning ---------------------------------------------------

    /// Scan a set of items concurrently, respecting the worker limit and
    /// per-item timeout. Item failures become diagnostics, never errors.
    async fn scan_items(
        &self,
        target: &ScanTarget,
        items: &[ItemDescriptor],
        snapshot: &Arc<RuleSnapshot>,
        limit: Option<usize>,
    ) -> Result<(Vec<(ItemDescriptor, Vec<Finding>)>, Vec<String>)> {
        let mut results = Vec::new();
        let mut diagnostics = Vec::new();
        let detector = Mutex::new(DuplicateDetector::new(
            self.config.analysis.similarity_threshold,
        ));

        let timeout = Duration::from_secs(self.config.scanning.item_timeout_secs);
        let mut futures = FuturesUnordered::new();
        let mut pending = items.to_vec().into_iter();

        loop {
            // Keep the pool full up to the worker limit, unless cancelled:
            // queued items stop being admitted but in-flight ones finish.
            while futures.len() < self.config.scanning.worker_count && !self.cancel.is_cancelled() {
                match pending.next() {
                    Some(item) => {
                        let fut = async {
                            let outcome = tokio::time::timeout(
                                timeout,
                                self.process_item(target, &item, snapshot, limit, &detector),
                            )
                            .await;
                            (item, outcome)
                        };
                        futures.push(fut);
                    }
                    None => break,
                }
            }

            match futures.next().await {
                Some((item, outcome)) => match outcome {
                    Ok(Ok(findings)) => results.push((item, findings)),
                    Ok(Err(e)) if e.is_item_level() => {
                        warn!(target = %target.id, item = %item.id, error = %e, "item skipped");
                        diagnostics.push(format!("{}: {e}", item.id));
                        results.push((item, Vec::new()));
                    }
                    Ok(Err(e)) => return Err(e),
                    Err(_) => {
                        warn!(target = %target.id, item = %item.id, "item timed out");
                        diagnostics.push(format!("{}: skipped-timeout", item.id));
                        results.push((item, Vec::new()));
                    }
                },
                None => break,
            }
        }

        if self.cancel.is_cancelled() {
            return Err(self.cancelled(&target.id));
        }

        Ok((results, diagnostics))
    }

    /// Full-scan variant: consult the change tracker per item and only
    /// classify changed units; commit the advanced mark afterwards.
    async fn scan_items_incremental(
        &self,
        target: &ScanTarget,
        items: &[ItemDescriptor],
        snapshot: &Arc<RuleSnapshot>,
        previous_mark: &ChangeMark,
    ) -> Result<(Vec<(ItemDescriptor, Vec<Finding>)>, Vec<String>)> {
        use sentra_core::ScanScope;

        let incremental = target.scope != ScanScope::Full && !previous_mark.is_empty();

        let mut results = Vec::new();
        let mut diagnostics = Vec::new();
        let mut new_mark = previous_mark.clone();
        let detector = Mutex::new(DuplicateDetector::new(
            self.config.analysis.similarity_threshold,
        ));
        let timeout = Duration::from_secs(self.config.scanning.item_timeout_secs);

        for item in items {
            if self.cancel.is_cancelled() {
                return Err(self.cancelled(&target.id));
            }

            let records = match self.source.read_item(target, &item.id, None).await {
                Ok(records) => records,
                Err(e) if e.is_item_level() => {
                    warn!(target = %target.id, item = %item.id, error = %e, "item skipped");
                    diagnostics.push(format!("{}: {e}", item.id));
                    continue;
                }
                Err(e) => return Err(e),
            };

            let units: Vec<UnitState> = records
                .iter()
                .map(|r| match r.updated_at {
                    Some(ts) => UnitState::with_timestamp(r.unit_id.clone(), ts),
                    None => UnitState::with_content(r.unit_id.clone(), &r.content),
                })
                .collect();

            let change_set = diff(&units, &new_mark);
            new_mark = change_set.new_mark.clone();

            let to_scan: Vec<&SourceRecord> = if incremental {
                records
                    .iter()
                    .filter(|r| change_set.changed.contains(&r.unit_id))
                    .collect()
            } else {
                records.iter().collect()
            };

            if incremental && to_scan.is_empty() {
                debug!(target = %target.id, item = %item.id, "unchanged, skipped");
                results.push((item.clone(), Vec::new()));
                continue;
            }

            // Data changes on previously digested units are drift-worthy.
            if incremental {
                let target_id = self.parse_target_id(&target.id)?;
                let events: Vec<DriftEvent> = to_scan
                    .iter()
                    .filter(|r| previous_mark.digests.contains_key(&r.unit_id))
                    .map(|r| {
                        DriftEvent::data_change(
                            target_id.clone(),
                            &r.unit_id,
                            r.hints.field.as_deref().unwrap_or("content"),
                            None,
                            &r.text(),
                        )
                    })
                    .collect();
                if !events.is_empty() {
                    let run_id = self.run_id(&target.id)?;
                    drift_events::insert_events(self.db.pool(), Some(run_id.as_str()), &events).await?;
                }
            }

            let scan = async {
                let mut findings = Vec::new();
                for record in &to_scan {
                    findings.extend(self.classify_record(&target.id, record, snapshot, &detector));
                }
                findings
            };

            match tokio::time::timeout(timeout, scan).await {
                Ok(findings) => results.push((item.clone(), findings)),
                Err(_) => {
                    warn!(target = %target.id, item = %item.id, "item timed out");
                    diagnostics.push(format!("{}: skipped-timeout", item.id));
                }
            }
        }

        // The mark advances only now, with the phase known good. A failure
        // above leaves the previous mark untouched.
        {
            let mut contexts = self.contexts.lock().expect("contexts lock");
            if let Some(context) = contexts.get_mut(&target.id) {
                context.pending_mark = Some(new_mark);
            }
        }

        Ok((results, diagnostics))
    }

    /// Read and classify one item within the sample/worker pool.
    async fn process_item(
        &self,
        target: &ScanTarget,
        item: &ItemDescriptor,
        snapshot: &Arc<RuleSnapshot>,
        limit: Option<usize>,
        detector: &Mutex<DuplicateDetector>,
    ) -> Result<Vec<Finding>> {
        let records = self.source.read_item(target, &item.id, limit).await?;

        let mut findings = Vec::new();
        for record in &records {
            findings.extend(self.classify_record(&target.id, record, snapshot, detector));
        }
        Ok(findings)
    }

    /// Classify one record: entropy gate, duplicate gate, then the scoring
    /// engine. Category tags observed along the way accrue on the run.
    fn classify_record(
        &self,
        target_id: &str,
        record: &SourceRecord,
        snapshot: &Arc<RuleSnapshot>,
        detector: &Mutex<DuplicateDetector>,
    ) -> Vec<Finding> {
        // Classification on ciphertext is meaningless; record its presence
        // and move on.
        if is_likely_encrypted(&record.content, self.config.analysis.entropy_threshold) {
            debug!(unit = %record.unit_id, "likely-encrypted content");
            return vec![Finding {
                entity_type: EntityType::new(ENCRYPTED_ENTITY)
                    .expect("encrypted entity label is valid"),
                masked_sample: "****".to_string(),
                final_score: 1.0,
                sensitivity: Sensitivity::General,
                location: record.location.clone(),
            }];
        }

        let text = record.text();

        // Near-duplicates are reported once, on their canonical copy; the
        // cross-reference lands in the run diagnostics.
        {
            let mut detector = detector.lock().expect("duplicate detector lock");
            if let Some(canonical) = detector.check(&record.unit_id, &text) {
                debug!(
                    unit = %record.unit_id,
                    duplicate_of = %canonical,
                    "near-duplicate content skipped"
                );
                self.note_diagnostic(
                    target_id,
                    format!("{}: near-duplicate of {canonical}", record.unit_id),
                );
                return Vec::new();
            }
        }

        self.note_categories(target_id, &text);

        self.engine
            .analyze(&text, &record.hints, snapshot, &record.location)
    }

    // ---- Run finalization ------------------------------------------------

    /// Finalize a run after its last phase: commit the change mark, close
    /// the run row, apply tags, and schedule the next invocation.
    ///
    /// Called by `run_target` and by queue workers when a phase reports no
    /// successor.
    pub async fn finalize_run(&self, target_id: &str) -> Result<RunSummary> {
        let context = self
            .contexts
            .lock()
            .expect("contexts lock")
            .remove(target_id)
            .ok_or_else(|| ScanError::InvalidTarget(format!("no run context for {target_id}")))?;

        // Commit the advanced change mark now that every phase succeeded.
        if let Some(mark) = &context.pending_mark {
            change_marks::commit_mark(self.db.pool(), target_id, mark).await?;
        }

        scan_runs::update_phase(self.db.pool(), &context.run_id, ScanPhase::Done).await?;

        let status = if context.diagnostics.is_empty() {
            RunStatus::Completed
        } else {
            RunStatus::CompletedWithSkips
        };
        scan_runs::complete_run(
            self.db.pool(),
            &context.run_id,
            status,
            &context.diagnostics,
        )
        .await?;

        // Auto-tagging: category tags plus the sensitive markers.
        let mut tags = context.category_tags.clone();
        if context.found_specific {
            tags.extend(SENSITIVE_TAGS.iter().map(ToString::to_string));
        }
        if !tags.is_empty() {
            targets::add_tags(self.db.pool(), target_id, &tags).await?;
        }

        let target = targets::get_target(self.db.pool(), target_id).await?;
        let next_run = sentra_scheduler::next_run_timestamp(target.interval_days);
        if context.pending_mark.is_some() {
            targets::touch_data_scan(self.db.pool(), target_id, &next_run).await?;
        } else {
            // Metadata-only runs never read data; only the schedule moves.
            targets::set_next_run(self.db.pool(), target_id, &next_run).await?;
        }

        let details = format!("status={status}");
        audit::record(
            self.db.pool(),
            "run_completed",
            Some(target_id),
            Some(context.run_id.as_str()),
            Some(details.as_str()),
        )
        .await?;

        info!(target = target_id, run = %context.run_id, %status, "run finished");

        Ok(RunSummary {
            run_id: context.run_id,
            status,
            diagnostics: context.diagnostics,
        })
    }

    /// Abort a run on a phase-level error.
    ///
    /// The change mark is left untouched; the run row records the failure.
    /// When the error predates the run row (dependency check), it is
    /// surfaced unchanged.
    pub async fn abort_run(&self, target_id: &str, error: ScanError) -> Result<RunSummary> {
        let context = self
            .contexts
            .lock()
            .expect("contexts lock")
            .remove(target_id);

        let status = if matches!(error, ScanError::Cancelled { .. }) {
            RunStatus::Cancelled
        } else {
            RunStatus::Failed
        };

        let Some(context) = context else {
            // Failed before a run row existed (dependency check): the scope
            // is untouched, surface the error as-is.
            return Err(error);
        };

        if status == RunStatus::Cancelled {
            scan_runs::complete_run(
                self.db.pool(),
                &context.run_id,
                RunStatus::Cancelled,
                &context.diagnostics,
            )
            .await?;
        } else {
            scan_runs::fail_run(self.db.pool(), &context.run_id, &error.to_string()).await?;
        }
        let details = error.to_string();
        audit::record(
            self.db.pool(),
            "run_failed",
            Some(target_id),
            Some(context.run_id.as_str()),
            Some(details.as_str()),
        )
        .await?;

        warn!(target = target_id, run = %context.run_id, error = %error, "run failed");

        Ok(RunSummary {
            run_id: context.run_id,
            status,
            diagnostics: context.diagnostics,
        })
    }

    // ---- Helpers ---------------------------------------------------------

    /// Persist one phase's aggregated results.
    async fn persist_findings(
        &self,
        run_id: &str,
        target_id: &str,
        findings: &[Finding],
    ) -> Result<()> {
        if findings.is_empty() {
            return Ok(());
        }

        let records: Vec<_> = aggregate(findings)
            .into_iter()
            .map(crate::aggregate::AggregatedResult::into_record)
            .collect();
        scan_results::insert_results(self.db.pool(), run_id, target_id, &records).await?;
        Ok(())
    }

    /// Track sensitivity and category tags from a phase's findings.
    fn note_findings(&self, target_id: &str, findings: &[Finding], snapshot: &Arc<RuleSnapshot>) {
        let found_specific = findings.iter().any(|f| {
            f.sensitivity == Sensitivity::Specific
                || snapshot.sensitivity_for(&f.entity_type) == Sensitivity::Specific
        });

        if found_specific {
            let mut contexts = self.contexts.lock().expect("contexts lock");
            if let Some(context) = contexts.get_mut(target_id) {
                context.found_specific = true;
            }
        }
    }

    /// Record category tags derived from scanned text; the tags land on
    /// the target when the run completes.
    fn note_categories(&self, target_id: &str, text: &str) {
        let tags = sentra_engine::document_categories(text);
        if tags.is_empty() {
            return;
        }
        let mut contexts = self.contexts.lock().expect("contexts lock");
        if let Some(context) = contexts.get_mut(target_id) {
            for tag in tags {
                if !context.category_tags.contains(&tag) {
                    context.category_tags.push(tag);
                }
            }
        }
    }

    /// Rebuild run context for a resumed run: recompile rules and re-derive
    /// flagged items from metadata (no content reads).
    async fn restore_context(&self, target_id: &str, run_id: String) -> Result<()> {
        let records = self.rule_store.load_active_rules().await?;
        let (snapshot, _) = compile_records(records);

        let target = targets::get_target(self.db.pool(), target_id).await?;
        let items = self.source.list_items(&target).await?;
        let flagged: Vec<ItemDescriptor> =
            items.into_iter().filter(heuristics::is_flagged).collect();

        let context = RunContext {
            run_id,
            snapshot: Arc::new(snapshot),
            // Conservative resume: without sample results in hand, every
            // flagged item survives into the full scan.
            survivors: flagged.clone(),
            flagged,
            diagnostics: Vec::new(),
            pending_mark: None,
            found_specific: false,
            category_tags: Vec::new(),
        };
        self.contexts
            .lock()
            .expect("contexts lock")
            .insert(target_id.to_string(), context);

        Ok(())
    }

    fn run_id(&self, target_id: &str) -> Result<String> {
        self.contexts
            .lock()
            .expect("contexts lock")
            .get(target_id)
            .map(|c| c.run_id.clone())
            .ok_or_else(|| ScanError::InvalidTarget(format!("no run context for {target_id}")))
    }

    fn append_diagnostics(&self, target_id: &str, diagnostics: &[String]) {
        if diagnostics.is_empty() {
            return;
        }
        let mut contexts = self.contexts.lock().expect("contexts lock");
        if let Some(context) = contexts.get_mut(target_id) {
            context.diagnostics.extend_from_slice(diagnostics);
        }
    }

    fn note_diagnostic(&self, target_id: &str, diagnostic: String) {
        let mut contexts = self.contexts.lock().expect("contexts lock");
        if let Some(context) = contexts.get_mut(target_id) {
            if !context.diagnostics.contains(&diagnostic) {
                context.diagnostics.push(diagnostic);
            }
        }
    }

    fn parse_target_id(&self, target_id: &str) -> Result<TargetId> {
        TargetId::new(target_id).map_err(|e| ScanError::InvalidTarget(e.to_string()))
    }

    fn cancelled(&self, target_id: &str) -> ScanError {
        ScanError::Cancelled {
            target_id: TargetId::new(target_id)
                .unwrap_or_else(|_| TargetId::new("invalid-target").expect("fallback id valid")),
        }
    }
}
