use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use clubhouse_domain::DomainResult;
use clubhouse_domain::grade_sync::{GradeChangeEvent, GradeChangeQueue};
use clubhouse_domain::members::Grade;
use clubhouse_domain::ports::achievements::ReconciliationStore;
use clubhouse_domain::reconciliation::{AchievementReconciler, AuditSummary, ReconcileOutcome};
use clubhouse_domain::sync_options::SyncOptions;
use thiserror::Error;
use tokio::sync::{Semaphore, watch};
use tokio::task::{JoinError, JoinHandle, JoinSet};

use crate::observability;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    Created,
    Starting,
    Running,
    Stopping,
    Stopped,
}

#[derive(Debug, Error)]
pub enum SyncWorkerError {
    #[error("worker cannot start from state {0:?}")]
    InvalidState(WorkerState),
    #[error("sync task failed: {0}")]
    Join(#[from] JoinError),
}

#[derive(Debug, Default)]
struct SyncStats {
    cycles: AtomicU64,
    reconciled: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    assignments_inserted: AtomicU64,
    audit_enqueued: AtomicU64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncStatsSnapshot {
    pub cycles: u64,
    pub reconciled: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub assignments_inserted: u64,
    pub audit_enqueued: u64,
}

impl SyncStats {
    fn snapshot(&self) -> SyncStatsSnapshot {
        SyncStatsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            reconciled: self.reconciled.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            assignments_inserted: self.assignments_inserted.load(Ordering::Relaxed),
            audit_enqueued: self.audit_enqueued.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub drained: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub inserted: usize,
    pub elapsed: Duration,
}

#[derive(Clone)]
pub struct AchievementSyncHandle {
    queue: Arc<GradeChangeQueue>,
}

impl AchievementSyncHandle {
    /// Returns whether a new sync was queued. `false` means a sync for the
    /// member is already pending, the new grade is absent, or the id is blank.
    pub fn enqueue_grade_change(
        &self,
        member_id: &str,
        old_grade: Option<Grade>,
        new_grade: Option<Grade>,
    ) -> bool {
        if new_grade.is_none() {
            tracing::debug!(member_id, "grade cleared, no achievement sync needed");
            return false;
        }
        let event = match GradeChangeEvent::new(member_id, old_grade, new_grade) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(error = %err, "rejected grade change");
                return false;
            }
        };
        let accepted = self.queue.try_enqueue(event);
        if !accepted {
            tracing::debug!(member_id, "grade sync already pending");
        }
        accepted
    }

    pub fn pending(&self) -> usize {
        self.queue.count()
    }
}

enum TaskOutcome {
    Finished(DomainResult<ReconcileOutcome>),
    Cancelled,
}

struct SyncEngine {
    queue: Arc<GradeChangeQueue>,
    reconciler: AchievementReconciler,
    options: SyncOptions,
    stats: SyncStats,
}

impl SyncEngine {
    async fn run_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            interval_ms = self.options.processing_interval.as_millis() as u64,
            max_batch_size = self.options.max_batch_size,
            max_concurrency = self.options.max_concurrency,
            "achievement sync loop started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                _ = tokio::time::sleep(self.options.processing_interval) => {}
            }
            self.run_cycle(&shutdown).await;
        }

        tracing::info!("achievement sync loop stopped");
    }

    async fn run_cycle(&self, shutdown: &watch::Receiver<bool>) -> CycleSummary {
        let pending = self.queue.count();
        observability::set_queue_pending(pending);
        if pending == 0 {
            return CycleSummary::default();
        }

        let started = Instant::now();
        let batch = self.queue.dequeue_all(self.options.max_batch_size);
        let mut summary = CycleSummary {
            drained: batch.len(),
            ..CycleSummary::default()
        };
        tracing::info!(pending, drained = summary.drained, "grade sync cycle started");

        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrency));
        let mut tasks = JoinSet::new();
        let mut gate = shutdown.clone();
        let mut events = batch.into_iter();

        while let Some(event) = events.next() {
            let permit = tokio::select! {
                biased;
                _ = shutdown_requested(&mut gate) => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                let skipped = 1 + events.len();
                tracing::warn!(
                    skipped,
                    "shutdown requested, leaving remaining grade changes to the next audit"
                );
                summary.cancelled += skipped;
                break;
            };

            let reconciler = self.reconciler.clone();
            let mut cancel = shutdown.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let task_started = Instant::now();
                let outcome = tokio::select! {
                    biased;
                    _ = shutdown_requested(&mut cancel) => TaskOutcome::Cancelled,
                    result = reconciler.reconcile_member(event.member_id()) => TaskOutcome::Finished(result),
                };
                (event, outcome, task_started.elapsed())
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((event, TaskOutcome::Finished(Ok(outcome)), elapsed)) => {
                    summary.succeeded += 1;
                    summary.inserted += outcome.inserted();
                    observability::register_reconciliation("succeeded", millis(elapsed));
                    observability::register_assignments_inserted(outcome.inserted());
                    tracing::debug!(
                        member_id = event.member_id(),
                        old_grade = ?event.old_grade(),
                        new_grade = ?event.new_grade(),
                        outcome = ?outcome,
                        "grade sync reconciled"
                    );
                }
                Ok((event, TaskOutcome::Finished(Err(err)), elapsed)) => {
                    summary.failed += 1;
                    observability::register_reconciliation("failed", millis(elapsed));
                    tracing::error!(
                        member_id = event.member_id(),
                        old_grade = ?event.old_grade(),
                        new_grade = ?event.new_grade(),
                        error = %err,
                        "grade sync failed for member"
                    );
                }
                Ok((event, TaskOutcome::Cancelled, elapsed)) => {
                    summary.cancelled += 1;
                    observability::register_reconciliation("cancelled", millis(elapsed));
                    tracing::warn!(member_id = event.member_id(), "grade sync cancelled");
                }
                Err(err) => {
                    summary.failed += 1;
                    observability::register_reconciliation("failed", 0.0);
                    tracing::error!(error = %err, "grade sync task aborted");
                }
            }
        }

        summary.elapsed = started.elapsed();
        self.record(&summary);
        tracing::info!(
            drained = summary.drained,
            succeeded = summary.succeeded,
            failed = summary.failed,
            cancelled = summary.cancelled,
            inserted = summary.inserted,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            remaining = self.queue.count(),
            "grade sync cycle completed"
        );
        summary
    }

    fn record(&self, summary: &CycleSummary) {
        self.stats.cycles.fetch_add(1, Ordering::Relaxed);
        self.stats
            .reconciled
            .fetch_add(summary.succeeded as u64, Ordering::Relaxed);
        self.stats
            .failed
            .fetch_add(summary.failed as u64, Ordering::Relaxed);
        self.stats
            .cancelled
            .fetch_add(summary.cancelled as u64, Ordering::Relaxed);
        self.stats
            .assignments_inserted
            .fetch_add(summary.inserted as u64, Ordering::Relaxed);
        observability::register_cycle();
    }

    async fn run_audit(self: Arc<Self>) -> Option<AuditSummary> {
        let started = Instant::now();
        match self.reconciler.audit(&self.queue).await {
            Ok(summary) => {
                self.stats
                    .audit_enqueued
                    .fetch_add(summary.enqueued as u64, Ordering::Relaxed);
                observability::register_audit(summary.enqueued);
                tracing::info!(
                    scanned = summary.scanned,
                    drifted = summary.drifted,
                    enqueued = summary.enqueued,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "achievement audit completed"
                );
                Some(summary)
            }
            Err(err) => {
                observability::register_audit_failure();
                tracing::error!(error = %err, "achievement audit aborted");
                None
            }
        }
    }
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1_000.0
}

pub struct AchievementSyncWorker {
    engine: Arc<SyncEngine>,
    state: WorkerState,
    shutdown_tx: watch::Sender<bool>,
    loop_task: Option<JoinHandle<()>>,
    audit_task: Option<JoinHandle<Option<AuditSummary>>>,
}

impl AchievementSyncWorker {
    pub fn new(store: Arc<dyn ReconciliationStore>, options: SyncOptions) -> Self {
        Self::with_queue(store, options, Arc::new(GradeChangeQueue::new()))
    }

    pub fn with_queue(
        store: Arc<dyn ReconciliationStore>,
        options: SyncOptions,
        queue: Arc<GradeChangeQueue>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            engine: Arc::new(SyncEngine {
                queue,
                reconciler: AchievementReconciler::new(store),
                options,
                stats: SyncStats::default(),
            }),
            state: WorkerState::Created,
            shutdown_tx,
            loop_task: None,
            audit_task: None,
        }
    }

    pub fn handle(&self) -> AchievementSyncHandle {
        AchievementSyncHandle {
            queue: self.engine.queue.clone(),
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn options(&self) -> &SyncOptions {
        &self.engine.options
    }

    pub fn stats(&self) -> SyncStatsSnapshot {
        self.engine.stats.snapshot()
    }

    pub fn start(&mut self) -> Result<(), SyncWorkerError> {
        if self.state != WorkerState::Created {
            return Err(SyncWorkerError::InvalidState(self.state));
        }
        self.state = WorkerState::Starting;

        if self.engine.options.run_audit_on_startup {
            self.audit_task = Some(tokio::spawn(self.engine.clone().run_audit()));
        } else {
            tracing::info!("startup achievement audit disabled");
        }

        let shutdown = self.shutdown_tx.subscribe();
        self.loop_task = Some(tokio::spawn(self.engine.clone().run_loop(shutdown)));
        self.state = WorkerState::Running;
        Ok(())
    }

    pub async fn run_cycle(&self) -> CycleSummary {
        let shutdown = self.shutdown_tx.subscribe();
        self.engine.run_cycle(&shutdown).await
    }

    pub async fn wait_for_audit(&mut self) -> Result<Option<AuditSummary>, SyncWorkerError> {
        match self.audit_task.take() {
            Some(task) => Ok(task.await?),
            None => Ok(None),
        }
    }

    /// Cancels the wait and in-flight reconciliations, then waits for the
    /// current cycle's tasks to finish. A running audit is left detached.
    pub async fn stop(&mut self) -> Result<SyncStatsSnapshot, SyncWorkerError> {
        match self.state {
            WorkerState::Created => {
                self.state = WorkerState::Stopped;
                return Ok(self.stats());
            }
            WorkerState::Stopping | WorkerState::Stopped => return Ok(self.stats()),
            WorkerState::Starting | WorkerState::Running => {}
        }

        self.state = WorkerState::Stopping;
        self.shutdown_tx.send_replace(true);
        let joined = match self.loop_task.take() {
            Some(task) => task.await,
            None => Ok(()),
        };
        self.state = WorkerState::Stopped;

        let stats = self.stats();
        tracing::info!(
            cycles = stats.cycles,
            reconciled = stats.reconciled,
            failed = stats.failed,
            cancelled = stats.cancelled,
            assignments_inserted = stats.assignments_inserted,
            audit_enqueued = stats.audit_enqueued,
            pending = self.engine.queue.count(),
            "achievement sync worker stopped"
        );
        joined?;
        Ok(stats)
    }
}

impl Drop for AchievementSyncWorker {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
    }
}
