//! Run Orchestrator
//!
//! Drives one run end to end: fan-out expansion, batch planning, bounded
//! concurrent execution, write-back, and result logging, bracketed by the
//! idle-prevention lease. Emits progress events over a channel so a host
//! UI can follow along.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::outcome::{TaskFailure, TaskRunResult};
use crate::models::provider::ProviderRegistry;
use crate::models::settings::EngineConfig;
use crate::models::task::{Task, TaskList, TaskStatistics};
use crate::services::context::ContextProvider;
use crate::services::expander::expand_tasks;
use crate::services::idle::IdleCoordinator;
use crate::services::result_log::{merge_into, LogBlock};
use crate::services::scheduler::{BatchScheduler, ScheduledTask};
use crate::services::task_executor::TaskExecutor;
use crate::storage::cell_store::{CellRef, CellStore};
use crate::utils::error::{EngineError, EngineResult};

/// Where results are written
#[derive(Debug, Clone)]
pub struct RunTarget {
    /// Backing-store spreadsheet identifier
    pub spreadsheet_id: String,
    /// Optional sheet tab
    pub sheet: Option<String>,
}

/// Events emitted during a run
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// Run started
    Started {
        run_id: String,
        statistics: TaskStatistics,
    },
    /// Batch started
    BatchStarted {
        batch_index: usize,
        task_count: usize,
    },
    /// Task dispatched
    TaskStarted { task_id: String },
    /// Task reached terminal success
    TaskCompleted { task_id: String, retry_count: u32 },
    /// Task reached terminal failure
    TaskFailed { task_id: String, error: String },
    /// Task was not executable
    TaskSkipped { task_id: String, reason: String },
    /// Batch finished
    BatchCompleted { batch_index: usize },
    /// Progress update
    Progress {
        completed: usize,
        total: usize,
        percentage: f32,
    },
    /// Run finished
    Completed {
        succeeded: usize,
        failed: usize,
        cancelled: bool,
    },
}

/// Aggregate outcome of one run
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Run identifier
    pub run_id: String,
    /// Tasks after expansion, excluding skipped
    pub total: usize,
    /// Terminal successes
    pub succeeded: usize,
    /// Terminal failures
    pub failed: usize,
    /// Tasks skipped before dispatch
    pub skipped: usize,
    /// Whether the run was cut short by the stop signal
    pub cancelled: bool,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

/// Orchestrates a full run over the task pipeline
pub struct RunOrchestrator {
    target: RunTarget,
    executor: TaskExecutor,
    scheduler: BatchScheduler,
    store: Arc<dyn CellStore>,
    idle: Arc<IdleCoordinator>,
    cancellation_token: CancellationToken,
    /// Serializes read-merge-write cycles on shared log cells
    log_lock: Mutex<()>,
}

impl RunOrchestrator {
    /// Create an orchestrator wiring the engine to its external surfaces
    pub fn new(
        config: EngineConfig,
        target: RunTarget,
        contexts: Arc<dyn ContextProvider>,
        store: Arc<dyn CellStore>,
        idle: Arc<IdleCoordinator>,
    ) -> EngineResult<Self> {
        config
            .validate()
            .map_err(EngineError::configuration)?;
        let registry = ProviderRegistry::new(&config.provider_timeouts)?;

        Ok(Self {
            executor: TaskExecutor::new(contexts, registry, config.retry, config.detector),
            scheduler: BatchScheduler::new(config.scheduler),
            target,
            store,
            idle,
            cancellation_token: CancellationToken::new(),
            log_lock: Mutex::new(()),
        })
    }

    /// Get the cancellation token
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Signal the run to stop at the next suspension point
    pub fn cancel(&self) {
        self.cancellation_token.cancel();
    }

    /// Execute the task list to completion.
    ///
    /// Fan-out configuration errors are fatal and surface before anything
    /// is dispatched; per-task failures are absorbed into the summary.
    pub async fn execute(
        &self,
        list: TaskList,
        event_tx: mpsc::Sender<RunEvent>,
    ) -> EngineResult<RunSummary> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();
        let statistics = list.statistics();

        let expanded = expand_tasks(list.into_tasks())?;

        let mut runnable = Vec::new();
        let mut skipped = 0usize;
        for task in expanded {
            match task.skip_bucket() {
                None => runnable.push(task),
                Some(reason) => {
                    skipped += 1;
                    let _ = event_tx
                        .send(RunEvent::TaskSkipped {
                            task_id: task.id.clone(),
                            reason,
                        })
                        .await;
                }
            }
        }

        let batches = self.scheduler.plan(runnable);
        let total: usize = batches.iter().map(|b| b.entries.len()).sum();

        info!(run_id = %run_id, total, skipped, "run starting");
        let _ = event_tx
            .send(RunEvent::Started {
                run_id: run_id.clone(),
                statistics,
            })
            .await;

        self.idle.acquire(&run_id).await?;
        let (succeeded, failed) = self.run_batches(&batches, total, &event_tx).await;
        self.idle.release(&run_id).await?;

        let cancelled = self.cancellation_token.is_cancelled();
        let _ = event_tx
            .send(RunEvent::Completed {
                succeeded,
                failed,
                cancelled,
            })
            .await;

        Ok(RunSummary {
            run_id,
            total,
            succeeded,
            failed,
            skipped,
            cancelled,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Run every batch strictly in order, tasks within a batch concurrently
    async fn run_batches(
        &self,
        batches: &[crate::services::scheduler::Batch],
        total: usize,
        event_tx: &mpsc::Sender<RunEvent>,
    ) -> (usize, usize) {
        let mut succeeded = 0usize;
        let mut failed = 0usize;
        let mut completed = 0usize;

        for batch in batches {
            if self.cancellation_token.is_cancelled() {
                failed += batches[batch.index..]
                    .iter()
                    .map(|b| b.entries.len())
                    .sum::<usize>();
                break;
            }

            let _ = event_tx
                .send(RunEvent::BatchStarted {
                    batch_index: batch.index,
                    task_count: batch.entries.len(),
                })
                .await;

            let results = join_all(
                batch
                    .entries
                    .iter()
                    .map(|entry| self.run_one(entry, event_tx)),
            )
            .await;

            for success in results {
                completed += 1;
                if success {
                    succeeded += 1;
                } else {
                    failed += 1;
                }
            }

            let _ = event_tx
                .send(RunEvent::BatchCompleted {
                    batch_index: batch.index,
                })
                .await;

            let percentage = if total == 0 {
                100.0
            } else {
                (completed as f32 / total as f32) * 100.0
            };
            let _ = event_tx
                .send(RunEvent::Progress {
                    completed,
                    total,
                    percentage,
                })
                .await;

            let delay = if self.scheduler.is_sequential() {
                self.scheduler.sequential_delay()
            } else {
                self.scheduler.batch_delay()
            };
            if !delay.is_zero() && batch.index + 1 < batches.len() {
                tokio::select! {
                    _ = self.cancellation_token.cancelled() => {}
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        (succeeded, failed)
    }

    /// Execute one scheduled task and record its terminal outcome
    async fn run_one(&self, entry: &ScheduledTask, event_tx: &mpsc::Sender<RunEvent>) -> bool {
        let task = &entry.task;
        let sent_at = Utc::now();

        let _ = event_tx
            .send(RunEvent::TaskStarted {
                task_id: task.id.clone(),
            })
            .await;

        let result = self
            .executor
            .run(task, Some(entry.slot), &self.cancellation_token)
            .await;

        if result.success {
            self.write_response(task, &result).await;
        }
        self.write_log(task, &result, sent_at).await;

        if result.success {
            let _ = event_tx
                .send(RunEvent::TaskCompleted {
                    task_id: task.id.clone(),
                    retry_count: result.retry_count,
                })
                .await;
            true
        } else {
            let _ = event_tx
                .send(RunEvent::TaskFailed {
                    task_id: task.id.clone(),
                    error: result
                        .error_message
                        .clone()
                        .unwrap_or_else(|| "unknown failure".to_string()),
                })
                .await;
            false
        }
    }

    /// Write the response text to the task's destination cell.
    ///
    /// Write-back failures are logged and swallowed; they never change the
    /// task's outcome.
    async fn write_response(&self, task: &Task, result: &TaskRunResult) {
        let response = match &result.response {
            Some(r) => r,
            None => return,
        };
        let cell = match CellRef::new(task.column.clone(), task.row) {
            Ok(cell) => cell,
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "invalid destination cell");
                return;
            }
        };
        if let Err(e) = self
            .store
            .write(
                &self.target.spreadsheet_id,
                &cell,
                response,
                self.target.sheet.as_deref(),
            )
            .await
        {
            warn!(task_id = %task.id, cell = %cell, error = %e, "response write-back failed");
        }
    }

    /// Merge this task's log block into every configured log column.
    ///
    /// The read-merge-write cycle is serialized across tasks; concurrent
    /// tasks on the same row target the same log cell.
    async fn write_log(&self, task: &Task, result: &TaskRunResult, sent_fallback: DateTime<Utc>) {
        if task.log_columns.is_empty() {
            return;
        }

        let sent_at = result
            .attempts
            .first()
            .and_then(|a| DateTime::parse_from_rfc3339(&a.started_at).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or(sent_fallback);

        let block = LogBlock::new(
            task.provider.display_name(),
            task.model.clone(),
            task.destination(),
            sent_at,
            Utc::now(),
        )
        .format();

        for column in &task.log_columns {
            let cell = match CellRef::new(column.clone(), task.row) {
                Ok(cell) => cell,
                Err(e) => {
                    warn!(task_id = %task.id, error = %e, "invalid log cell");
                    continue;
                }
            };

            let _guard = self.log_lock.lock().await;
            let merged = match self
                .store
                .read(&self.target.spreadsheet_id, &cell, self.target.sheet.as_deref())
                .await
            {
                Ok(existing) => merge_into(&existing, &block, task.provider.display_name()),
                Err(e) => {
                    warn!(task_id = %task.id, cell = %cell, error = %e, "log read failed, writing fresh block");
                    block.clone()
                }
            };

            if let Err(e) = self
                .store
                .write(
                    &self.target.spreadsheet_id,
                    &cell,
                    &merged,
                    self.target.sheet.as_deref(),
                )
                .await
            {
                warn!(task_id = %task.id, cell = %cell, error = %e, "log write-back failed");
            } else {
                debug!(task_id = %task.id, cell = %cell, "log block merged");
            }
        }

        // Failures are logged too; the caller distinguishes outcomes from
        // the run events, not from the log cell.
        if !result.success {
            debug!(
                task_id = %task.id,
                error = ?result.error.as_ref().map(TaskFailure::to_string),
                "logged terminal failure"
            );
        }
    }
}
