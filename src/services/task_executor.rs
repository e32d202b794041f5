//! Task Executor
//!
//! Runs one task to a terminal outcome: dispatch to a fresh execution
//! context, await the completion detector, and on retryable failure back
//! off, escalate to a brand-new context, and try again. Attempts for one
//! task are strictly sequential; all retryable errors are absorbed here and
//! only the structured terminal result crosses the boundary.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::outcome::{AttemptRecord, RetryState, TaskFailure, TaskRunResult};
use crate::models::provider::ProviderRegistry;
use crate::models::settings::{DetectorSettings, RetrySettings};
use crate::models::task::Task;
use crate::services::context::{ContextProvider, ContextRequest};
use crate::services::detector::CompletionDetector;

/// States of the per-task execution machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    /// Not yet started
    Idle,
    /// Acquiring a context and sending the prompt
    Dispatching,
    /// Polling the completion detector
    Awaiting,
    /// Backing off before the next attempt
    RetryPending,
    /// Discarding the failed context before re-dispatch
    Escalating,
    /// Terminal success
    Success,
    /// Terminal failure, retries consumed
    Exhausted,
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionState::Idle => write!(f, "idle"),
            ExecutionState::Dispatching => write!(f, "dispatching"),
            ExecutionState::Awaiting => write!(f, "awaiting"),
            ExecutionState::RetryPending => write!(f, "retry_pending"),
            ExecutionState::Escalating => write!(f, "escalating"),
            ExecutionState::Success => write!(f, "success"),
            ExecutionState::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Executes tasks against execution contexts with retry and escalation
pub struct TaskExecutor {
    contexts: Arc<dyn ContextProvider>,
    registry: ProviderRegistry,
    retry: RetrySettings,
    detector: DetectorSettings,
}

impl TaskExecutor {
    /// Create an executor over the given context provider
    pub fn new(
        contexts: Arc<dyn ContextProvider>,
        registry: ProviderRegistry,
        retry: RetrySettings,
        detector: DetectorSettings,
    ) -> Self {
        Self {
            contexts,
            registry,
            retry,
            detector,
        }
    }

    /// Backoff delay before the next attempt; scales linearly with the
    /// attempt number
    fn backoff_delay(&self, next_attempt: u32) -> Duration {
        Duration::from_millis(self.retry.backoff_base_ms * u64::from(next_attempt))
    }

    /// Run one task to a terminal outcome.
    ///
    /// `slot` is the positional execution slot assigned by the scheduler.
    pub async fn run(
        &self,
        task: &Task,
        slot: Option<usize>,
        cancel: &CancellationToken,
    ) -> TaskRunResult {
        if let Err(message) = validate(task) {
            return TaskRunResult::failure(TaskFailure::Validation { message }, 0, Vec::new());
        }

        let mut state = RetryState::new();
        let mut machine = ExecutionState::Idle;
        let max_attempts = self.retry.max_retries + 1;

        loop {
            let attempt = state.attempt;
            if cancel.is_cancelled() {
                state.finish();
                return TaskRunResult::failure(
                    TaskFailure::Cancelled,
                    attempt.saturating_sub(1),
                    state.history,
                );
            }

            machine = transition(task, machine, ExecutionState::Dispatching);
            let attempt_start = Instant::now();
            let started_at = chrono::Utc::now().to_rfc3339();

            let outcome = self.run_attempt(task, slot, &mut machine, cancel).await;

            let failure = outcome.as_ref().err().cloned();
            state.record(AttemptRecord {
                attempt,
                provider: task.provider,
                prompt_preview: task.prompt_preview(),
                started_at,
                duration_ms: attempt_start.elapsed().as_millis() as u64,
                failure: failure.clone(),
            });

            match outcome {
                Ok(response) => {
                    transition(task, machine, ExecutionState::Success);
                    info!(task_id = %task.id, retries = attempt, "task succeeded");
                    state.finish();
                    return TaskRunResult::success(response, attempt, state.history);
                }
                Err(failure) if !failure.is_retryable() => {
                    transition(task, machine, ExecutionState::Exhausted);
                    state.finish();
                    return TaskRunResult::failure(failure, attempt, state.history);
                }
                Err(failure) => {
                    warn!(
                        task_id = %task.id,
                        attempt,
                        error = %failure,
                        "attempt failed"
                    );

                    if state.attempt >= max_attempts {
                        transition(task, machine, ExecutionState::Exhausted);
                        state.finish();
                        return TaskRunResult::failure(
                            TaskFailure::MaxRetriesExceeded {
                                attempts: state.attempt,
                            },
                            state.attempt - 1,
                            state.history,
                        );
                    }

                    machine = transition(task, machine, ExecutionState::RetryPending);
                    let delay = self.backoff_delay(state.attempt);
                    debug!(task_id = %task.id, "backing off {:?}", delay);
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            state.finish();
                            return TaskRunResult::failure(
                                TaskFailure::Cancelled,
                                state.attempt - 1,
                                state.history,
                            );
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }

                    // The failed context was already disposed; the next
                    // dispatch acquires a brand-new one.
                    machine = transition(task, machine, ExecutionState::Escalating);
                }
            }
        }
    }

    /// One dispatch-and-await cycle against a fresh context.
    ///
    /// Unexpected engine errors (context acquisition, protocol failures)
    /// are folded into retryable provider-internal failures so they consume
    /// a retry slot instead of crashing the run.
    async fn run_attempt(
        &self,
        task: &Task,
        slot: Option<usize>,
        machine: &mut ExecutionState,
        cancel: &CancellationToken,
    ) -> Result<String, TaskFailure> {
        let mut handle = self
            .contexts
            .acquire(task.provider, slot)
            .await
            .map_err(|e| TaskFailure::ProviderInternal {
                message: format!("context acquisition failed: {}", e),
            })?;

        let request = ContextRequest::send_prompt(&task.id, &task.prompt, task.model.as_deref());
        let dispatch = handle.context.send(request).await;

        let result = match dispatch {
            Err(e) => Err(TaskFailure::ProviderInternal {
                message: format!("dispatch failed: {}", e),
            }),
            Ok(ack) if !ack.success => Err(TaskFailure::ProviderInternal {
                message: ack
                    .error
                    .unwrap_or_else(|| "dispatch rejected".to_string()),
            }),
            Ok(_) => {
                *machine = transition(task, *machine, ExecutionState::Awaiting);

                let profile = self.registry.profile(task.provider).clone();
                let deadline = profile.timeouts.wait_for_model(task.model.as_deref());
                let detector = CompletionDetector::new(self.detector, profile);

                detector
                    .watch(
                        handle.probe.as_mut(),
                        &mut handle.notifications,
                        deadline,
                        cancel,
                    )
                    .await
                    .map(|detection| detection.response)
            }
        };

        // Contexts are disposable; failed ones are never reused
        handle.context.dispose().await;
        result
    }
}

/// Log and apply a state transition
fn transition(task: &Task, from: ExecutionState, to: ExecutionState) -> ExecutionState {
    debug!(task_id = %task.id, "state {} -> {}", from, to);
    to
}

/// Executability check mirrored as the dispatch-time validation gate
fn validate(task: &Task) -> Result<(), String> {
    if let Some(reason) = &task.skip_reason {
        return Err(format!("task is skipped: {}", reason));
    }
    if task.is_executable() {
        Ok(())
    } else {
        Err(match task.kind {
            crate::models::task::TaskKind::Job => "prompt is empty".to_string(),
            crate::models::task::TaskKind::Report => "source column is not set".to_string(),
        })
    }
}
