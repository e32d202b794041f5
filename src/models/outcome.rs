//! Outcome Models
//!
//! Task-level failure taxonomy, per-attempt records, retry state, and the
//! structured result handed back to callers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::provider::ProviderKind;

/// Ways a single task can fail
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskFailure {
    /// Malformed task; surfaced immediately, never dispatched
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// No completion signal inside the attempt deadline
    #[error("No response before the deadline")]
    TimeoutNoResponse,

    /// Diagnostic pattern matched or the response text vanished
    #[error("Provider internal error: {message}")]
    ProviderInternal { message: String },

    /// All retry slots consumed
    #[error("Max retries exceeded after {attempts} attempts")]
    MaxRetriesExceeded { attempts: u32 },

    /// Run-level stop signal observed
    #[error("Cancelled")]
    Cancelled,

    /// Fatal configuration problem, never retried
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl TaskFailure {
    /// Whether another attempt against a fresh execution context may help
    pub fn is_retryable(&self) -> bool {
        match self {
            TaskFailure::TimeoutNoResponse => true,
            TaskFailure::ProviderInternal { .. } => true,
            TaskFailure::Validation { .. } => false,
            TaskFailure::MaxRetriesExceeded { .. } => false,
            TaskFailure::Cancelled => false,
            TaskFailure::Configuration { .. } => false,
        }
    }
}

/// Record of a single attempt, kept regardless of outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Attempt number, starting at 0
    pub attempt: u32,
    /// Provider the attempt was dispatched to
    pub provider: ProviderKind,
    /// Truncated prompt for traceability
    pub prompt_preview: String,
    /// Timestamp when the attempt started (RFC3339)
    pub started_at: String,
    /// Duration of the attempt in milliseconds
    pub duration_ms: u64,
    /// Failure if the attempt did not succeed
    pub failure: Option<TaskFailure>,
}

/// Mutable per-task retry bookkeeping.
///
/// Created on first dispatch, discarded once the task reaches a terminal
/// outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryState {
    /// Attempts started so far
    pub attempt: u32,
    /// History of every attempt, in order
    pub history: Vec<AttemptRecord>,
    /// Whether the task has reached a terminal outcome
    pub terminal: bool,
}

impl RetryState {
    /// Create fresh state for a task's first dispatch
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an attempt record and bump the counter
    pub fn record(&mut self, record: AttemptRecord) {
        self.attempt = record.attempt + 1;
        self.history.push(record);
    }

    /// Mark the state terminal
    pub fn finish(&mut self) {
        self.terminal = true;
    }
}

/// Structured outcome of one task run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRunResult {
    /// Whether the task ultimately succeeded
    pub success: bool,
    /// Captured response text on success
    pub response: Option<String>,
    /// Terminal failure on failure
    pub error: Option<TaskFailure>,
    /// Human-readable failure message
    pub error_message: Option<String>,
    /// Retries consumed (attempts - 1)
    pub retry_count: u32,
    /// True when no further attempts will be made for a failed task
    pub final_error: bool,
    /// Full attempt history
    pub attempts: Vec<AttemptRecord>,
}

impl TaskRunResult {
    /// Build a success result
    pub fn success(response: String, retry_count: u32, attempts: Vec<AttemptRecord>) -> Self {
        Self {
            success: true,
            response: Some(response),
            error: None,
            error_message: None,
            retry_count,
            final_error: false,
            attempts,
        }
    }

    /// Build a terminal failure result
    pub fn failure(error: TaskFailure, retry_count: u32, attempts: Vec<AttemptRecord>) -> Self {
        let message = error.to_string();
        Self {
            success: false,
            response: None,
            error: Some(error),
            error_message: Some(message),
            retry_count,
            final_error: true,
            attempts,
        }
    }
}
