//! Task Models
//!
//! Data structures for the task pipeline: individual tasks, fan-out group
//! info, the deduplicating task list, and the statistics rollup.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::provider::ProviderKind;

/// Current task schema version
pub const TASK_SCHEMA_VERSION: u32 = 1;

/// Kind of work a task represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Send a prompt and capture the response
    #[default]
    Job,
    /// Summarize an already-written source column
    Report,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::Job => write!(f, "job"),
            TaskKind::Report => write!(f, "report"),
        }
    }
}

/// Fan-out group membership
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    /// Fan-out identifier shared by all children
    pub group_id: String,
    /// Declared fan-out size
    pub size: usize,
    /// Ordered provider list, one per child
    pub providers: Vec<ProviderKind>,
    /// Destination column per provider, same order and length
    pub columns: Vec<String>,
}

/// One unit of work targeting a single (column, row) destination cell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier
    pub id: String,
    /// Destination column letter
    pub column: String,
    /// Destination row (1-based)
    pub row: u32,
    /// Provider the job is dispatched to
    pub provider: ProviderKind,
    /// Kind of work
    #[serde(default)]
    pub kind: TaskKind,
    /// Prompt text (jobs)
    #[serde(default)]
    pub prompt: String,
    /// Source column to summarize (reports)
    #[serde(default)]
    pub source_column: Option<String>,
    /// Optional model selector passed to the provider
    #[serde(default)]
    pub model: Option<String>,
    /// Reason this task is skipped; mutually exclusive with executability
    #[serde(default)]
    pub skip_reason: Option<String>,
    /// Multi-provider fan-out info, present on the parent before expansion
    #[serde(default)]
    pub group: Option<GroupInfo>,
    /// Tag linking an expanded child back to its parent task
    #[serde(default)]
    pub original_group_tag: Option<String>,
    /// Columns whose cells receive the per-provider result log
    #[serde(default)]
    pub log_columns: Vec<String>,
    /// Free-form metadata
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Creation timestamp (RFC3339)
    pub created_at: String,
    /// Schema version this task was created with
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
}

fn default_schema_version() -> u32 {
    TASK_SCHEMA_VERSION
}

impl Task {
    /// Create a job task targeting one destination cell
    pub fn new_job(
        column: impl Into<String>,
        row: u32,
        provider: ProviderKind,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            column: column.into(),
            row,
            provider,
            kind: TaskKind::Job,
            prompt: prompt.into(),
            source_column: None,
            model: None,
            skip_reason: None,
            group: None,
            original_group_tag: None,
            log_columns: Vec::new(),
            metadata: HashMap::new(),
            created_at: chrono::Utc::now().to_rfc3339(),
            schema_version: TASK_SCHEMA_VERSION,
        }
    }

    /// Create a report task reading from a source column
    pub fn new_report(
        column: impl Into<String>,
        row: u32,
        provider: ProviderKind,
        source_column: impl Into<String>,
    ) -> Self {
        let mut task = Self::new_job(column, row, provider, "");
        task.kind = TaskKind::Report;
        task.source_column = Some(source_column.into());
        task
    }

    /// Set the model selector
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Mark the task skipped
    pub fn with_skip_reason(mut self, reason: impl Into<String>) -> Self {
        self.skip_reason = Some(reason.into());
        self
    }

    /// Attach fan-out group info
    pub fn with_group(mut self, group: GroupInfo) -> Self {
        self.group = Some(group);
        self
    }

    /// Set the log columns
    pub fn with_log_columns(mut self, columns: Vec<String>) -> Self {
        self.log_columns = columns;
        self
    }

    /// Whether this task can be dispatched.
    ///
    /// A task is executable iff it has no skip reason and its kind-specific
    /// input is present: a non-blank prompt for jobs, a source column for
    /// reports.
    pub fn is_executable(&self) -> bool {
        if self.skip_reason.is_some() {
            return false;
        }
        match self.kind {
            TaskKind::Job => !self.prompt.trim().is_empty(),
            TaskKind::Report => self.source_column.is_some(),
        }
    }

    /// Skip-reason bucket used by the statistics rollup.
    ///
    /// Tasks without an explicit reason that still fail the executability
    /// rule are bucketed under "missing input".
    pub fn skip_bucket(&self) -> Option<String> {
        if self.is_executable() {
            return None;
        }
        Some(
            self.skip_reason
                .clone()
                .unwrap_or_else(|| "missing input".to_string()),
        )
    }

    /// Destination cell in letter+row form, e.g. "F20"
    pub fn destination(&self) -> String {
        format!("{}{}", self.column, self.row)
    }

    /// Prompt preview truncated for attempt history and logs
    pub fn prompt_preview(&self) -> String {
        const PREVIEW_LEN: usize = 120;
        if self.prompt.chars().count() <= PREVIEW_LEN {
            self.prompt.clone()
        } else {
            let head: String = self.prompt.chars().take(PREVIEW_LEN).collect();
            format!("{}…", head)
        }
    }
}

/// Counts partitioned by executability, skip reason, and provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskStatistics {
    /// Total number of tasks
    pub total: usize,
    /// Tasks passing the executability rule
    pub executable: usize,
    /// Skipped tasks bucketed by reason
    pub skipped_by_reason: HashMap<String, usize>,
    /// Task counts per provider
    pub by_provider: HashMap<ProviderKind, usize>,
}

impl TaskStatistics {
    /// Total skipped tasks across all reasons
    pub fn skipped(&self) -> usize {
        self.skipped_by_reason.values().sum()
    }
}

/// Ordered task collection with (column, row) deduplication
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskList {
    tasks: Vec<Task>,
    /// Columns in use per provider, in insertion order
    provider_columns: HashMap<ProviderKind, Vec<String>>,
}

impl TaskList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task unless its (column, row) destination is already taken.
    ///
    /// Returns false and leaves the list untouched on collision.
    pub fn add(&mut self, task: Task) -> bool {
        let collision = self
            .tasks
            .iter()
            .any(|t| t.column == task.column && t.row == task.row);
        if collision {
            return false;
        }

        let columns = self.provider_columns.entry(task.provider).or_default();
        if !columns.contains(&task.column) {
            columns.push(task.column.clone());
        }

        self.tasks.push(task);
        true
    }

    /// Number of tasks
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// All tasks in insertion order
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Consume the list, yielding the tasks
    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks
    }

    /// Tasks targeting the given provider
    pub fn by_provider(&self, provider: ProviderKind) -> Vec<&Task> {
        self.tasks.iter().filter(|t| t.provider == provider).collect()
    }

    /// Tasks targeting the given destination column
    pub fn by_column(&self, column: &str) -> Vec<&Task> {
        self.tasks.iter().filter(|t| t.column == column).collect()
    }

    /// Columns in use for the given provider
    pub fn columns_for(&self, provider: ProviderKind) -> &[String] {
        self.provider_columns
            .get(&provider)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Compute the statistics rollup.
    ///
    /// Every task lands in exactly one of executable/skipped.
    pub fn statistics(&self) -> TaskStatistics {
        let mut stats = TaskStatistics {
            total: self.tasks.len(),
            ..Default::default()
        };

        for task in &self.tasks {
            *stats.by_provider.entry(task.provider).or_insert(0) += 1;
            match task.skip_bucket() {
                None => stats.executable += 1,
                Some(reason) => {
                    *stats.skipped_by_reason.entry(reason).or_insert(0) += 1;
                }
            }
        }

        stats
    }
}
