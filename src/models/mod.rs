//! Models
//!
//! Data structures shared across the engine: tasks, providers, settings,
//! and task outcomes.

pub mod outcome;
pub mod provider;
pub mod settings;
pub mod task;

pub use outcome::{AttemptRecord, RetryState, TaskFailure, TaskRunResult};
pub use provider::{ProviderKind, ProviderProfile, ProviderRegistry, ProviderTimeouts};
pub use settings::{DetectorSettings, EngineConfig, RetrySettings, SchedulerSettings};
pub use task::{GroupInfo, Task, TaskKind, TaskList, TaskStatistics, TASK_SCHEMA_VERSION};
