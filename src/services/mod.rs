//! Services
//!
//! The engine components: fan-out expansion, completion detection, retrying
//! task execution, idle prevention, batch scheduling, result logging, and
//! the run orchestrator tying them together.

pub mod context;
pub mod detector;
pub mod expander;
pub mod idle;
pub mod orchestrator;
pub mod result_log;
pub mod scheduler;
pub mod task_executor;

pub use context::{
    ContextHandle, ContextProvider, ContextRequest, ContextResponse, ExecutionContext, Probe,
    ResponseNotification,
};
pub use detector::{CompletionDetector, CompletionSignal, Detection};
pub use expander::{expand_one, expand_tasks};
pub use idle::{IdleCoordinator, IdleLeaseSnapshot, KeepAwake};
pub use orchestrator::{RunEvent, RunOrchestrator, RunSummary, RunTarget};
pub use result_log::{merge_into, LogBlock};
pub use scheduler::{Batch, BatchScheduler, ScheduledTask};
pub use task_executor::{ExecutionState, TaskExecutor};
