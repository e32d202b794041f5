//! Promptgrid - Task Orchestration Engine
//!
//! Drives long-running jobs against external chat providers, detecting
//! completion purely from observable signals, and records structured,
//! mergeable results into a tabular backing store. It includes:
//! - Task data model with deduplication and fan-out groups
//! - Three-signal completion detection over an abstract probe
//! - Retry with fresh-context escalation
//! - Reference-counted idle prevention
//! - Bounded-concurrency batch scheduling
//! - Idempotent per-provider result logging

pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

// Re-export the engine's primary surface
pub use models::{
    EngineConfig, ProviderKind, ProviderRegistry, Task, TaskFailure, TaskKind, TaskList,
    TaskRunResult,
};
pub use services::{
    ContextProvider, IdleCoordinator, KeepAwake, Probe, RunEvent, RunOrchestrator, RunSummary,
    RunTarget,
};
pub use storage::{CellRef, CellStore, MemoryCellStore};
pub use utils::error::{EngineError, EngineResult};
