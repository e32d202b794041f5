//! Batch Scheduler
//!
//! Splits the expanded task sequence into ordered batches of bounded size
//! and assigns each task a positional execution slot within its batch.
//! Batches execute strictly in order; tasks within a batch run
//! concurrently. Slots let the context provider tile visible windows.

use serde::{Deserialize, Serialize};

use crate::models::settings::SchedulerSettings;
use crate::models::task::Task;

/// One task with its assigned slot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledTask {
    /// The task to run
    pub task: Task,
    /// Positional slot within the batch (0..max_concurrent)
    pub slot: usize,
}

/// An ordered batch of concurrently-running tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    /// Position of this batch in the run
    pub index: usize,
    /// Tasks in this batch
    pub entries: Vec<ScheduledTask>,
}

/// Plans batches from a task sequence
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    settings: SchedulerSettings,
}

impl BatchScheduler {
    /// Create a scheduler with the given settings
    pub fn new(settings: SchedulerSettings) -> Self {
        Self { settings }
    }

    /// Whether the plan runs tasks one at a time
    pub fn is_sequential(&self) -> bool {
        self.settings.max_concurrent <= 1
    }

    /// Delay applied between tasks in sequential mode
    pub fn sequential_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.settings.sequential_delay_ms)
    }

    /// Delay applied between batches
    pub fn batch_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.settings.batch_delay_ms)
    }

    /// Split tasks into ordered batches of at most `max_concurrent`,
    /// assigning slots positionally within each batch
    pub fn plan(&self, tasks: Vec<Task>) -> Vec<Batch> {
        let bound = self.settings.max_concurrent.max(1);

        tasks
            .chunks(bound)
            .enumerate()
            .map(|(index, chunk)| Batch {
                index,
                entries: chunk
                    .iter()
                    .enumerate()
                    .map(|(slot, task)| ScheduledTask {
                        task: task.clone(),
                        slot,
                    })
                    .collect(),
            })
            .collect()
    }
}
