//! Engine Settings
//!
//! Configuration surface for the orchestration engine. Every tunable has a
//! serde default so partial configuration files deserialize cleanly. The
//! config is constructed once and passed into components; nothing here is
//! process-global.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::provider::{ProviderKind, ProviderTimeouts};

/// Completion-detector thresholds
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DetectorSettings {
    /// Polling cadence in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Consecutive unchanged-length polls before `stableComplete`
    #[serde(default = "default_stable_cycles")]
    pub stable_cycles: u32,
    /// Consecutive busy-indicator-absent polls before `presenceComplete`
    #[serde(default = "default_absent_cycles")]
    pub absent_cycles: u32,
    /// Grace window before a detected diagnostic aborts the attempt, ms
    #[serde(default = "default_error_grace_ms")]
    pub error_grace_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_stable_cycles() -> u32 {
    60
}

fn default_absent_cycles() -> u32 {
    10
}

fn default_error_grace_ms() -> u64 {
    5000
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            stable_cycles: default_stable_cycles(),
            absent_cycles: default_absent_cycles(),
            error_grace_ms: default_error_grace_ms(),
        }
    }
}

/// Retry and backoff behavior
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Maximum retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff base in milliseconds; the wait scales linearly with the
    /// attempt number
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

fn default_max_retries() -> u32 {
    2
}

fn default_backoff_base_ms() -> u64 {
    2000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

/// Batch scheduling behavior
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Maximum tasks running concurrently within a batch
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Delay between batches in milliseconds
    #[serde(default)]
    pub batch_delay_ms: u64,
    /// Delay between tasks when running sequentially (max_concurrent = 1)
    #[serde(default)]
    pub sequential_delay_ms: u64,
}

fn default_max_concurrent() -> usize {
    3
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            batch_delay_ms: 0,
            sequential_delay_ms: 0,
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Detector thresholds
    #[serde(default)]
    pub detector: DetectorSettings,
    /// Retry limits and backoff
    #[serde(default)]
    pub retry: RetrySettings,
    /// Concurrency and batch delays
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    /// Per-provider timeout overrides; providers not listed keep their
    /// defaults
    #[serde(default)]
    pub provider_timeouts: HashMap<ProviderKind, ProviderTimeouts>,
}

impl EngineConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.detector.poll_interval_ms == 0 {
            return Err("poll_interval_ms must be positive".to_string());
        }
        if self.detector.stable_cycles == 0 {
            return Err("stable_cycles must be positive".to_string());
        }
        if self.detector.absent_cycles == 0 {
            return Err("absent_cycles must be positive".to_string());
        }
        if self.scheduler.max_concurrent == 0 {
            return Err("max_concurrent must be positive".to_string());
        }
        Ok(())
    }
}
