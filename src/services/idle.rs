//! Idle Prevention Coordinator
//!
//! Reference-counted coordination of the platform "stay-awake" lease. The
//! platform call is assumed idempotent at the OS level, but many concurrent
//! jobs share it, so the coordinator counts outstanding holders: the 0→1
//! transition acquires the lease and starts a heartbeat task, the 1→0
//! transition releases it and reports the total held duration.
//!
//! This is the one intentionally process-wide resource in the engine; the
//! host constructs exactly one coordinator and shares it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::utils::error::EngineResult;

/// Platform keep-awake surface
#[async_trait]
pub trait KeepAwake: Send + Sync {
    /// Request the platform keep the device awake for the given scope
    /// (e.g. "system", "display")
    async fn acquire(&self, scope: &str) -> EngineResult<()>;

    /// Release the platform request
    async fn release(&self) -> EngineResult<()>;
}

/// Observable lease state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleLeaseSnapshot {
    /// Whether the platform lease is currently held
    pub active: bool,
    /// Number of outstanding acquire calls
    pub outstanding: u32,
}

#[derive(Debug)]
struct LeaseState {
    active: bool,
    outstanding: u32,
    held_since: Option<Instant>,
    heartbeat: Option<JoinHandle<()>>,
}

/// Reference-counted coordinator over the platform keep-awake API
pub struct IdleCoordinator {
    platform: Arc<dyn KeepAwake>,
    scope: String,
    heartbeat_interval: Duration,
    state: Mutex<LeaseState>,
}

impl IdleCoordinator {
    /// Create a coordinator over the given platform surface
    pub fn new(platform: Arc<dyn KeepAwake>, scope: impl Into<String>) -> Self {
        Self {
            platform,
            scope: scope.into(),
            heartbeat_interval: Duration::from_secs(25),
            state: Mutex::new(LeaseState {
                active: false,
                outstanding: 0,
                held_since: None,
                heartbeat: None,
            }),
        }
    }

    /// Override the heartbeat cadence
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Take one lease reference for `source`.
    ///
    /// The platform call happens only on the 0→1 transition; every other
    /// call just bumps the count.
    pub async fn acquire(&self, source: &str) -> EngineResult<()> {
        let mut state = self.state.lock().await;

        if state.outstanding == 0 {
            self.platform.acquire(&self.scope).await?;
            state.active = true;
            state.held_since = Some(Instant::now());
            state.heartbeat = Some(self.spawn_heartbeat());
            info!(source, "keep-awake lease acquired");
        } else {
            debug!(source, outstanding = state.outstanding, "keep-awake lease shared");
        }

        state.outstanding += 1;
        Ok(())
    }

    /// Drop one lease reference for `source`.
    ///
    /// A release without a matching acquire is clamped to zero and logged
    /// as an anomaly rather than treated as fatal; it usually points at a
    /// double-completion bug in the caller.
    pub async fn release(&self, source: &str) -> EngineResult<()> {
        let mut state = self.state.lock().await;

        if state.outstanding == 0 {
            warn!(source, "keep-awake release without matching acquire, clamping at zero");
            if state.active {
                self.teardown(&mut state).await?;
            }
            return Ok(());
        }

        state.outstanding -= 1;
        if state.outstanding == 0 {
            self.teardown(&mut state).await?;
        } else {
            debug!(source, outstanding = state.outstanding, "keep-awake lease still held");
        }
        Ok(())
    }

    /// Unconditionally release and zero all state, for crash recovery
    pub async fn force_reset(&self) -> EngineResult<()> {
        let mut state = self.state.lock().await;
        state.outstanding = 0;
        if state.active {
            warn!("keep-awake force reset while lease active");
            self.teardown(&mut state).await?;
        }
        Ok(())
    }

    /// Current lease state, for callers and tests
    pub async fn snapshot(&self) -> IdleLeaseSnapshot {
        let state = self.state.lock().await;
        IdleLeaseSnapshot {
            active: state.active,
            outstanding: state.outstanding,
        }
    }

    async fn teardown(&self, state: &mut LeaseState) -> EngineResult<()> {
        if let Some(heartbeat) = state.heartbeat.take() {
            heartbeat.abort();
        }
        state.active = false;

        let held = state
            .held_since
            .take()
            .map(|since| since.elapsed())
            .unwrap_or_default();

        self.platform.release().await?;
        info!("keep-awake lease released after {:?}", held);
        Ok(())
    }

    /// Periodic tick that keeps the coordinating process itself alive
    /// while the lease is held
    fn spawn_heartbeat(&self) -> JoinHandle<()> {
        let interval = self.heartbeat_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick is immediate
            loop {
                ticker.tick().await;
                debug!("keep-awake heartbeat");
            }
        })
    }
}
