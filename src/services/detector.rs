//! Completion Detector
//!
//! Infers completion or failure of an opaque, externally-rendered job from
//! three weak proxy signals, polled on a fixed cadence:
//!
//! - diagnostic-channel text matched against the provider's pattern set
//! - stability of the visible response text length
//! - presence of a busy/stop indicator
//!
//! No provider-side completion callback exists; these monitors are the only
//! source of truth. Each monitor is a plain struct with a pure `observe`
//! method so the combination logic is testable with synthetic sequences.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::models::outcome::TaskFailure;
use crate::models::provider::ProviderProfile;
use crate::models::settings::DetectorSettings;
use crate::services::context::{Probe, ResponseNotification};

/// Terminal success signal, whichever fired first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionSignal {
    /// Response text length unchanged for the configured cycle count
    StableComplete,
    /// Busy indicator absent for the configured cycle count
    PresenceComplete,
}

/// Successful detection outcome
#[derive(Debug, Clone)]
pub struct Detection {
    /// Which signal completed the attempt
    pub signal: CompletionSignal,
    /// Accumulated response text at completion time
    pub response: String,
}

/// Signal from the stability monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilitySignal {
    /// Length unchanged for the full threshold run
    Stable,
    /// Length was > 0 and dropped to exactly 0; always fatal for the attempt
    Vanished,
}

/// Tracks the visible response text length across polls.
#[derive(Debug)]
pub struct StabilityMonitor {
    threshold: u32,
    last_len: Option<usize>,
    run_len: u32,
}

impl StabilityMonitor {
    /// Create a monitor firing after `threshold` consecutive unchanged polls
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            last_len: None,
            run_len: 0,
        }
    }

    /// Observe one poll's text length.
    ///
    /// Any length change resets the unchanged run. A run of zero-length
    /// polls never completes; an empty surface is "no response yet", not a
    /// stable answer.
    pub fn observe(&mut self, len: usize) -> Option<StabilitySignal> {
        let signal = match self.last_len {
            Some(prev) if prev > 0 && len == 0 => {
                self.run_len = 1;
                Some(StabilitySignal::Vanished)
            }
            Some(prev) if prev == len => {
                self.run_len += 1;
                (len > 0 && self.run_len >= self.threshold).then_some(StabilitySignal::Stable)
            }
            _ => {
                self.run_len = 1;
                None
            }
        };
        self.last_len = Some(len);
        signal
    }
}

/// Tracks the busy/stop indicator across polls.
#[derive(Debug)]
pub struct PresenceMonitor {
    threshold: u32,
    absent_run: u32,
}

impl PresenceMonitor {
    /// Create a monitor firing after `threshold` consecutive absent polls
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            absent_run: 0,
        }
    }

    /// Observe one poll's indicator state; returns true when the absence
    /// run reaches the threshold. Reappearance resets the run.
    pub fn observe(&mut self, present: bool) -> bool {
        if present {
            self.absent_run = 0;
            return false;
        }
        self.absent_run += 1;
        self.absent_run >= self.threshold
    }
}

/// First diagnostic match, with its observation time
#[derive(Debug, Clone)]
pub struct DetectedError {
    /// When the match was observed
    pub at: Instant,
    /// The matched diagnostic text
    pub text: String,
}

/// Matches diagnostic-channel text against the provider's pattern set.
///
/// A match raises a flag but does not terminate the job by itself; the
/// combination policy decides once the grace window has passed.
#[derive(Debug)]
pub struct DiagnosticMonitor {
    profile: ProviderProfile,
    detected: Option<DetectedError>,
}

impl DiagnosticMonitor {
    /// Create a monitor over the given provider profile
    pub fn new(profile: ProviderProfile) -> Self {
        Self {
            profile,
            detected: None,
        }
    }

    /// Observe one poll's diagnostic text. Only the first match is kept.
    pub fn observe(&mut self, text: &str, now: Instant) {
        if self.detected.is_some() {
            return;
        }
        if self.profile.matches_diagnostic(text) {
            warn!(provider = %self.profile.kind, diagnostic = %text, "diagnostic pattern matched");
            self.detected = Some(DetectedError {
                at: now,
                text: text.to_string(),
            });
        }
    }

    /// The flagged error once it has aged past the grace window
    pub fn aged(&self, grace: Duration, now: Instant) -> Option<&DetectedError> {
        self.detected
            .as_ref()
            .filter(|e| now.duration_since(e.at) >= grace)
    }

    /// The flagged error regardless of age
    pub fn detected(&self) -> Option<&DetectedError> {
        self.detected.as_ref()
    }
}

/// Drives the three monitors against a probe until a terminal signal.
pub struct CompletionDetector {
    settings: DetectorSettings,
    stability: StabilityMonitor,
    presence: PresenceMonitor,
    diagnostics: DiagnosticMonitor,
}

impl CompletionDetector {
    /// Create a detector for one attempt against one provider
    pub fn new(settings: DetectorSettings, profile: ProviderProfile) -> Self {
        Self {
            stability: StabilityMonitor::new(settings.stable_cycles),
            presence: PresenceMonitor::new(settings.absent_cycles),
            diagnostics: DiagnosticMonitor::new(profile),
            settings,
        }
    }

    /// Poll until completion, abort, deadline, or cancellation.
    ///
    /// The deadline timer and the detector's terminal signals race inside
    /// one `select!`; whichever fires first wins and the rest are dropped,
    /// so an attempt can never double-complete. A response-detected
    /// notification triggers one immediate out-of-cadence poll but never
    /// completes the attempt on its own.
    pub async fn watch(
        mut self,
        probe: &mut dyn Probe,
        notifications: &mut mpsc::Receiver<ResponseNotification>,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<Detection, TaskFailure> {
        let started = Instant::now();
        let deadline_at = tokio::time::Instant::now() + deadline;
        let mut interval = tokio::time::interval(Duration::from_millis(
            self.settings.poll_interval_ms.max(1),
        ));
        let grace = Duration::from_millis(self.settings.error_grace_ms);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("detector cancelled after {:?}", started.elapsed());
                    return Err(TaskFailure::Cancelled);
                }
                _ = tokio::time::sleep_until(deadline_at) => {
                    warn!("no completion signal within {:?}", deadline);
                    return Err(TaskFailure::TimeoutNoResponse);
                }
                _ = interval.tick() => {}
                Some(note) = notifications.recv() => {
                    debug!(task_id = %note.task_id, context_id = %note.context_id,
                        "response-detected notification, polling immediately");
                }
            }

            if let Some(verdict) = self.poll_once(probe).await {
                match verdict {
                    Ok(detection) => {
                        debug!(signal = ?detection.signal, "attempt complete");
                        return Ok(detection);
                    }
                    Err(failure) => return Err(failure),
                }
            }

            if let Some(aged) = self.diagnostics.aged(grace, Instant::now()) {
                return Err(TaskFailure::ProviderInternal {
                    message: aged.text.clone(),
                });
            }
        }
    }

    /// Evaluate all monitors for one poll tick.
    ///
    /// Returns None to continue, or the attempt's terminal outcome.
    async fn poll_once(
        &mut self,
        probe: &mut dyn Probe,
    ) -> Option<Result<Detection, TaskFailure>> {
        if let Some(diag) = probe.read_error_signal().await {
            self.diagnostics.observe(&diag, Instant::now());
        }

        let text = probe.read_response_text().await;
        match self.stability.observe(text.chars().count()) {
            Some(StabilitySignal::Vanished) => {
                warn!("response text vanished");
                return Some(Err(TaskFailure::ProviderInternal {
                    message: "response text vanished".to_string(),
                }));
            }
            Some(StabilitySignal::Stable) => {
                return Some(Ok(Detection {
                    signal: CompletionSignal::StableComplete,
                    response: text,
                }));
            }
            None => {}
        }

        let present = probe.read_presence_indicator().await;
        if self.presence.observe(present) {
            return Some(Ok(Detection {
                signal: CompletionSignal::PresenceComplete,
                response: text,
            }));
        }

        None
    }
}
