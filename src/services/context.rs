//! Execution-Context Protocol
//!
//! Message types and trait seams for talking to execution contexts: the
//! isolated, disposable handles through which one job is dispatched to a
//! provider. Contexts are never reused across attempts; escalation always
//! acquires a fresh handle.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::models::provider::ProviderKind;
use crate::utils::error::EngineResult;

/// Request envelope sent to an execution context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextRequest {
    /// Action to perform, e.g. "send_prompt"
    pub action: String,
    /// Task this request belongs to
    pub task_id: String,
    /// Action-specific payload
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl ContextRequest {
    /// Build a send-prompt request
    pub fn send_prompt(task_id: impl Into<String>, prompt: &str, model: Option<&str>) -> Self {
        Self {
            action: "send_prompt".to_string(),
            task_id: task_id.into(),
            payload: serde_json::json!({
                "prompt": prompt,
                "model": model,
            }),
        }
    }
}

/// Response envelope from an execution context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextResponse {
    /// Whether the context acknowledged the request
    pub success: bool,
    /// Response payload on success
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    /// Error description on failure
    #[serde(default)]
    pub error: Option<String>,
}

/// Fire-and-forget "response detected" event, correlated by task id and
/// context handle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseNotification {
    /// Task the event belongs to
    pub task_id: String,
    /// Context handle that observed the response
    pub context_id: String,
}

/// Capability for observing a running job's rendering surface.
///
/// The completion detector is written entirely against this trait so it can
/// be driven by synthetic probe sequences in tests.
#[async_trait]
pub trait Probe: Send {
    /// Newly emitted diagnostic text, if any, since the last poll
    async fn read_error_signal(&mut self) -> Option<String>;

    /// The currently visible response text
    async fn read_response_text(&mut self) -> String;

    /// Whether a busy/stop indicator is currently present
    async fn read_presence_indicator(&mut self) -> bool;
}

/// One isolated, disposable execution handle
#[async_trait]
pub trait ExecutionContext: Send + Sync {
    /// Opaque handle identifier
    fn id(&self) -> &str;

    /// Which provider this context fronts
    fn provider(&self) -> ProviderKind;

    /// Send a request and await its acknowledgement
    async fn send(&self, request: ContextRequest) -> EngineResult<ContextResponse>;

    /// Tear the context down. Called once per handle, including failed ones.
    async fn dispose(&self);
}

/// Everything acquired together for one attempt
pub struct ContextHandle {
    /// The context itself
    pub context: Box<dyn ExecutionContext>,
    /// Probe over the context's rendering surface
    pub probe: Box<dyn Probe>,
    /// Receiver for response-detected notifications from this context
    pub notifications: mpsc::Receiver<ResponseNotification>,
}

/// Factory for execution contexts.
///
/// `slot` is the positional execution slot assigned by the batch scheduler,
/// used by implementations that tile visible windows.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    /// Acquire a brand-new context for the given provider
    async fn acquire(
        &self,
        provider: ProviderKind,
        slot: Option<usize>,
    ) -> EngineResult<ContextHandle>;
}
