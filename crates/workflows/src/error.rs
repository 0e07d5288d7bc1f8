//! Failure taxonomy for workflow runs.
//!
//! Every run failure both publishes an `error` relay event to the
//! initiating client and is returned to the synchronous caller; the
//! relay message is this error's `Display` rendering.

use flowdeck_comfyui::api::EngineApiError;
use flowdeck_comfyui::client::EngineStreamError;

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// No workflow definition matches the requested key.
    #[error("workflow not found: {0}")]
    NotFound(String),

    /// The definition names a job type this service cannot run.
    #[error("unsupported workflow type: {0}")]
    UnsupportedType(String),

    /// The content API lookup failed.
    #[error("failed to load workflow: {0}")]
    ContentApi(String),

    /// The engine REST call failed (unreachable or rejected).
    #[error(transparent)]
    Engine(#[from] EngineApiError),

    /// The engine event stream failed or ended early.
    #[error(transparent)]
    Stream(#[from] EngineStreamError),

    /// The engine reported an execution error for the prompt.
    #[error("workflow execution failed: {0}")]
    Execution(String),

    /// The run completed but nothing was categorized as output.
    #[error("no output produced")]
    EmptyOutput,
}
