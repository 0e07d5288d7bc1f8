//! Typed ComfyUI WebSocket messages.
//!
//! The engine pushes JSON frames shaped `{"type": "<kind>", "data": {...}}`
//! over its event channel. [`parse_message`] turns a text frame into an
//! [`EngineMessage`]; unknown kinds are a parse error the consumer should
//! log and skip.

use serde::Deserialize;

/// A raw event from the engine's event stream.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EngineMessage {
    /// Periodic queue-depth broadcast.
    #[serde(rename = "status")]
    Status(StatusData),

    /// A queued prompt began executing.
    #[serde(rename = "execution_start")]
    ExecutionStart(ExecutionStartData),

    /// Nodes skipped because their outputs were served from cache.
    #[serde(rename = "execution_cached")]
    ExecutionCached(ExecutionCachedData),

    /// A node is executing; `node: null` signals the whole prompt finished.
    #[serde(rename = "executing")]
    Executing(ExecutingData),

    /// Step-level progress inside a long-running node.
    #[serde(rename = "progress")]
    Progress(ProgressData),

    /// A node finished and produced output.
    #[serde(rename = "executed")]
    Executed(ExecutedData),

    /// The prompt failed inside the engine.
    #[serde(rename = "execution_error")]
    ExecutionError(ExecutionErrorData),
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusData {
    pub status: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionStartData {
    pub prompt_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionCachedData {
    pub prompt_id: String,
    #[serde(default)]
    pub nodes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutingData {
    /// `None` means execution of the prompt completed.
    pub node: Option<String>,
    #[serde(default)]
    pub prompt_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgressData {
    /// Current step.
    pub value: f64,
    /// Total steps for this node.
    pub max: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutedData {
    pub node: String,
    pub output: serde_json::Value,
    pub prompt_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionErrorData {
    pub prompt_id: String,
    #[serde(default)]
    pub node_id: Option<String>,
    pub exception_message: String,
    #[serde(default)]
    pub exception_type: Option<String>,
}

/// Parse one text frame into an [`EngineMessage`].
pub fn parse_message(text: &str) -> Result<EngineMessage, serde_json::Error> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parses_execution_start() {
        let msg =
            parse_message(r#"{"type":"execution_start","data":{"prompt_id":"p1"}}"#).unwrap();
        assert_matches!(msg, EngineMessage::ExecutionStart(d) if d.prompt_id == "p1");
    }

    #[test]
    fn parses_execution_cached_with_and_without_nodes() {
        let msg = parse_message(
            r#"{"type":"execution_cached","data":{"prompt_id":"p1","nodes":["3","7"]}}"#,
        )
        .unwrap();
        assert_matches!(msg, EngineMessage::ExecutionCached(d) if d.nodes == ["3", "7"]);

        let msg =
            parse_message(r#"{"type":"execution_cached","data":{"prompt_id":"p1"}}"#).unwrap();
        assert_matches!(msg, EngineMessage::ExecutionCached(d) if d.nodes.is_empty());
    }

    #[test]
    fn executing_null_node_marks_completion() {
        let msg =
            parse_message(r#"{"type":"executing","data":{"node":null,"prompt_id":"p1"}}"#)
                .unwrap();
        assert_matches!(msg, EngineMessage::Executing(d) if d.node.is_none());

        let msg =
            parse_message(r#"{"type":"executing","data":{"node":"5","prompt_id":"p1"}}"#)
                .unwrap();
        assert_matches!(msg, EngineMessage::Executing(d) if d.node.as_deref() == Some("5"));
    }

    #[test]
    fn parses_progress_steps() {
        let msg = parse_message(r#"{"type":"progress","data":{"value":4,"max":20}}"#).unwrap();
        assert_matches!(msg, EngineMessage::Progress(d) if d.value == 4.0 && d.max == 20.0);
    }

    #[test]
    fn parses_execution_error() {
        let msg = parse_message(
            r#"{"type":"execution_error","data":{"prompt_id":"p1","node_id":"9","exception_message":"CUDA out of memory","exception_type":"RuntimeError"}}"#,
        )
        .unwrap();
        assert_matches!(
            msg,
            EngineMessage::ExecutionError(d) if d.exception_message.contains("CUDA")
        );
    }

    #[test]
    fn unknown_type_and_garbage_are_errors() {
        assert!(parse_message(r#"{"type":"crystal_ball","data":{}}"#).is_err());
        assert!(parse_message("{{nope").is_err());
    }
}
