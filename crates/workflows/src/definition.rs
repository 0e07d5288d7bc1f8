//! Workflow definition model.
//!
//! Definitions are created and edited through the external content API;
//! this service only reads them. The stored `prompt.output` object is
//! the template graph the merge engine operates on.

use serde::de::{Deserializer, Error as _};
use serde::Deserialize;
use serde_json::Value;

use flowdeck_core::merge::PromptGraph;

/// A stored, named workflow template plus its parameter metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowDefinition {
    /// Externally unique lookup key.
    pub key: String,
    /// Which engine family runs this workflow.
    #[serde(rename = "workflowType")]
    pub workflow_type: WorkflowType,
    /// The stored template container.
    pub prompt: PromptTemplate,
    /// Which nodes the caller may treat as inputs or outputs.
    #[serde(rename = "paramsNodes", default)]
    pub params_nodes: Vec<ParamsNode>,
    /// Engine instance this workflow targets; falls back to the
    /// process-wide default when absent.
    #[serde(rename = "engineEndpoint", default)]
    pub engine_endpoint: Option<String>,
}

/// Container for the template graph as the content API stores it.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptTemplate {
    /// Node id to node spec.
    pub output: PromptGraph,
}

/// One overridable parameter declaration.
#[derive(Debug, Clone, Deserialize)]
pub struct ParamsNode {
    pub id: NodeId,
    pub category: ParamCategory,
}

/// Node ids appear as either numbers or strings in stored definitions.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NodeId {
    Num(i64),
    Str(String),
}

impl NodeId {
    pub fn as_key(&self) -> String {
        match self {
            NodeId::Num(n) => n.to_string(),
            NodeId::Str(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamCategory {
    Input,
    Output,
}

/// Closed set of job types this service knows how to drive.
///
/// Unknown strings deserialize into [`WorkflowType::Unknown`] and are
/// rejected with an `UnsupportedType` error at the orchestrator
/// boundary, keeping the original type name for the error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowType {
    ComfyUi,
    Unknown(String),
}

impl<'de> Deserialize<'de> for WorkflowType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "comfyui" => WorkflowType::ComfyUi,
            _ => WorkflowType::Unknown(raw),
        })
    }
}

/// One execution request as received from a client.
#[derive(Debug, Clone, Deserialize)]
pub struct RunRequest {
    /// Workflow lookup key.
    pub key: String,
    /// Identity correlating this run to a relay subscriber.
    #[serde(rename = "clientId")]
    pub client_id: String,
    /// Partial prompt overrides mirroring the template graph's shape.
    #[serde(default, deserialize_with = "object_or_default")]
    pub prompt: PromptGraph,
}

/// Accept a missing or null `prompt` as an empty override set.
fn object_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PromptGraph, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(PromptGraph::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(other) => Err(D::Error::custom(format!(
            "prompt must be an object, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn definition_parses_stored_shape() {
        let def: WorkflowDefinition = serde_json::from_value(json!({
            "key": "sketch",
            "workflowType": "comfyui",
            "prompt": {"output": {"3": {"inputs": {"seed": 0}}}},
            "paramsNodes": [
                {"id": 3, "category": "output"},
                {"id": "5", "category": "input"}
            ]
        }))
        .unwrap();

        assert_eq!(def.key, "sketch");
        assert_eq!(def.workflow_type, WorkflowType::ComfyUi);
        assert_eq!(def.params_nodes[0].id.as_key(), "3");
        assert_eq!(def.params_nodes[0].category, ParamCategory::Output);
        assert_eq!(def.params_nodes[1].id.as_key(), "5");
        assert!(def.engine_endpoint.is_none());
    }

    #[test]
    fn unknown_workflow_type_keeps_its_name() {
        let parsed: WorkflowType = serde_json::from_value(json!("automatic1111")).unwrap();

        assert_eq!(parsed, WorkflowType::Unknown("automatic1111".into()));
    }

    #[test]
    fn run_request_defaults_missing_prompt() {
        let req: RunRequest =
            serde_json::from_value(json!({"key": "sketch", "clientId": "c1"})).unwrap();

        assert!(req.prompt.is_empty());

        let req: RunRequest =
            serde_json::from_value(json!({"key": "sketch", "clientId": "c1", "prompt": null}))
                .unwrap();

        assert!(req.prompt.is_empty());
    }
}
