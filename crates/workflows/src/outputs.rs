//! Output selection for finished runs.
//!
//! The engine's history records outputs for every node; callers only
//! see the nodes the workflow declares `category: "output"`. Nodes that
//! produced images are collapsed to the view-URL of the last output
//! image (most-recent-wins); anything else passes through unchanged.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::definition::{ParamCategory, ParamsNode};

/// Path clients fetch rewritten output files from.
const VIEW_PATH: &str = "/workflows/api/view";

/// Filter raw engine outputs down to the declared output nodes.
///
/// Returns an empty map when nothing qualifies; the caller treats that
/// as a failed run rather than a successful empty one.
pub fn select_outputs(outputs: &Value, params_nodes: &[ParamsNode]) -> Map<String, Value> {
    let output_ids: HashSet<String> = params_nodes
        .iter()
        .filter(|node| node.category == ParamCategory::Output)
        .map(|node| node.id.as_key())
        .collect();

    let mut selected = Map::new();
    let Some(entries) = outputs.as_object() else {
        return selected;
    };

    for (node_id, node_output) in entries {
        if !output_ids.contains(node_id) {
            continue;
        }
        selected.insert(node_id.clone(), collapse_node_output(node_output));
    }
    selected
}

/// Reduce one node's output to its last output-image URL, or pass the
/// raw value through when it carries no output images.
fn collapse_node_output(node_output: &Value) -> Value {
    let image_urls: Vec<String> = node_output
        .get("images")
        .and_then(Value::as_array)
        .map(|images| {
            images
                .iter()
                .filter(|img| img.get("type").and_then(Value::as_str) == Some("output"))
                .filter_map(|img| img.get("filename").and_then(Value::as_str))
                .map(|filename| format!("{VIEW_PATH}?filename={filename}&type=output"))
                .collect()
        })
        .unwrap_or_default();

    match image_urls.last() {
        Some(url) => Value::String(url.clone()),
        None => node_output.clone(),
    }
}
