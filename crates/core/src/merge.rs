//! Template merge engine.
//!
//! Merges a stored prompt template with caller-supplied overrides and
//! injects fresh random seeds into sampler nodes the caller left alone.
//! The merge is structural (`deepmerge-json` semantics): nested objects
//! are merged key by key with the override winning at the leaves, while
//! arrays and scalars are replaced wholesale.

use serde_json::{Map, Value};

use crate::seed::generate_seed;

/// A fully-resolved prompt graph: node id to node spec.
pub type PromptGraph = Map<String, Value>;

/// Merge a prompt template with caller overrides.
///
/// The template is never mutated; the merge operates on a deep copy.
/// Every node id present in the template appears in the result. After
/// merging, any node whose template declares a numeric `inputs.seed`
/// that the override did not also set numerically receives a fresh
/// 15-digit seed from [`generate_seed`].
pub fn merge_prompt(template: &PromptGraph, overrides: &PromptGraph) -> PromptGraph {
    let mut merged = template.clone();
    for (key, value) in overrides {
        match merged.get_mut(key) {
            Some(existing) => deep_merge(existing, value),
            None => {
                merged.insert(key.clone(), value.clone());
            }
        }
    }

    for (node_id, node) in template {
        if !has_numeric_seed(node) {
            continue;
        }
        let overridden = overrides.get(node_id).is_some_and(has_numeric_seed);
        if overridden {
            continue;
        }
        if let Some(inputs) = merged
            .get_mut(node_id)
            .and_then(|n| n.get_mut("inputs"))
            .and_then(Value::as_object_mut)
        {
            inputs.insert("seed".to_string(), Value::from(generate_seed()));
        }
    }

    merged
}

/// Recursively merge `overlay` into `base`.
///
/// Objects merge key by key; any other value type replaces the base
/// value entirely.
fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Whether a node spec carries a numeric `inputs.seed` field.
fn has_numeric_seed(node: &Value) -> bool {
    node.get("inputs")
        .and_then(|inputs| inputs.get("seed"))
        .is_some_and(Value::is_number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn graph(value: Value) -> PromptGraph {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn override_wins_at_leaf() {
        let template = graph(json!({
            "1": {"inputs": {"text": "a castle", "steps": 20}}
        }));
        let overrides = graph(json!({
            "1": {"inputs": {"text": "a forest"}}
        }));

        let merged = merge_prompt(&template, &overrides);

        assert_eq!(merged["1"]["inputs"]["text"], "a forest");
        assert_eq!(merged["1"]["inputs"]["steps"], 20);
    }

    #[test]
    fn nested_maps_merge_recursively() {
        let template = graph(json!({
            "2": {"class_type": "KSampler", "inputs": {"cfg": 7.5, "model": ["4", 0]}}
        }));
        let overrides = graph(json!({
            "2": {"inputs": {"cfg": 4.0}}
        }));

        let merged = merge_prompt(&template, &overrides);

        assert_eq!(merged["2"]["class_type"], "KSampler");
        assert_eq!(merged["2"]["inputs"]["cfg"], 4.0);
        assert_eq!(merged["2"]["inputs"]["model"], json!(["4", 0]));
    }

    #[test]
    fn every_template_node_survives() {
        let template = graph(json!({
            "1": {"inputs": {}},
            "2": {"inputs": {}},
            "3": {"inputs": {}}
        }));
        let overrides = graph(json!({"2": {"inputs": {"x": 1}}}));

        let merged = merge_prompt(&template, &overrides);

        for id in ["1", "2", "3"] {
            assert!(merged.contains_key(id), "node {id} missing from merge");
        }
    }

    #[test]
    fn empty_overrides_are_valid() {
        let template = graph(json!({"1": {"inputs": {"text": "hi"}}}));

        let merged = merge_prompt(&template, &PromptGraph::new());

        assert_eq!(merged["1"]["inputs"]["text"], "hi");
    }

    #[test]
    fn unset_numeric_seed_gets_injected() {
        let template = graph(json!({
            "3": {"inputs": {"seed": 0, "steps": 20}}
        }));

        let merged = merge_prompt(&template, &PromptGraph::new());

        let seed = merged["3"]["inputs"]["seed"].as_u64().unwrap();
        assert!((100_000_000_000_000..1_000_000_000_000_000).contains(&seed));
    }

    #[test]
    fn caller_seed_is_respected() {
        let template = graph(json!({
            "3": {"inputs": {"seed": 0}}
        }));
        let overrides = graph(json!({
            "3": {"inputs": {"seed": 42}}
        }));

        let merged = merge_prompt(&template, &overrides);

        assert_eq!(merged["3"]["inputs"]["seed"], 42);
    }

    #[test]
    fn non_numeric_template_seed_is_left_alone() {
        let template = graph(json!({
            "3": {"inputs": {"seed": "fixed"}}
        }));

        let merged = merge_prompt(&template, &PromptGraph::new());

        assert_eq!(merged["3"]["inputs"]["seed"], "fixed");
    }

    #[test]
    fn merge_does_not_mutate_the_template() {
        let template = graph(json!({
            "3": {"inputs": {"seed": 0}}
        }));
        let before = template.clone();

        let first = merge_prompt(&template, &PromptGraph::new());
        assert_eq!(template, before, "template mutated by merge");

        // A second merge must draw its own seed, not see the first one.
        let second = merge_prompt(&template, &PromptGraph::new());
        assert_eq!(template, before);
        // Seeds are random; equality here would be a 1-in-9e14 fluke.
        assert_ne!(
            first["3"]["inputs"]["seed"],
            second["3"]["inputs"]["seed"]
        );
    }
}
