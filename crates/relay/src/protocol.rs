//! Wire shape of relayed run-lifecycle events.
//!
//! Every event published during a run travels over the single
//! `workflows` topic as `{"clientId": ..., "type": ..., "data": ...}`.
//! The broker does not filter: most payloads name a target `clientId`
//! and each connection's transport task drops events addressed to
//! someone else. `state` events carry no client id and reach everyone.

use serde::Serialize;
use serde_json::{json, Value};

/// The one topic all run-lifecycle events are published to.
pub const WORKFLOWS_TOPIC: &str = "workflows";

/// Discriminator for relayed events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayEventKind {
    /// The workflow resolved and the run was accepted.
    Running,
    /// A normalized progress update.
    Progress,
    /// An engine queue snapshot.
    State,
    /// The run finished with outputs.
    Done,
    /// The run failed; `data.message` is human-readable.
    Error,
}

/// One event as delivered to subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct RelayEvent {
    /// Target client identity; `None` broadcasts to every subscriber.
    #[serde(rename = "clientId", skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: RelayEventKind,
    pub data: Value,
}

impl RelayEvent {
    pub fn running(client_id: &str, workflow_key: &str) -> Self {
        Self {
            client_id: Some(client_id.to_string()),
            kind: RelayEventKind::Running,
            data: json!({ "workflowKey": workflow_key }),
        }
    }

    pub fn progress(
        client_id: &str,
        workflow_key: &str,
        prompt_id: Option<&str>,
        value: f64,
    ) -> Self {
        Self {
            client_id: Some(client_id.to_string()),
            kind: RelayEventKind::Progress,
            data: json!({
                "workflowKey": workflow_key,
                "promptId": prompt_id,
                "value": value,
            }),
        }
    }

    /// Queue snapshot; unaddressed so every subscriber sees it.
    pub fn state(pending: usize, running: usize) -> Self {
        Self {
            client_id: None,
            kind: RelayEventKind::State,
            data: json!({ "pending": pending, "running": running }),
        }
    }

    pub fn done(client_id: &str, workflow_key: &str, prompt: &Value, outputs: &Value) -> Self {
        Self {
            client_id: Some(client_id.to_string()),
            kind: RelayEventKind::Done,
            data: json!({
                "workflowKey": workflow_key,
                "prompt": prompt,
                "outputs": outputs,
            }),
        }
    }

    pub fn error(client_id: &str, workflow_key: &str, message: &str) -> Self {
        Self {
            client_id: Some(client_id.to_string()),
            kind: RelayEventKind::Error,
            data: json!({ "workflowKey": workflow_key, "message": message }),
        }
    }

    /// A re-broadcast of a raw inbound control payload. The payload's
    /// own `clientId`, when present, scopes delivery; without one the
    /// message reaches every subscriber.
    pub fn rebroadcast(payload: Value) -> Self {
        let client_id = payload
            .get("clientId")
            .and_then(Value::as_str)
            .map(str::to_string);
        Self {
            client_id,
            kind: RelayEventKind::State,
            data: payload,
        }
    }

    /// Whether a connection with the given identity should deliver this
    /// event. Unaddressed events go to everyone.
    pub fn addressed_to(&self, identity: &str) -> bool {
        match &self.client_id {
            Some(target) => target == identity,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addressed_event_only_matches_its_target() {
        let event = RelayEvent::running("client-a", "sketch");

        assert!(event.addressed_to("client-a"));
        assert!(!event.addressed_to("client-b"));
    }

    #[test]
    fn unaddressed_event_matches_everyone() {
        let event = RelayEvent::state(2, 1);

        assert!(event.addressed_to("client-a"));
        assert!(event.addressed_to("client-b"));
    }

    #[test]
    fn serialized_shape_matches_the_ui_contract() {
        let event = RelayEvent::progress("c1", "sketch", Some("p1"), 75.0);
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["clientId"], "c1");
        assert_eq!(value["type"], "progress");
        assert_eq!(value["data"]["workflowKey"], "sketch");
        assert_eq!(value["data"]["promptId"], "p1");
        assert_eq!(value["data"]["value"], 75.0);
    }

    #[test]
    fn state_event_omits_client_id() {
        let value = serde_json::to_value(RelayEvent::state(0, 0)).unwrap();

        assert!(value.get("clientId").is_none());
        assert_eq!(value["data"]["pending"], 0);
    }

    #[test]
    fn rebroadcast_scopes_by_embedded_client_id() {
        let scoped = RelayEvent::rebroadcast(json!({"clientId": "c1", "paused": true}));
        assert!(scoped.addressed_to("c1"));
        assert!(!scoped.addressed_to("c2"));

        let open = RelayEvent::rebroadcast(json!({"paused": true}));
        assert!(open.addressed_to("c1"));
        assert!(open.addressed_to("c2"));
    }

    #[test]
    fn terminal_progress_carries_null_prompt_id() {
        let value = serde_json::to_value(RelayEvent::progress("c1", "k", None, 100.0)).unwrap();

        assert!(value["data"]["promptId"].is_null());
    }
}
