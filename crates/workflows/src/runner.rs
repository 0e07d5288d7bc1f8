//! Execution orchestrator.
//!
//! Drives one workflow run end to end: resolve the definition through
//! the content API, merge the template with overrides, submit to the
//! engine, consume the event stream into relayed progress updates,
//! select the declared outputs, record history, and emit the terminal
//! `done` or `error` event. Every failure path publishes its `error`
//! event and returns the error to the caller; neither happens alone.
//!
//! Each run is an independent task with its own tracker, connection,
//! and registry entry. The only cross-run structures are the relay
//! broker, the history store, and the run registry.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use flowdeck_comfyui::api::EngineApi;
use flowdeck_comfyui::client::{EngineClient, EngineConnection, EngineStreamError};
use flowdeck_comfyui::messages::EngineMessage;
use flowdeck_comfyui::progress::ProgressTracker;
use flowdeck_core::merge::{merge_prompt, PromptGraph};
use flowdeck_relay::{RelayBroker, RelayEvent, WORKFLOWS_TOPIC};

use crate::content::ContentClient;
use crate::definition::{RunRequest, WorkflowDefinition, WorkflowType};
use crate::error::WorkflowError;
use crate::history::{HistoryEntry, HistoryStore};
use crate::outputs::select_outputs;
use crate::registry::{CancelRoute, RunRegistry};

/// Delay before the post-submission queue snapshot is fetched.
const QUEUE_STATE_DELAY: Duration = Duration::from_secs(1);

/// Shared workflow execution service.
///
/// Cheap to share behind an `Arc`; every HTTP handler and run task
/// borrows the same instance.
pub struct WorkflowRunner {
    content: ContentClient,
    relay: Arc<RelayBroker>,
    history: HistoryStore,
    registry: RunRegistry,
    http: reqwest::Client,
    default_engine_url: String,
    shutdown: CancellationToken,
}

impl WorkflowRunner {
    /// * `default_engine_url` - HTTP base of the engine used when a
    ///   workflow does not pin its own endpoint.
    pub fn new(
        content: ContentClient,
        relay: Arc<RelayBroker>,
        default_engine_url: impl Into<String>,
    ) -> Self {
        Self {
            content,
            relay,
            history: HistoryStore::new(),
            registry: RunRegistry::new(),
            http: reqwest::Client::new(),
            default_engine_url: default_engine_url.into(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn content(&self) -> &ContentClient {
        &self.content
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// REST handle for a specific engine, or the default one.
    ///
    /// Used by the upload and view passthroughs, which are not tied to
    /// a run.
    pub fn engine_api(&self, endpoint: Option<&str>) -> EngineApi {
        let url = endpoint.unwrap_or(&self.default_engine_url);
        EngineApi::with_client(self.http.clone(), url)
    }

    /// Signal all in-flight runs to stop consuming their streams.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Execute a workflow run end to end.
    ///
    /// Returns the filtered outputs on success. On any failure an
    /// `error` relay event addressed to the client has already been
    /// published by the time the error reaches the caller.
    pub async fn queue(&self, request: RunRequest) -> Result<Map<String, Value>, WorkflowError> {
        let RunRequest {
            key,
            client_id,
            prompt: overrides,
        } = request;

        // Resolving: failures here precede the `running` event.
        let workflow = match self.resolve(&key).await {
            Ok(workflow) => workflow,
            Err(e) => return self.fail(&client_id, &key, e).await,
        };

        // The run is accepted; let the UI show "started" before the
        // engine round-trips.
        self.relay
            .publish(WORKFLOWS_TOPIC, RelayEvent::running(&client_id, &key))
            .await;

        let result = self.execute(&client_id, &key, &workflow, &overrides).await;

        // Queue snapshot at termination, success or failure.
        self.publish_queue_state(&self.engine_url(&workflow)).await;

        match result {
            Ok(outputs) => {
                let overrides = Value::Object(overrides);
                let outputs_value = Value::Object(outputs.clone());
                self.history.record(
                    &client_id,
                    &key,
                    HistoryEntry {
                        prompt: overrides.clone(),
                        outputs: outputs_value.clone(),
                    },
                );
                self.relay
                    .publish(
                        WORKFLOWS_TOPIC,
                        RelayEvent::done(&client_id, &key, &overrides, &outputs_value),
                    )
                    .await;
                tracing::info!(client_id, workflow_key = key, "Workflow run finished");
                Ok(outputs)
            }
            Err(e) => self.fail(&client_id, &key, e).await,
        }
    }

    /// Cancel a run by its engine prompt id.
    ///
    /// A prompt this process is currently executing is interrupted;
    /// anything else is deleted from the engine queue.
    pub async fn cancel(&self, prompt_id: &str) -> Result<(), WorkflowError> {
        let (route, engine_url) = self.registry.route_cancel(prompt_id).await;
        let api = self.engine_api(engine_url.as_deref());

        match route {
            CancelRoute::Interrupt => {
                tracing::info!(prompt_id, "Interrupting executing prompt");
                api.interrupt().await?;
            }
            CancelRoute::DeleteQueued => {
                tracing::info!(prompt_id, "Deleting queued prompt");
                api.delete_queued(prompt_id).await?;
            }
        }
        Ok(())
    }

    // ---- run stages ----

    async fn resolve(&self, key: &str) -> Result<WorkflowDefinition, WorkflowError> {
        match self.content.find_by_key(key).await {
            Ok(Some(workflow)) => Ok(workflow),
            Ok(None) => Err(WorkflowError::NotFound(key.to_string())),
            Err(e) => Err(WorkflowError::ContentApi(e.to_string())),
        }
    }

    async fn execute(
        &self,
        client_id: &str,
        key: &str,
        workflow: &WorkflowDefinition,
        overrides: &PromptGraph,
    ) -> Result<Map<String, Value>, WorkflowError> {
        match &workflow.workflow_type {
            WorkflowType::ComfyUi => {}
            WorkflowType::Unknown(name) => {
                return Err(WorkflowError::UnsupportedType(name.clone()));
            }
        }

        let merged = merge_prompt(&workflow.prompt.output, overrides);
        let total_nodes = merged.len();

        let engine_url = self.engine_url(workflow);
        let api = EngineApi::with_client(self.http.clone(), engine_url.clone());

        // Open the event stream before submitting so early events
        // (execution_start, cached nodes) are not missed.
        let connection = EngineClient::new(ws_url_for(&engine_url))
            .connect(client_id)
            .await?;

        let submitted = match api.submit_prompt(&Value::Object(merged), client_id).await {
            Ok(submitted) => submitted,
            Err(e) => {
                connection.close().await;
                return Err(e.into());
            }
        };
        let prompt_id = submitted.prompt_id;
        self.registry.insert(&prompt_id, &engine_url).await;

        tracing::info!(
            client_id,
            workflow_key = key,
            prompt_id = %prompt_id,
            total_nodes,
            "Workflow submitted to engine",
        );

        // Early queue snapshot so the UI sees queue depth before
        // fine-grained progress arrives.
        self.spawn_deferred_queue_state(&engine_url);

        let streamed = self
            .stream_progress(connection, client_id, key, total_nodes)
            .await;
        self.registry.remove(&prompt_id).await;
        streamed?;

        let outputs = api
            .get_outputs(&prompt_id)
            .await?
            .ok_or(WorkflowError::EmptyOutput)?;
        let selected = select_outputs(&outputs, &workflow.params_nodes);
        if selected.is_empty() {
            return Err(WorkflowError::EmptyOutput);
        }
        Ok(selected)
    }

    /// Consume the event stream until the terminal event, relaying each
    /// normalized update. The connection is closed on every exit path.
    async fn stream_progress(
        &self,
        mut connection: EngineConnection,
        client_id: &str,
        key: &str,
        total_nodes: usize,
    ) -> Result<(), WorkflowError> {
        let mut tracker = ProgressTracker::new(total_nodes);

        let result = loop {
            let message = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    break Err(WorkflowError::Execution("service shutting down".into()));
                }
                message = connection.next_message() => message,
            };

            match message {
                Ok(Some(message)) => {
                    match &message {
                        EngineMessage::ExecutionStart(data) => {
                            self.registry.mark_executing(&data.prompt_id).await;
                        }
                        EngineMessage::ExecutionError(data) => {
                            break Err(WorkflowError::Execution(
                                data.exception_message.clone(),
                            ));
                        }
                        _ => {}
                    }

                    if let Some(update) = tracker.apply(&message) {
                        self.relay
                            .publish(
                                WORKFLOWS_TOPIC,
                                RelayEvent::progress(
                                    client_id,
                                    key,
                                    update.prompt_id.as_deref(),
                                    update.percent,
                                ),
                            )
                            .await;
                    }

                    if tracker.is_completed() {
                        break Ok(());
                    }
                }
                Ok(None) => {
                    break Err(EngineStreamError::Transport(
                        "event stream closed before completion".into(),
                    )
                    .into());
                }
                Err(e) => break Err(e.into()),
            }
        };

        connection.close().await;
        result
    }

    // ---- helpers ----

    /// Publish the error event and hand the failure back to the caller.
    async fn fail(
        &self,
        client_id: &str,
        key: &str,
        error: WorkflowError,
    ) -> Result<Map<String, Value>, WorkflowError> {
        let message = error.to_string();
        tracing::warn!(client_id, workflow_key = key, error = %message, "Workflow run failed");
        self.relay
            .publish(WORKFLOWS_TOPIC, RelayEvent::error(client_id, key, &message))
            .await;
        Err(error)
    }

    fn engine_url(&self, workflow: &WorkflowDefinition) -> String {
        workflow
            .engine_endpoint
            .clone()
            .unwrap_or_else(|| self.default_engine_url.clone())
    }

    /// Publish a queue snapshot now; fetch problems are logged, not
    /// surfaced.
    async fn publish_queue_state(&self, engine_url: &str) {
        let api = EngineApi::with_client(self.http.clone(), engine_url);
        match api.get_queue().await {
            Ok(snapshot) => {
                self.relay
                    .publish(
                        WORKFLOWS_TOPIC,
                        RelayEvent::state(snapshot.pending, snapshot.running),
                    )
                    .await;
            }
            Err(e) => {
                tracing::debug!(engine_url, error = %e, "Queue snapshot failed");
            }
        }
    }

    /// Fire-and-forget queue snapshot shortly after submission. If the
    /// run has already terminated when it lands, the publish is still
    /// harmless.
    fn spawn_deferred_queue_state(&self, engine_url: &str) {
        let api = EngineApi::with_client(self.http.clone(), engine_url);
        let relay = Arc::clone(&self.relay);
        tokio::spawn(async move {
            tokio::time::sleep(QUEUE_STATE_DELAY).await;
            match api.get_queue().await {
                Ok(snapshot) => {
                    relay
                        .publish(
                            WORKFLOWS_TOPIC,
                            RelayEvent::state(snapshot.pending, snapshot.running),
                        )
                        .await;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Deferred queue snapshot failed");
                }
            }
        });
    }
}

/// Derive the event-stream URL from an engine's HTTP base.
fn ws_url_for(http_url: &str) -> String {
    if let Some(rest) = http_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = http_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        format!("ws://{http_url}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_url_swaps_scheme() {
        assert_eq!(ws_url_for("http://127.0.0.1:8188"), "ws://127.0.0.1:8188");
        assert_eq!(ws_url_for("https://gpu.example"), "wss://gpu.example");
        assert_eq!(ws_url_for("127.0.0.1:8188"), "ws://127.0.0.1:8188");
    }
}
