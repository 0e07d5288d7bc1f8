use std::sync::Arc;

use flowdeck_relay::RelayBroker;
use flowdeck_workflows::WorkflowRunner;

use crate::config::ServerConfig;

/// Shared application state available to all handlers via `State<AppState>`.
///
/// Cheaply cloneable; all inner data sits behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Fan-out broker for run-lifecycle events.
    pub relay: Arc<RelayBroker>,
    /// The workflow execution service.
    pub runner: Arc<WorkflowRunner>,
}
