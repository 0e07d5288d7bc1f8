//! Active-run registry.
//!
//! Tracks every in-flight prompt by its engine-assigned id so
//! cancellation requests can be routed correctly: a prompt that is
//! actively executing must be interrupted, one still waiting in the
//! engine's queue must be deleted from it. Each run scopes its own
//! entry; there is no process-wide "current job" shared between runs.

use std::collections::HashMap;

use tokio::sync::RwLock;

/// Where a registered prompt currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    /// Submitted, still waiting in the engine queue.
    Queued,
    /// The engine reported `execution_start` for this prompt.
    Executing,
}

/// Which cancellation call applies to a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelRoute {
    /// The prompt is executing right now: interrupt the engine.
    Interrupt,
    /// The prompt is queued (or unknown to this process): delete it
    /// from the engine queue.
    DeleteQueued,
}

struct RunEntry {
    stage: RunStage,
    engine_url: String,
}

/// Registry of in-flight runs, keyed by engine prompt id.
pub struct RunRegistry {
    runs: RwLock<HashMap<String, RunEntry>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self {
            runs: RwLock::new(HashMap::new()),
        }
    }

    /// Record a freshly submitted prompt and the engine it went to.
    pub async fn insert(&self, prompt_id: &str, engine_url: &str) {
        let mut runs = self.runs.write().await;
        runs.insert(
            prompt_id.to_string(),
            RunEntry {
                stage: RunStage::Queued,
                engine_url: engine_url.to_string(),
            },
        );
    }

    /// Mark a prompt as actively executing.
    pub async fn mark_executing(&self, prompt_id: &str) {
        let mut runs = self.runs.write().await;
        if let Some(entry) = runs.get_mut(prompt_id) {
            entry.stage = RunStage::Executing;
        }
    }

    /// Drop a prompt's entry when its run terminates.
    pub async fn remove(&self, prompt_id: &str) {
        self.runs.write().await.remove(prompt_id);
    }

    /// Decide how to cancel a prompt, and against which engine.
    ///
    /// Unknown prompts route to [`CancelRoute::DeleteQueued`] with no
    /// engine (the caller falls back to the default endpoint); a
    /// stale queued entry on the engine side is the harmless case.
    pub async fn route_cancel(&self, prompt_id: &str) -> (CancelRoute, Option<String>) {
        let runs = self.runs.read().await;
        match runs.get(prompt_id) {
            Some(entry) if entry.stage == RunStage::Executing => {
                (CancelRoute::Interrupt, Some(entry.engine_url.clone()))
            }
            Some(entry) => (CancelRoute::DeleteQueued, Some(entry.engine_url.clone())),
            None => (CancelRoute::DeleteQueued, None),
        }
    }

    pub async fn active_count(&self) -> usize {
        self.runs.read().await.len()
    }
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::new()
    }
}
