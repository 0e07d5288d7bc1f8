//! Per-client run history.
//!
//! Successful runs store their overrides and selected outputs keyed by
//! `(client identity, workflow key)` so a reconnecting UI can restore
//! its last results. Entries live 24 hours; the backing cache handles
//! expiry lazily.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use flowdeck_core::cache::TtlCache;

/// Lifetime of a recorded run.
const RUN_HISTORY_TTL: Duration = Duration::from_secs(60 * 60 * 24);

/// What a finished run leaves behind.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    /// The caller's overrides as submitted.
    pub prompt: Value,
    /// The filtered outputs as relayed in the `done` event.
    pub outputs: Value,
}

/// TTL-bounded store of the last outputs per client and workflow.
pub struct HistoryStore {
    cache: TtlCache<(String, String), HistoryEntry>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self {
            cache: TtlCache::new(),
        }
    }

    /// Record a successful run with the 24-hour lifetime.
    pub fn record(&self, client_id: &str, workflow_key: &str, entry: HistoryEntry) {
        self.cache.set_with_ttl(
            (client_id.to_string(), workflow_key.to_string()),
            entry,
            RUN_HISTORY_TTL,
        );
    }

    /// Fetch a client's last run for a workflow, if still live.
    pub fn get(&self, client_id: &str, workflow_key: &str) -> Option<HistoryEntry> {
        self.cache
            .get(&(client_id.to_string(), workflow_key.to_string()))
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}
