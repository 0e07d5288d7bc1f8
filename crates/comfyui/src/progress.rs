//! Progress normalizer.
//!
//! Folds the engine's heterogeneous event stream for one run into a
//! completion percentage and a current-prompt marker. Node-level events
//! (`execution_cached`, `executing`) move the percentage in whole-node
//! steps; step-level `progress` events add a fractional increment.
//!
//! The fractional step divides by both the node count and the event's
//! own `max`, so it does not converge to 100 on its own. That matches
//! the behaviour downstream UIs were built against; the terminal
//! `executing(node=null)` event pins the value to exactly 100.

use std::collections::HashSet;

use crate::messages::EngineMessage;

/// Per-run progress state.
pub struct ProgressTracker {
    total_nodes: usize,
    finished: HashSet<String>,
    percent: f64,
    current_prompt_id: Option<String>,
    completed: bool,
}

/// One outward progress emission.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    /// Completion percentage in `[0, 100]`.
    pub percent: f64,
    /// Prompt the engine reports as current; `None` once the run
    /// terminates.
    pub prompt_id: Option<String>,
}

impl ProgressTracker {
    /// Seed a tracker from the merged prompt's node count.
    pub fn new(total_nodes: usize) -> Self {
        Self {
            total_nodes: total_nodes.max(1),
            finished: HashSet::new(),
            percent: 0.0,
            current_prompt_id: None,
            completed: false,
        }
    }

    /// Apply one engine message in arrival order.
    ///
    /// Returns an update to publish when the message touches the
    /// progress signal; `status`, `executed`, and `execution_error`
    /// frames return `None` (errors terminate the run at a higher
    /// layer).
    pub fn apply(&mut self, message: &EngineMessage) -> Option<ProgressUpdate> {
        match message {
            EngineMessage::ExecutionStart(data) => {
                self.percent = 1.0;
                self.current_prompt_id = Some(data.prompt_id.clone());
                Some(self.update())
            }
            EngineMessage::ExecutionCached(data) => {
                for node in &data.nodes {
                    self.finished.insert(node.clone());
                }
                self.percent = self.node_percent();
                Some(self.update())
            }
            EngineMessage::Executing(data) => {
                match &data.node {
                    Some(node) => {
                        if self.finished.insert(node.clone()) {
                            self.percent = self.node_percent();
                        }
                    }
                    None => {
                        // Terminal success signal.
                        self.percent = 100.0;
                        self.current_prompt_id = None;
                        self.completed = true;
                    }
                }
                Some(self.update())
            }
            EngineMessage::Progress(data) if data.max > 0.0 => {
                let step = data.value / data.max * 100.0 / self.total_nodes as f64 / data.max;
                self.percent = ((self.percent + step) * 100.0).round() / 100.0;
                Some(self.update())
            }
            EngineMessage::Progress(_)
            | EngineMessage::Status(_)
            | EngineMessage::Executed(_)
            | EngineMessage::ExecutionError(_) => None,
        }
    }

    /// Whether the terminal `executing(node=null)` event arrived.
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn percent(&self) -> f64 {
        self.percent
    }

    pub fn current_prompt_id(&self) -> Option<&str> {
        self.current_prompt_id.as_deref()
    }

    fn node_percent(&self) -> f64 {
        (self.finished.len() as f64 / self.total_nodes as f64 * 100.0).floor()
    }

    fn update(&self) -> ProgressUpdate {
        ProgressUpdate {
            percent: self.percent,
            prompt_id: self.current_prompt_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::parse_message;

    fn msg(raw: &str) -> EngineMessage {
        parse_message(raw).unwrap()
    }

    #[test]
    fn execution_start_reports_one_percent_and_tracks_prompt() {
        let mut tracker = ProgressTracker::new(10);

        let update = tracker
            .apply(&msg(r#"{"type":"execution_start","data":{"prompt_id":"p1"}}"#))
            .unwrap();

        assert_eq!(update.percent, 1.0);
        assert_eq!(update.prompt_id.as_deref(), Some("p1"));
        assert_eq!(tracker.current_prompt_id(), Some("p1"));
    }

    #[test]
    fn cached_and_executing_nodes_accumulate() {
        // total=4, cached [a,b], then executing c => floor(3/4*100) = 75.
        let mut tracker = ProgressTracker::new(4);

        let update = tracker
            .apply(&msg(
                r#"{"type":"execution_cached","data":{"prompt_id":"p1","nodes":["a","b"]}}"#,
            ))
            .unwrap();
        assert_eq!(update.percent, 50.0);

        let update = tracker
            .apply(&msg(r#"{"type":"executing","data":{"node":"c","prompt_id":"p1"}}"#))
            .unwrap();
        assert_eq!(update.percent, 75.0);
    }

    #[test]
    fn repeated_executing_node_does_not_double_count() {
        let mut tracker = ProgressTracker::new(2);
        let executing = msg(r#"{"type":"executing","data":{"node":"a","prompt_id":"p1"}}"#);

        assert_eq!(tracker.apply(&executing).unwrap().percent, 50.0);
        assert_eq!(tracker.apply(&executing).unwrap().percent, 50.0);
    }

    #[test]
    fn terminal_event_is_exactly_one_hundred() {
        let mut tracker = ProgressTracker::new(3);
        tracker.apply(&msg(r#"{"type":"execution_start","data":{"prompt_id":"p1"}}"#));
        tracker.apply(&msg(
            r#"{"type":"progress","data":{"value":3,"max":20}}"#,
        ));

        let update = tracker
            .apply(&msg(r#"{"type":"executing","data":{"node":null,"prompt_id":"p1"}}"#))
            .unwrap();

        assert_eq!(update.percent, 100.0);
        assert_eq!(update.prompt_id, None);
        assert!(tracker.is_completed());
        assert_eq!(tracker.current_prompt_id(), None);
    }

    #[test]
    fn progress_adds_the_fractional_step() {
        let mut tracker = ProgressTracker::new(2);
        tracker.apply(&msg(r#"{"type":"execution_start","data":{"prompt_id":"p1"}}"#));

        // step = 10/20*100 / 2 / 20 = 1.25; 1 + 1.25 = 2.25.
        let update = tracker
            .apply(&msg(r#"{"type":"progress","data":{"value":10,"max":20}}"#))
            .unwrap();

        assert_eq!(update.percent, 2.25);
    }

    #[test]
    fn progress_rounds_to_two_decimals() {
        let mut tracker = ProgressTracker::new(3);

        // step = 1/7*100 / 3 / 7 = 0.6802...; rounds to 0.68.
        let update = tracker
            .apply(&msg(r#"{"type":"progress","data":{"value":1,"max":7}}"#))
            .unwrap();

        assert_eq!(update.percent, 0.68);
    }

    #[test]
    fn status_and_executed_emit_nothing() {
        let mut tracker = ProgressTracker::new(2);

        assert!(tracker
            .apply(&msg(
                r#"{"type":"status","data":{"status":{"exec_info":{"queue_remaining":1}}}}"#
            ))
            .is_none());
        assert!(tracker
            .apply(&msg(
                r#"{"type":"executed","data":{"node":"1","output":{},"prompt_id":"p1"}}"#
            ))
            .is_none());
    }

    #[test]
    fn single_node_run_publishes_1_100_100() {
        let mut tracker = ProgressTracker::new(1);
        let events = [
            r#"{"type":"execution_start","data":{"prompt_id":"p1"}}"#,
            r#"{"type":"execution_cached","data":{"prompt_id":"p1","nodes":["3"]}}"#,
            r#"{"type":"executing","data":{"node":null,"prompt_id":"p1"}}"#,
        ];

        let published: Vec<f64> = events
            .iter()
            .filter_map(|raw| tracker.apply(&msg(raw)))
            .map(|u| u.percent)
            .collect();

        assert_eq!(published, vec![1.0, 100.0, 100.0]);
    }
}
