//! In-memory change tracking. The tracker is the source of truth replayed
//! against a second, real environment, so ingestion is the single point
//! where malformed data is stopped: calls that do not match a known
//! operation shape are skipped and counted, and results that do not match a
//! known output shape are dropped while the change itself is kept.
//!
//! One instance is built at the composition root and shared; state lives for
//! the process only. Concurrent agent runs interleave their appends into the
//! same list — a documented single-session limitation, not a bug.

use crate::application::agent::AgentStep;
use crate::application::operations::{Operation, validate_arguments, validate_result};
use crate::domain::change::TrackedChange;
use chrono::Utc;
use serde_json::Value;
use std::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct RecordSummary {
    pub tracked: usize,
    pub skipped: usize,
}

#[derive(Debug, Default)]
struct TrackerState {
    changes: Vec<TrackedChange>,
    skipped: u64,
}

#[derive(Debug, Default)]
pub struct ChangeTracker {
    state: Mutex<TrackerState>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extracts and stores validated changes from an agent step trace,
    /// preserving step order.
    pub fn record_run(&self, steps: &[AgentStep]) -> RecordSummary {
        let mut state = self.state.lock().expect("change tracker lock");
        let mut summary = RecordSummary::default();

        for (index, step) in steps.iter().enumerate() {
            let Some(operation) = Operation::from_name(&step.operation) else {
                warn!(
                    operation = %step.operation,
                    step = index,
                    "Skipping change for unknown operation"
                );
                state.skipped += 1;
                summary.skipped += 1;
                continue;
            };

            let arguments = match validate_arguments(operation, &step.input) {
                Ok(normalized) => normalized,
                Err(err) => {
                    warn!(
                        operation = operation.name(),
                        step = index,
                        %err,
                        "Skipping change with invalid arguments"
                    );
                    state.skipped += 1;
                    summary.skipped += 1;
                    continue;
                }
            };

            let result = match &step.output {
                Value::Null => None,
                output => {
                    let validated = validate_result(operation, output);
                    if validated.is_none() {
                        debug!(
                            operation = operation.name(),
                            step = index,
                            "Dropping unrecognized result shape; change kept without result"
                        );
                    }
                    validated
                }
            };

            state.changes.push(TrackedChange {
                operation: operation.name().to_string(),
                arguments,
                result,
                recorded_at: Utc::now(),
                step_index: index,
            });
            summary.tracked += 1;
        }

        debug!(
            tracked = summary.tracked,
            skipped = summary.skipped,
            total = state.changes.len(),
            "Recorded agent run"
        );
        summary
    }

    /// Owned copy of the tracked changes in recorded order; mutating it does
    /// not touch the tracker.
    pub fn snapshot(&self) -> Vec<TrackedChange> {
        self.state.lock().expect("change tracker lock").changes.clone()
    }

    pub fn count(&self) -> usize {
        self.state.lock().expect("change tracker lock").changes.len()
    }

    pub fn skipped(&self) -> u64 {
        self.state.lock().expect("change tracker lock").skipped
    }

    pub fn has_changes(&self) -> bool {
        self.count() > 0
    }

    pub fn clear(&self) {
        let mut state = self.state.lock().expect("change tracker lock");
        let dropped = state.changes.len();
        state.changes.clear();
        state.skipped = 0;
        debug!(dropped, "Cleared change tracker");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(operation: &str, input: Value, output: Value) -> AgentStep {
        AgentStep {
            operation: operation.to_string(),
            input,
            success: true,
            output,
            message: None,
        }
    }

    #[test]
    fn records_valid_calls_and_skips_unknown_operations() {
        let tracker = ChangeTracker::new();
        let steps = vec![
            step(
                "create-post",
                json!({"title": "Hello", "content": "World"}),
                Value::Null,
            ),
            step("reticulate-splines", json!({}), Value::Null),
        ];

        let summary = tracker.record_run(&steps);
        assert_eq!(summary.tracked, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(tracker.count(), 1);
        assert_eq!(tracker.skipped(), 1);
    }

    #[test]
    fn invalid_arguments_are_skipped_not_stored() {
        let tracker = ChangeTracker::new();
        let steps = vec![step("get-post", json!({"id": "not-a-number"}), Value::Null)];
        let summary = tracker.record_run(&steps);
        assert_eq!(summary.tracked, 0);
        assert_eq!(summary.skipped, 1);
        assert!(!tracker.has_changes());
    }

    #[test]
    fn malformed_result_is_dropped_but_change_kept() {
        let tracker = ChangeTracker::new();
        let steps = vec![step(
            "create-post",
            json!({"title": "T", "content": "C"}),
            json!({"weird": "shape"}),
        )];
        tracker.record_run(&steps);

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot[0].result.is_none());
    }

    #[test]
    fn valid_result_is_stored_with_the_change() {
        let tracker = ChangeTracker::new();
        let steps = vec![step(
            "create-post",
            json!({"title": "T", "content": "C"}),
            json!({"id": 12, "title": "T", "content": "C", "status": "draft"}),
        )];
        tracker.record_run(&steps);

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot[0].result.as_ref().expect("result")["id"], 12);
        assert_eq!(snapshot[0].arguments["status"], "draft");
    }

    #[test]
    fn snapshot_preserves_order_and_is_detached() {
        let tracker = ChangeTracker::new();
        let steps = vec![
            step("create-post", json!({"title": "A", "content": "a"}), Value::Null),
            step("update-post", json!({"id": 1, "title": "B"}), Value::Null),
            step("delete-post", json!({"id": 2}), Value::Null),
        ];
        tracker.record_run(&steps);

        let mut snapshot = tracker.snapshot();
        let names: Vec<_> = snapshot.iter().map(|c| c.operation.clone()).collect();
        assert_eq!(names, vec!["create-post", "update-post", "delete-post"]);
        assert_eq!(
            snapshot.iter().map(|c| c.step_index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );

        snapshot.clear();
        assert_eq!(tracker.count(), 3);
    }

    #[test]
    fn clear_resets_changes_and_skip_counter() {
        let tracker = ChangeTracker::new();
        tracker.record_run(&[step("bogus", json!({}), Value::Null)]);
        tracker.record_run(&[step("get-post", json!({"id": 1}), Value::Null)]);
        assert!(tracker.has_changes());

        tracker.clear();
        assert_eq!(tracker.count(), 0);
        assert_eq!(tracker.skipped(), 0);
        assert!(!tracker.has_changes());
    }
}
