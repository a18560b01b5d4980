//! Replays tracked changes against a second environment.
//!
//! Replay is not idempotent: applying an already-applied `create-post`
//! change again creates a second post. There is no natural key to match
//! creates across environments, so deduplication is deliberately out of
//! scope; callers decide when to clear the tracker.

use crate::application::adapter::ToolAdapter;
use crate::domain::change::{ChangeOutcome, SyncOutcome, TrackedChange};
use std::sync::Arc;
use tracing::{info, warn};

pub struct SyncService {
    adapter: Arc<ToolAdapter>,
    target: String,
}

impl SyncService {
    pub fn new(adapter: Arc<ToolAdapter>, target: impl Into<String>) -> Self {
        Self {
            adapter,
            target: target.into(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Replays changes strictly sequentially in recorded order: later
    /// changes may depend on earlier ones having completed in the target.
    /// A failing change is recorded and replay continues; a single failure
    /// never aborts the batch.
    pub async fn apply(&self, changes: &[TrackedChange]) -> SyncOutcome {
        info!(
            target = self.target.as_str(),
            total = changes.len(),
            "Starting sync replay"
        );
        let mut outcomes = Vec::with_capacity(changes.len());
        let mut applied = 0;
        let mut failed = 0;

        for change in changes {
            match self
                .adapter
                .execute(&self.target, &change.operation, change.arguments.clone())
                .await
            {
                Ok(result) => {
                    applied += 1;
                    outcomes.push(ChangeOutcome {
                        operation: change.operation.clone(),
                        applied: true,
                        error: None,
                        result: Some(result),
                    });
                }
                Err(err) => {
                    failed += 1;
                    warn!(
                        target = self.target.as_str(),
                        operation = change.operation.as_str(),
                        step = change.step_index,
                        %err,
                        "Change failed to apply; continuing"
                    );
                    outcomes.push(ChangeOutcome {
                        operation: change.operation.clone(),
                        applied: false,
                        error: Some(err.to_string()),
                        result: None,
                    });
                }
            }
        }

        let outcome = SyncOutcome {
            total: changes.len(),
            applied,
            failed,
            success: failed == 0,
            outcomes,
        };
        info!(
            target = self.target.as_str(),
            total = outcome.total,
            applied = outcome.applied,
            failed = outcome.failed,
            success = outcome.success,
            "Sync replay finished"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::tooling::{RemoteToolInfo, RpcError, ToolBackend};
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingBackend {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl ToolBackend for CountingBackend {
        async fn invoke_operation(
            &self,
            _environment: &str,
            _operation: &str,
            _arguments: Value,
        ) -> Result<Value, RpcError> {
            *self.calls.lock().expect("calls lock") += 1;
            Ok(json!({
                "structuredContent": {"id": 1, "title": "T", "content": "C", "status": "draft"},
            }))
        }

        async fn discover(&self, _environment: &str) -> Result<Vec<RemoteToolInfo>, RpcError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn empty_change_list_is_a_successful_no_op() {
        let backend = Arc::new(CountingBackend::default());
        let adapter = Arc::new(ToolAdapter::new(backend.clone()));
        let service = SyncService::new(adapter, "production");

        let outcome = service.apply(&[]).await;
        assert_eq!(outcome.total, 0);
        assert_eq!(outcome.applied, 0);
        assert_eq!(outcome.failed, 0);
        assert!(outcome.success);
        assert!(outcome.outcomes.is_empty());

        // nothing to replay means the backend is never touched
        assert_eq!(*backend.calls.lock().expect("calls lock"), 0);
    }
}
