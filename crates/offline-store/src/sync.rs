//! Sync coordinator

use crate::OfflineQueue;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Submission failure
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rejected by backend: {0}")]
    Rejected(String),
}

/// Backend submission seam for queued payloads
#[async_trait]
pub trait QueueSubmitter<T>: Send + Sync {
    async fn submit(&self, payload: &T) -> Result<(), SubmitError>;
}

/// Result of one sync pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub delivered: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Drains the offline queue sequentially.
///
/// Per-item failure isolation: a failing entry stays queued and the pass
/// moves on. Idempotent: entries are claimed by id before submission, so
/// overlapping `sync` calls never submit the same entry twice.
pub struct SyncCoordinator<T> {
    queue: Arc<OfflineQueue<T>>,
    submitter: Arc<dyn QueueSubmitter<T>>,
}

impl<T: Serialize + DeserializeOwned + Clone + Send + Sync> SyncCoordinator<T> {
    pub fn new(queue: Arc<OfflineQueue<T>>, submitter: Arc<dyn QueueSubmitter<T>>) -> Self {
        Self { queue, submitter }
    }

    /// Attempt delivery of every pending entry, oldest first.
    pub async fn sync(&self) -> SyncReport {
        let pending = self.queue.pending();
        if pending.is_empty() {
            return SyncReport::default();
        }
        info!(pending = pending.len(), "sync pass started");

        let mut report = SyncReport::default();
        for entry in pending {
            // Claimed by a concurrent pass, or already delivered.
            if !self.queue.claim(entry.id) {
                report.skipped += 1;
                continue;
            }

            match self.submitter.submit(&entry.payload).await {
                Ok(()) => {
                    self.queue.complete(entry.id);
                    report.delivered += 1;
                }
                Err(e) => {
                    warn!(entry = %entry.id, "sync submission failed: {}", e);
                    self.queue.release(entry.id);
                    report.failed += 1;
                }
            }
        }

        info!(
            delivered = report.delivered,
            failed = report.failed,
            "sync pass finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Submitter scripted to fail for specific payloads, counting attempts
    struct ScriptedSubmitter {
        fail: Vec<String>,
        attempts: Mutex<HashMap<String, usize>>,
    }

    impl ScriptedSubmitter {
        fn new(fail: Vec<&str>) -> Self {
            Self {
                fail: fail.into_iter().map(String::from).collect(),
                attempts: Mutex::new(HashMap::new()),
            }
        }

        fn attempts(&self, payload: &str) -> usize {
            *self.attempts.lock().unwrap().get(payload).unwrap_or(&0)
        }
    }

    #[async_trait]
    impl QueueSubmitter<String> for ScriptedSubmitter {
        async fn submit(&self, payload: &String) -> Result<(), SubmitError> {
            *self.attempts.lock().unwrap().entry(payload.clone()).or_insert(0) += 1;
            if self.fail.contains(payload) {
                Err(SubmitError::Network("offline".into()))
            } else {
                Ok(())
            }
        }
    }

    fn queue_at(dir: &tempfile::TempDir) -> Arc<OfflineQueue<String>> {
        Arc::new(OfflineQueue::open(dir.path().join("queue.json")).unwrap())
    }

    #[tokio::test]
    async fn partial_failure_keeps_only_the_failing_entry() {
        let dir = tempfile::tempdir().unwrap();
        let queue = queue_at(&dir);
        queue.enqueue("bad".to_string());
        queue.enqueue("good".to_string());

        let submitter = Arc::new(ScriptedSubmitter::new(vec!["bad"]));
        let coordinator = SyncCoordinator::new(queue.clone(), submitter.clone());

        let report = coordinator.sync().await;
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 1);

        let pending = queue.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].payload, "bad");
    }

    #[tokio::test]
    async fn failed_entries_retry_on_next_sync() {
        let dir = tempfile::tempdir().unwrap();
        let queue = queue_at(&dir);
        queue.enqueue("flaky".to_string());

        let failing = Arc::new(ScriptedSubmitter::new(vec!["flaky"]));
        let coordinator = SyncCoordinator::new(queue.clone(), failing);
        coordinator.sync().await;
        assert_eq!(queue.len(), 1);

        // Connectivity restored
        let working = Arc::new(ScriptedSubmitter::new(vec![]));
        let coordinator = SyncCoordinator::new(queue.clone(), working);
        let report = coordinator.sync().await;
        assert_eq!(report.delivered, 1);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn concurrent_sync_never_double_submits() {
        let dir = tempfile::tempdir().unwrap();
        let queue = queue_at(&dir);
        for i in 0..5 {
            queue.enqueue(format!("report-{i}"));
        }

        let submitter = Arc::new(ScriptedSubmitter::new(vec![]));
        let coordinator =
            Arc::new(SyncCoordinator::new(queue.clone(), submitter.clone()));

        let a = tokio::spawn({
            let c = coordinator.clone();
            async move { c.sync().await }
        });
        let b = tokio::spawn({
            let c = coordinator.clone();
            async move { c.sync().await }
        });
        let (ra, rb) = (a.await.unwrap(), b.await.unwrap());

        assert_eq!(ra.delivered + rb.delivered, 5);
        assert!(queue.is_empty());
        for i in 0..5 {
            assert_eq!(submitter.attempts(&format!("report-{i}")), 1);
        }
    }
}
