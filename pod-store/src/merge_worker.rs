//! Background merge worker.
//!
//! Runs queued merges one at a time, so merges submitted through one
//! [`MergeQueue`] never overlap within the process.

use crate::config::MergeConfig;
use crate::error::{MergeError, MergeResult};
use crate::merge::PodcastMerger;
use crate::storage::AccountStore;
use pod_core::{ActionLog, MergeCounter};
use pod_types::{Podcast, PodcastId};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Outcome of one queued merge.
#[derive(Debug)]
pub struct MergeReport {
    /// Canonical podcast id, or why the merge failed.
    pub result: MergeResult<PodcastId>,
    /// What the merge counted, including on failure.
    pub counter: MergeCounter,
    /// What the merge did, including on failure.
    pub actions: ActionLog,
}

struct MergeJob {
    podcasts: Vec<Podcast>,
    reply: oneshot::Sender<MergeReport>,
}

/// Handle for submitting merges to the worker.
#[derive(Debug, Clone)]
pub struct MergeQueue {
    tx: mpsc::Sender<MergeJob>,
}

impl MergeQueue {
    /// Queue a merge and wait for its report.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::WorkerStopped`] if the worker is not running.
    pub async fn submit(&self, podcasts: Vec<Podcast>) -> MergeResult<MergeReport> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(MergeJob { podcasts, reply })
            .await
            .map_err(|_| MergeError::WorkerStopped)?;
        rx.await.map_err(|_| MergeError::WorkerStopped)
    }
}

impl std::fmt::Debug for MergeJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeJob")
            .field("podcasts", &self.podcasts.len())
            .finish_non_exhaustive()
    }
}

/// Spawn the merge worker.
///
/// The task ends once every [`MergeQueue`] clone is dropped. When the
/// worker is disabled it returns immediately and submissions fail with
/// [`MergeError::WorkerStopped`].
pub fn spawn_merge_worker<S>(
    store: Arc<S>,
    config: MergeConfig,
) -> (MergeQueue, tokio::task::JoinHandle<()>)
where
    S: AccountStore + 'static,
{
    let (tx, mut rx) = mpsc::channel::<MergeJob>(config.queue_capacity.max(1));

    let handle = tokio::spawn(async move {
        if !config.enabled {
            tracing::info!("Merge worker disabled");
            return;
        }

        tracing::info!(
            "Merge worker started (queue capacity: {})",
            config.queue_capacity
        );

        while let Some(job) = rx.recv().await {
            let mut counter = MergeCounter::default();
            let mut actions = ActionLog::new();
            let result =
                PodcastMerger::new(store.as_ref(), job.podcasts, &mut counter, &mut actions)
                    .merge()
                    .await;

            match &result {
                Ok(target) => tracing::info!("Merge into {} done: {}", target, counter),
                Err(e) => tracing::error!("Merge error: {}", e),
            }

            if job
                .reply
                .send(MergeReport {
                    result,
                    counter,
                    actions,
                })
                .is_err()
            {
                tracing::debug!("Merge submitter went away before the report");
            }
        }

        tracing::info!("Merge worker stopped");
    });

    (MergeQueue { tx }, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;
    use pod_types::FeedUrl;
    use std::time::Duration;

    fn url(s: &str) -> FeedUrl {
        FeedUrl::parse(s).unwrap()
    }

    fn test_merge_config() -> MergeConfig {
        MergeConfig {
            queue_capacity: 4,
            enabled: true,
        }
    }

    #[tokio::test]
    async fn worker_runs_submitted_merge() {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let p1 = store
            .get_or_create_podcast_for_url(&url("http://example.com/feed.rss"))
            .await
            .unwrap();
        let p2 = store
            .get_or_create_podcast_for_url(&url("http://test.org/podcast/"))
            .await
            .unwrap();

        let (queue, handle) = spawn_merge_worker(store.clone(), test_merge_config());
        let report = queue.submit(vec![p1.clone(), p2.clone()]).await.unwrap();
        assert_eq!(report.result.unwrap(), p1.id);
        assert_eq!(report.counter.podcasts_deleted, 1);
        assert!(!report.actions.is_empty());

        // Second submission of the same input finds the source gone.
        let report = queue.submit(vec![p1.clone(), p2]).await.unwrap();
        assert_eq!(report.result.unwrap(), p1.id);
        assert_eq!(report.counter.sources_missing, 1);
        assert_eq!(report.counter.podcasts_deleted, 0);

        drop(queue);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("Worker should stop once the queue is dropped")
            .expect("Worker should not panic");
    }

    #[tokio::test]
    async fn worker_reports_merge_errors() {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let (queue, _handle) = spawn_merge_worker(store, test_merge_config());

        let report = queue.submit(Vec::new()).await.unwrap();
        assert!(matches!(report.result, Err(MergeError::Plan(_))));
    }

    #[tokio::test]
    async fn worker_disabled() {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let config = MergeConfig {
            queue_capacity: 4,
            enabled: false,
        };

        let (queue, handle) = spawn_merge_worker(store, config);

        // Task should complete immediately when disabled
        tokio::time::timeout(Duration::from_millis(100), handle)
            .await
            .expect("Task should complete when disabled")
            .expect("Task should not panic");

        let err = queue.submit(Vec::new()).await.unwrap_err();
        assert!(matches!(err, MergeError::WorkerStopped));
    }
}
