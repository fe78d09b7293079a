//! Podcast merging.
//!
//! Collapses duplicate podcast records into one canonical record. The
//! merge is an ordered sequence of steps over podcast ids, each safe to
//! repeat:
//!
//! 1. Strip every source: move its URL aliases to the target, move its
//!    subscriptions (discarding those the target already has for the
//!    same user), and roll its counters into the target.
//! 2. Delete every stripped source.
//!
//! A crash or a failed deletion leaves sources stripped, never half
//! stripped, and running the same merge again converges.

use crate::error::{MergeError, MergeResult, StorageError};
use crate::storage::{AccountStore, UrlMove};
use pod_core::{ActionLog, MergeAction, MergeCounter, MergePlan};
use pod_types::{FeedUrl, Podcast, PodcastId};

/// Merges podcasts into the first one of the list.
///
/// # Mutual exclusion
///
/// Two merges sharing any podcast id must never run at the same time, or
/// one of them may read a source the other has already deleted. The
/// merger does not lock anything itself; callers serialize merges, for
/// example through [`spawn_merge_worker`](crate::merge_worker::spawn_merge_worker).
///
/// The counter and log belong to the caller. The merge only appends to
/// them, so one pair can collect several merges.
pub struct PodcastMerger<'a, S: AccountStore + ?Sized> {
    store: &'a S,
    podcasts: Vec<Podcast>,
    counter: &'a mut MergeCounter,
    actions: &'a mut ActionLog,
}

impl<'a, S: AccountStore + ?Sized> PodcastMerger<'a, S> {
    /// Prepare a merge of `podcasts`; the first element is the target.
    pub fn new(
        store: &'a S,
        podcasts: Vec<Podcast>,
        counter: &'a mut MergeCounter,
        actions: &'a mut ActionLog,
    ) -> Self {
        Self {
            store,
            podcasts,
            counter,
            actions,
        }
    }

    /// Run the merge and return the canonical podcast id.
    ///
    /// # Errors
    ///
    /// - [`MergeError::Plan`] if fewer than two distinct podcasts were given.
    /// - [`MergeError::TargetMissing`] if the target no longer exists.
    /// - [`MergeError::Storage`] if stripping a source failed; the merge
    ///   can be retried.
    /// - [`MergeError::MergeDeletionFailure`] if a stripped source could
    ///   not be deleted. Every source was still attempted.
    pub async fn merge(mut self) -> MergeResult<PodcastId> {
        let plan = MergePlan::new(&self.podcasts)?;
        let target = plan.target().id;

        if self.store.get_podcast(&target).await?.is_none() {
            return Err(MergeError::TargetMissing(target));
        }

        let mut stripped = Vec::with_capacity(plan.sources().len());
        for source in plan.sources() {
            if self.strip(source, &target).await? {
                stripped.push(source.id);
            }
        }

        let mut failures: Vec<(PodcastId, StorageError)> = Vec::new();
        for source in stripped {
            match self.store.delete_podcast(&source).await {
                Ok(true) => self.record(MergeAction::SourceDeleted { source }),
                Ok(false) => self.record(MergeAction::SourceMissing { source }),
                Err(e) => {
                    tracing::warn!("Could not delete merged podcast {}: {}", source, e);
                    failures.push((source, e));
                }
            }
        }

        let failed = failures.len();
        if let Some((source_id, error)) = failures.into_iter().next() {
            return Err(MergeError::MergeDeletionFailure {
                source_id,
                failed,
                error,
            });
        }

        tracing::info!(
            "Merged {} podcast(s) into {}",
            plan.sources().len(),
            target
        );
        Ok(target)
    }

    /// Move everything off one source. Returns `false` if it no longer exists.
    async fn strip(&mut self, source: &Podcast, target: &PodcastId) -> MergeResult<bool> {
        let Some(fresh) = self.store.get_podcast(&source.id).await? else {
            tracing::info!("Podcast {} already merged or deleted", source.id);
            self.record(MergeAction::SourceMissing { source: source.id });
            return Ok(false);
        };

        // Aliases the caller saw but the store no longer lists were moved
        // by an earlier, interrupted attempt.
        let mut urls: Vec<FeedUrl> = fresh.urls.clone();
        urls.extend(source.urls.iter().filter(|u| !fresh.has_url(u)).cloned());

        for url in urls {
            match self.store.move_url(&url, &fresh.id, target).await? {
                UrlMove::Moved => self.record(MergeAction::UrlRedirected {
                    url,
                    from: fresh.id,
                    to: *target,
                }),
                UrlMove::AlreadyOnTarget => {
                    tracing::debug!("Target {} already owns {}", target, url);
                    self.record(MergeAction::DuplicateUrl {
                        url,
                        source: fresh.id,
                    });
                }
                UrlMove::NotOwned => {
                    tracing::debug!("Url {} no longer belongs to {}, skipping", url, fresh.id);
                }
            }
        }

        for subscription in self.store.subscriptions_for_podcast(&fresh.id).await? {
            match self.store.move_subscription(&subscription.id, target).await {
                Ok(()) => self.record(MergeAction::SubscriptionMoved {
                    subscription: subscription.id,
                    user: subscription.user,
                    from: fresh.id,
                    to: *target,
                }),
                Err(e) if e.is_conflict() => {
                    tracing::warn!(
                        "User {} already subscribed to {}, discarding subscription {}",
                        subscription.user,
                        target,
                        subscription.id
                    );
                    self.store.delete_subscription(&subscription.id).await?;
                    self.record(MergeAction::SubscriptionConflict {
                        subscription: subscription.id,
                        user: subscription.user,
                        source: fresh.id,
                        target: *target,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        let stats = self.store.roll_stats(&fresh.id, target).await?;
        if !stats.is_zero() {
            self.record(MergeAction::StatsRolled {
                source: fresh.id,
                target: *target,
                stats,
            });
        }

        Ok(true)
    }

    fn record(&mut self, action: MergeAction) {
        self.counter.record(&action);
        self.actions.push(action);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;
    use pod_core::MergePlanError;
    use pod_types::PodcastStats;

    fn url(s: &str) -> FeedUrl {
        FeedUrl::parse(s).unwrap()
    }

    async fn merge(
        store: &SqliteStore,
        podcasts: Vec<Podcast>,
        counter: &mut MergeCounter,
        actions: &mut ActionLog,
    ) -> MergeResult<PodcastId> {
        PodcastMerger::new(store, podcasts, counter, actions)
            .merge()
            .await
    }

    #[tokio::test]
    async fn merge_moves_urls_and_deletes_source() {
        let store = SqliteStore::in_memory().await.unwrap();
        let p1 = store
            .get_or_create_podcast_for_url(&url("http://example.com/feed.rss"))
            .await
            .unwrap();
        let u2 = url("http://test.org/podcast/");
        let p2 = store.get_or_create_podcast_for_url(&u2).await.unwrap();

        let mut counter = MergeCounter::default();
        let mut actions = ActionLog::new();
        let id = merge(&store, vec![p1.clone(), p2.clone()], &mut counter, &mut actions)
            .await
            .unwrap();

        assert_eq!(id, p1.id);
        assert_eq!(store.podcast_for_url(&u2).await.unwrap().unwrap().id, p1.id);
        assert!(store.get_podcast(&p2.id).await.unwrap().is_none());
        assert_eq!(counter.urls_redirected, 1);
        assert_eq!(counter.podcasts_deleted, 1);
        assert_eq!(actions.len(), 2);
    }

    #[tokio::test]
    async fn merge_rolls_stats_into_target() {
        let store = SqliteStore::in_memory().await.unwrap();
        let p1 = store
            .get_or_create_podcast_for_url(&url("http://example.com/feed.rss"))
            .await
            .unwrap();
        let p2 = store
            .get_or_create_podcast_for_url(&url("http://test.org/podcast/"))
            .await
            .unwrap();
        store
            .set_podcast_stats(&p2.id, PodcastStats { subscribers: 3, listeners: 2 })
            .await
            .unwrap();

        let mut counter = MergeCounter {
            subscribers: 10,
            ..MergeCounter::default()
        };
        let mut actions = ActionLog::new();
        merge(&store, vec![p1.clone(), p2], &mut counter, &mut actions)
            .await
            .unwrap();

        // accumulates on top of what the caller already had
        assert_eq!(counter.subscribers, 13);
        assert_eq!(counter.listeners, 2);
        let p1 = store.get_podcast(&p1.id).await.unwrap().unwrap();
        assert_eq!(p1.stats, PodcastStats { subscribers: 3, listeners: 2 });
    }

    #[tokio::test]
    async fn conflicting_subscription_is_discarded() {
        let store = SqliteStore::in_memory().await.unwrap();
        let user = store.create_user("alice").await.unwrap();
        let device = store.get_or_create_device(&user.id, "phone").await.unwrap();
        let p1 = store
            .get_or_create_podcast_for_url(&url("http://example.com/feed.rss"))
            .await
            .unwrap();
        let p2 = store
            .get_or_create_podcast_for_url(&url("http://test.org/podcast/"))
            .await
            .unwrap();
        let kept = store
            .insert_subscription(&user.id, &device.id, &p1.id)
            .await
            .unwrap();
        store
            .insert_subscription(&user.id, &device.id, &p2.id)
            .await
            .unwrap();

        let mut counter = MergeCounter::default();
        let mut actions = ActionLog::new();
        merge(&store, vec![p1.clone(), p2], &mut counter, &mut actions)
            .await
            .unwrap();

        let subscriptions = store.subscriptions_for_user(&user.id).await.unwrap();
        assert_eq!(subscriptions.len(), 1);
        assert_eq!(subscriptions[0].id, kept.id);
        assert_eq!(counter.subscription_conflicts, 1);
        assert_eq!(counter.subscriptions_merged, 0);
    }

    #[tokio::test]
    async fn merge_needs_two_podcasts() {
        let store = SqliteStore::in_memory().await.unwrap();
        let p1 = store
            .get_or_create_podcast_for_url(&url("http://example.com/feed.rss"))
            .await
            .unwrap();

        let mut counter = MergeCounter::default();
        let mut actions = ActionLog::new();
        let err = merge(&store, vec![p1.clone(), p1], &mut counter, &mut actions)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MergeError::Plan(MergePlanError::NotEnoughPodcasts { distinct: 1 })
        ));
        assert!(counter.is_empty());
    }

    #[tokio::test]
    async fn missing_target_is_an_error() {
        let store = SqliteStore::in_memory().await.unwrap();
        let p2 = store
            .get_or_create_podcast_for_url(&url("http://test.org/podcast/"))
            .await
            .unwrap();
        let ghost = Podcast {
            id: PodcastId::new(),
            urls: vec![url("http://gone.example/")],
            stats: PodcastStats::default(),
            title: None,
        };

        let mut counter = MergeCounter::default();
        let mut actions = ActionLog::new();
        let err = merge(&store, vec![ghost.clone(), p2.clone()], &mut counter, &mut actions)
            .await
            .unwrap_err();
        assert!(matches!(err, MergeError::TargetMissing(id) if id == ghost.id));
        assert!(store.get_podcast(&p2.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn duplicate_url_on_stale_copy_is_logged() {
        let store = SqliteStore::in_memory().await.unwrap();
        let p1 = store
            .get_or_create_podcast_for_url(&url("http://example.com/feed.rss"))
            .await
            .unwrap();
        let shared = url("http://test.org/podcast/");
        let p2 = store
            .get_or_create_podcast_for_url(&url("http://test.org/podcast.xml"))
            .await
            .unwrap();
        store.add_podcast_url(&p1.id, &shared).await.unwrap();

        // The caller believes the shared alias still belongs to p2.
        let mut stale = p2.clone();
        stale.urls.push(shared.clone());

        let mut counter = MergeCounter::default();
        let mut actions = ActionLog::new();
        merge(&store, vec![p1.clone(), stale], &mut counter, &mut actions)
            .await
            .unwrap();

        assert_eq!(counter.urls_redirected, 1);
        assert_eq!(counter.duplicate_urls, 1);
        assert!(actions
            .iter()
            .any(|a| matches!(a, MergeAction::DuplicateUrl { url, .. } if *url == shared)));
        let p1 = store.get_podcast(&p1.id).await.unwrap().unwrap();
        assert_eq!(p1.urls.len(), 3);
    }
}
