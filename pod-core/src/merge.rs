//! Merge planning and reporting.
//!
//! The store-backed merge lives in `pod-store`. This module holds the
//! pieces that need no I/O: choosing target and sources from the caller's
//! ordered input, and the caller-owned accumulators the merge reports
//! into.

use pod_types::{FeedUrl, Podcast, PodcastId, PodcastStats, SubscriptionId, UserId};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Error building a merge plan.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergePlanError {
    /// A merge needs a target and at least one distinct source.
    #[error("merge needs at least two distinct podcasts, got {distinct}")]
    NotEnoughPodcasts {
        /// Number of distinct podcasts supplied.
        distinct: usize,
    },
}

/// Target and sources of one merge.
///
/// The first podcast is the survivor. Repeated ids, and any repetition of
/// the target among the sources, are dropped. The plan does not re-rank:
/// picking a sensible target is the caller's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePlan {
    target: Podcast,
    sources: Vec<Podcast>,
}

impl MergePlan {
    /// Build a plan from an ordered podcast list.
    pub fn new(podcasts: &[Podcast]) -> Result<Self, MergePlanError> {
        let mut seen = HashSet::new();
        let mut distinct = podcasts.iter().filter(|p| seen.insert(p.id)).cloned();

        let target = distinct
            .next()
            .ok_or(MergePlanError::NotEnoughPodcasts { distinct: 0 })?;
        let sources: Vec<Podcast> = distinct.collect();
        if sources.is_empty() {
            return Err(MergePlanError::NotEnoughPodcasts { distinct: 1 });
        }

        Ok(Self { target, sources })
    }

    /// The surviving podcast.
    pub fn target(&self) -> &Podcast {
        &self.target
    }

    /// The podcasts to absorb, in input order.
    pub fn sources(&self) -> &[Podcast] {
        &self.sources
    }

    /// Every podcast id the plan touches, target first.
    pub fn podcast_ids(&self) -> Vec<PodcastId> {
        std::iter::once(self.target.id)
            .chain(self.sources.iter().map(|p| p.id))
            .collect()
    }
}

/// One thing a merge did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MergeAction {
    /// A URL alias now resolves to the target.
    UrlRedirected {
        /// The alias.
        url: FeedUrl,
        /// Podcast it was taken from.
        from: PodcastId,
        /// Podcast it now belongs to.
        to: PodcastId,
    },
    /// The target already owned the alias; the source copy was dropped.
    DuplicateUrl {
        /// The alias.
        url: FeedUrl,
        /// Podcast that held the duplicate.
        source: PodcastId,
    },
    /// A subscription was re-pointed at the target.
    SubscriptionMoved {
        /// The subscription row.
        subscription: SubscriptionId,
        /// Its user.
        user: UserId,
        /// Podcast it was taken from.
        from: PodcastId,
        /// Podcast it now points at.
        to: PodcastId,
    },
    /// The user already had a target subscription; the source row was discarded.
    SubscriptionConflict {
        /// The discarded subscription row.
        subscription: SubscriptionId,
        /// Its user.
        user: UserId,
        /// Podcast it belonged to.
        source: PodcastId,
        /// Podcast that kept the user's subscription.
        target: PodcastId,
    },
    /// Source statistics were added to the target.
    StatsRolled {
        /// Podcast the counters came from.
        source: PodcastId,
        /// Podcast that absorbed them.
        target: PodcastId,
        /// The absorbed counters.
        stats: PodcastStats,
    },
    /// A stripped source was deleted.
    SourceDeleted {
        /// The deleted podcast.
        source: PodcastId,
    },
    /// A source no longer existed when the merge reached it.
    SourceMissing {
        /// The missing podcast.
        source: PodcastId,
    },
}

impl fmt::Display for MergeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UrlRedirected { url, from, to } => {
                write!(f, "redirected url {} from podcast {} to {}", url, from, to)
            }
            Self::DuplicateUrl { url, source } => {
                write!(f, "dropped duplicate url {} of podcast {}", url, source)
            }
            Self::SubscriptionMoved {
                subscription,
                user,
                from,
                to,
            } => write!(
                f,
                "moved subscription {} of user {} from podcast {} to {}",
                subscription, user, from, to
            ),
            Self::SubscriptionConflict {
                subscription,
                user,
                source,
                target,
            } => write!(
                f,
                "discarded subscription {} of user {} on podcast {}: already subscribed to {}",
                subscription, user, source, target
            ),
            Self::StatsRolled {
                source,
                target,
                stats,
            } => write!(
                f,
                "added {} subscribers and {} listeners of podcast {} to {}",
                stats.subscribers, stats.listeners, source, target
            ),
            Self::SourceDeleted { source } => write!(f, "deleted podcast {}", source),
            Self::SourceMissing { source } => {
                write!(f, "podcast {} already gone, nothing to merge", source)
            }
        }
    }
}

/// Caller-owned log of merge actions, appended to and never cleared by a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ActionLog(Vec<MergeAction>);

impl ActionLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an action.
    pub fn push(&mut self, action: MergeAction) {
        self.0.push(action);
    }

    /// All actions in the order they happened.
    pub fn actions(&self) -> &[MergeAction] {
        &self.0
    }

    /// Number of recorded actions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the actions.
    pub fn iter(&self) -> std::slice::Iter<'_, MergeAction> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a ActionLog {
    type Item = &'a MergeAction;
    type IntoIter = std::slice::Iter<'a, MergeAction>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Caller-owned running totals of merge work.
///
/// Counters only ever grow. Several merges may report into the same
/// counter; the caller decides when to flush or reset it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeCounter {
    /// URL aliases moved to a target.
    pub urls_redirected: u64,
    /// URL aliases dropped because the target already had them.
    pub duplicate_urls: u64,
    /// Subscriptions re-pointed at a target.
    pub subscriptions_merged: u64,
    /// Subscriptions discarded because the user already had one on the target.
    pub subscription_conflicts: u64,
    /// Subscriber counts rolled into targets.
    pub subscribers: u64,
    /// Listener counts rolled into targets.
    pub listeners: u64,
    /// Source podcasts deleted.
    pub podcasts_deleted: u64,
    /// Sources that were already gone.
    pub sources_missing: u64,
}

impl MergeCounter {
    /// Count one action.
    pub fn record(&mut self, action: &MergeAction) {
        match action {
            MergeAction::UrlRedirected { .. } => self.urls_redirected += 1,
            MergeAction::DuplicateUrl { .. } => self.duplicate_urls += 1,
            MergeAction::SubscriptionMoved { .. } => self.subscriptions_merged += 1,
            MergeAction::SubscriptionConflict { .. } => self.subscription_conflicts += 1,
            MergeAction::StatsRolled { stats, .. } => {
                self.subscribers = self.subscribers.saturating_add(stats.subscribers);
                self.listeners = self.listeners.saturating_add(stats.listeners);
            }
            MergeAction::SourceDeleted { .. } => self.podcasts_deleted += 1,
            MergeAction::SourceMissing { .. } => self.sources_missing += 1,
        }
    }

    /// Whether nothing has been counted.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for MergeCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} urls redirected ({} duplicate), {} subscriptions merged ({} conflicts), \
             {} subscribers / {} listeners rolled up, {} podcasts deleted, {} already gone",
            self.urls_redirected,
            self.duplicate_urls,
            self.subscriptions_merged,
            self.subscription_conflicts,
            self.subscribers,
            self.listeners,
            self.podcasts_deleted,
            self.sources_missing
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn podcast(url: &str) -> Podcast {
        Podcast {
            id: PodcastId::new(),
            urls: vec![FeedUrl::parse(url).unwrap()],
            stats: PodcastStats::default(),
            title: None,
        }
    }

    #[test]
    fn plan_first_is_target() {
        let p1 = podcast("http://example.com/feed.rss");
        let p2 = podcast("http://test.org/podcast/");
        let p3 = podcast("http://test.org/other/");

        let plan = MergePlan::new(&[p1.clone(), p2.clone(), p3.clone()]).unwrap();
        assert_eq!(plan.target().id, p1.id);
        let sources: Vec<_> = plan.sources().iter().map(|p| p.id).collect();
        assert_eq!(sources, [p2.id, p3.id]);
        assert_eq!(plan.podcast_ids(), [p1.id, p2.id, p3.id]);
    }

    #[test]
    fn plan_drops_repeats() {
        let p1 = podcast("http://example.com/feed.rss");
        let p2 = podcast("http://test.org/podcast/");

        let plan = MergePlan::new(&[p1.clone(), p2.clone(), p1.clone(), p2.clone()]).unwrap();
        assert_eq!(plan.sources().len(), 1);
        assert_eq!(plan.sources()[0].id, p2.id);
    }

    #[test]
    fn plan_needs_two_distinct() {
        assert_eq!(
            MergePlan::new(&[]).unwrap_err(),
            MergePlanError::NotEnoughPodcasts { distinct: 0 }
        );

        let p1 = podcast("http://example.com/feed.rss");
        assert_eq!(
            MergePlan::new(&[p1.clone(), p1]).unwrap_err(),
            MergePlanError::NotEnoughPodcasts { distinct: 1 }
        );
    }

    #[test]
    fn counter_records_actions() {
        let mut counter = MergeCounter::default();
        assert!(counter.is_empty());

        let source = PodcastId::new();
        let target = PodcastId::new();
        counter.record(&MergeAction::SourceDeleted { source });
        counter.record(&MergeAction::StatsRolled {
            source,
            target,
            stats: PodcastStats {
                subscribers: 4,
                listeners: 2,
            },
        });
        counter.record(&MergeAction::StatsRolled {
            source,
            target,
            stats: PodcastStats {
                subscribers: 1,
                listeners: 0,
            },
        });

        assert_eq!(counter.podcasts_deleted, 1);
        assert_eq!(counter.subscribers, 5);
        assert_eq!(counter.listeners, 2);
        assert!(!counter.is_empty());
    }

    #[test]
    fn action_display_is_readable() {
        let url = FeedUrl::parse("http://test.org/podcast/").unwrap();
        let source = PodcastId::new();
        let action = MergeAction::DuplicateUrl {
            url,
            source,
        };
        assert_eq!(
            action.to_string(),
            format!("dropped duplicate url http://test.org/podcast/ of podcast {}", source)
        );
    }

    #[test]
    fn log_appends_in_order() {
        let mut log = ActionLog::new();
        let a = PodcastId::new();
        let b = PodcastId::new();
        log.push(MergeAction::SourceMissing { source: a });
        log.push(MergeAction::SourceDeleted { source: b });

        assert_eq!(log.len(), 2);
        assert_eq!(log.actions()[0], MergeAction::SourceMissing { source: a });
        assert_eq!(log.iter().count(), 2);
    }

    #[test]
    fn action_serializes_with_tag() {
        let source = PodcastId::new();
        let json = serde_json::to_string(&MergeAction::SourceDeleted { source }).unwrap();
        assert!(json.contains("\"action\":\"source_deleted\""));
    }
}
