//! The relation store.
//!
//! Persists users, devices, sync edges, podcasts with their URL aliases,
//! and subscriptions. The account operations in this crate only talk to
//! the [`AccountStore`] trait; [`SqliteStore`] is the shipped backend.
//!
//! Uniqueness is enforced by the store, not by callers: a write that would
//! create a second subscription for one (user, podcast) pair, or give a URL
//! to a second podcast, fails with [`StorageError::Conflict`]. The merge
//! and subscription layers rely on that to recover locally.

mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::StorageError;
use async_trait::async_trait;
use pod_types::{
    Device, DeviceId, FeedUrl, Podcast, PodcastId, PodcastStats, Subscription, SubscriptionId,
    SyncEdge, User, UserId,
};

/// Outcome of moving one URL alias between podcasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlMove {
    /// The alias now belongs to the target.
    Moved,
    /// The target already owned the alias.
    AlreadyOnTarget,
    /// The alias belongs to neither podcast (gone, or owned by a third one).
    NotOwned,
}

/// Trait for relation store backends.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Create a user with a unique username.
    async fn create_user(&self, username: &str) -> Result<User, StorageError>;

    /// Get a user by id.
    async fn get_user(&self, id: &UserId) -> Result<Option<User>, StorageError>;

    /// Get a user by username.
    async fn find_user(&self, username: &str) -> Result<Option<User>, StorageError>;

    /// Return the device `uid` of `user`, creating it if needed.
    async fn get_or_create_device(&self, user: &UserId, uid: &str)
        -> Result<Device, StorageError>;

    /// Get a device by id.
    async fn get_device(&self, id: &DeviceId) -> Result<Option<Device>, StorageError>;

    /// Get a device by owner and label.
    async fn find_device(&self, user: &UserId, uid: &str)
        -> Result<Option<Device>, StorageError>;

    /// All devices of a user, in creation order.
    async fn devices_for_user(&self, user: &UserId) -> Result<Vec<Device>, StorageError>;

    /// Delete a device together with its sync edges.
    ///
    /// Subscriptions it created move to the user's oldest remaining device;
    /// they are deleted only with the user's last device.
    ///
    /// Returns `false` if the device did not exist.
    async fn delete_device(&self, id: &DeviceId) -> Result<bool, StorageError>;

    /// All sync edges among a user's devices, in creation order.
    async fn edges_for_user(&self, user: &UserId) -> Result<Vec<SyncEdge>, StorageError>;

    /// Record an edge between two devices.
    ///
    /// Returns `None` if exactly this edge already exists.
    async fn insert_edge(
        &self,
        a: &DeviceId,
        b: &DeviceId,
    ) -> Result<Option<SyncEdge>, StorageError>;

    /// Return the podcast owning `url`, creating a fresh one if no podcast does.
    async fn get_or_create_podcast_for_url(&self, url: &FeedUrl)
        -> Result<Podcast, StorageError>;

    /// Get a podcast by id.
    async fn get_podcast(&self, id: &PodcastId) -> Result<Option<Podcast>, StorageError>;

    /// Get the podcast a URL alias currently resolves to.
    async fn podcast_for_url(&self, url: &FeedUrl) -> Result<Option<Podcast>, StorageError>;

    /// Attach another URL alias to a podcast.
    ///
    /// A no-op if the podcast already owns it; a conflict if another does.
    async fn add_podcast_url(&self, podcast: &PodcastId, url: &FeedUrl)
        -> Result<(), StorageError>;

    /// Overwrite the aggregate counters of a podcast.
    async fn set_podcast_stats(
        &self,
        podcast: &PodcastId,
        stats: PodcastStats,
    ) -> Result<(), StorageError>;

    /// Move `url` from `from` to `to`, appending it to the target's aliases.
    async fn move_url(
        &self,
        url: &FeedUrl,
        from: &PodcastId,
        to: &PodcastId,
    ) -> Result<UrlMove, StorageError>;

    /// Atomically add the counters of `from` to `to` and zero them on `from`.
    ///
    /// Returns the counters that moved; zero on a repeated call.
    async fn roll_stats(&self, from: &PodcastId, to: &PodcastId)
        -> Result<PodcastStats, StorageError>;

    /// Delete a podcast row.
    ///
    /// Fails if anything still references it. Returns `false` if the
    /// podcast did not exist.
    async fn delete_podcast(&self, id: &PodcastId) -> Result<bool, StorageError>;

    /// All subscriptions on a podcast.
    async fn subscriptions_for_podcast(
        &self,
        podcast: &PodcastId,
    ) -> Result<Vec<Subscription>, StorageError>;

    /// All subscriptions of a user, oldest first.
    async fn subscriptions_for_user(&self, user: &UserId)
        -> Result<Vec<Subscription>, StorageError>;

    /// The subscription of `user` to `podcast`, if any.
    async fn find_subscription(
        &self,
        user: &UserId,
        podcast: &PodcastId,
    ) -> Result<Option<Subscription>, StorageError>;

    /// Insert a subscription; a conflict if the user already has one on the podcast.
    async fn insert_subscription(
        &self,
        user: &UserId,
        device: &DeviceId,
        podcast: &PodcastId,
    ) -> Result<Subscription, StorageError>;

    /// Re-point a subscription at another podcast; a conflict on duplicate.
    async fn move_subscription(
        &self,
        id: &SubscriptionId,
        to: &PodcastId,
    ) -> Result<(), StorageError>;

    /// Delete one subscription row. Returns `false` if it did not exist.
    async fn delete_subscription(&self, id: &SubscriptionId) -> Result<bool, StorageError>;

    /// Delete the subscription of `user` to `podcast`. Returns `false` if none existed.
    async fn delete_user_subscription(
        &self,
        user: &UserId,
        podcast: &PodcastId,
    ) -> Result<bool, StorageError>;
}
