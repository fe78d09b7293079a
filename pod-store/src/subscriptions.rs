//! Subscribe and unsubscribe.
//!
//! A user holds at most one subscription per canonical podcast, whichever
//! alias or device it was reached through. Both operations first resolve
//! the podcast they are handed to its current canonical record, so a
//! reference taken before a merge keeps working after it.

use crate::error::{AccountError, Result};
use crate::storage::AccountStore;
use crate::sync_groups::ensure_owner;
use pod_types::{DeviceId, FeedUrl, Podcast, Subscription, UserId};

/// The current canonical record for `podcast`.
///
/// URLs only leave a podcast when it is merged away, so if any URL the
/// caller's copy carried now belongs to a different podcast, that podcast
/// is the survivor. This also covers a source whose deletion failed after
/// it was stripped. Otherwise the fresh row for the id is returned.
pub async fn resolve_canonical<S>(store: &S, podcast: &Podcast) -> Result<Podcast>
where
    S: AccountStore + ?Sized,
{
    for url in &podcast.urls {
        if let Some(owner) = store.podcast_for_url(url).await? {
            if owner.id != podcast.id {
                tracing::debug!("Podcast {} resolved to {} via {}", podcast.id, owner.id, url);
                return Ok(owner);
            }
        }
    }

    store
        .get_podcast(&podcast.id)
        .await?
        .ok_or(AccountError::PodcastNotFound(podcast.id))
}

async fn owned_device<S>(store: &S, user: &UserId, device: &DeviceId) -> Result<()>
where
    S: AccountStore + ?Sized,
{
    let device = store
        .get_device(device)
        .await?
        .ok_or(AccountError::DeviceNotFound(*device))?;
    ensure_owner(&device, user)
}

/// Subscribe `user` to `podcast` from `device`.
///
/// Returns the user's subscription, existing or new. Subscribing twice is
/// a no-op, as is losing an insert race to a concurrent subscribe.
pub async fn subscribe<S>(
    store: &S,
    podcast: &Podcast,
    user: &UserId,
    device: &DeviceId,
) -> Result<Subscription>
where
    S: AccountStore + ?Sized,
{
    owned_device(store, user, device).await?;
    let canonical = resolve_canonical(store, podcast).await?;

    if let Some(existing) = store.find_subscription(user, &canonical.id).await? {
        tracing::debug!("User {} already subscribed to {}", user, canonical.id);
        return Ok(existing);
    }

    match store.insert_subscription(user, device, &canonical.id).await {
        Ok(subscription) => {
            tracing::info!("User {} subscribed to {}", user, canonical.id);
            Ok(subscription)
        }
        Err(e) if e.is_conflict() => {
            tracing::debug!("Concurrent subscribe of {} to {}: {}", user, canonical.id, e);
            store
                .find_subscription(user, &canonical.id)
                .await?
                .ok_or_else(|| e.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Remove the subscription of `user` to `podcast`.
///
/// Returns whether a row was removed; removing nothing is not an error.
/// The row goes regardless of which of the user's devices created it.
pub async fn unsubscribe<S>(
    store: &S,
    podcast: &Podcast,
    user: &UserId,
    device: &DeviceId,
) -> Result<bool>
where
    S: AccountStore + ?Sized,
{
    owned_device(store, user, device).await?;
    let canonical = resolve_canonical(store, podcast).await?;

    let removed = store.delete_user_subscription(user, &canonical.id).await?;
    if removed {
        tracing::info!("User {} unsubscribed from {}", user, canonical.id);
    } else {
        tracing::debug!("User {} was not subscribed to {}", user, canonical.id);
    }
    Ok(removed)
}

/// [`subscribe`] through a feed URL, creating the podcast on first sight.
pub async fn subscribe_url<S>(
    store: &S,
    url: &FeedUrl,
    user: &UserId,
    device: &DeviceId,
) -> Result<Subscription>
where
    S: AccountStore + ?Sized,
{
    let podcast = store.get_or_create_podcast_for_url(url).await?;
    subscribe(store, &podcast, user, device).await
}

/// [`unsubscribe`] through a feed URL. An unknown URL removes nothing.
pub async fn unsubscribe_url<S>(
    store: &S,
    url: &FeedUrl,
    user: &UserId,
    device: &DeviceId,
) -> Result<bool>
where
    S: AccountStore + ?Sized,
{
    match store.podcast_for_url(url).await? {
        Some(podcast) => unsubscribe(store, &podcast, user, device).await,
        None => {
            owned_device(store, user, device).await?;
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;
    use pod_types::{Device, PodcastId, PodcastStats};

    fn url(s: &str) -> FeedUrl {
        FeedUrl::parse(s).unwrap()
    }

    async fn setup() -> (SqliteStore, UserId, Device, Device) {
        let store = SqliteStore::in_memory().await.unwrap();
        let user = store.create_user("alice").await.unwrap();
        let d1 = store.get_or_create_device(&user.id, "phone").await.unwrap();
        let d2 = store.get_or_create_device(&user.id, "laptop").await.unwrap();
        (store, user.id, d1, d2)
    }

    #[tokio::test]
    async fn subscribe_is_idempotent_across_devices() {
        let (store, user, d1, d2) = setup().await;
        let podcast = store
            .get_or_create_podcast_for_url(&url("http://example.com/feed.rss"))
            .await
            .unwrap();

        let first = subscribe(&store, &podcast, &user, &d1.id).await.unwrap();
        let second = subscribe(&store, &podcast, &user, &d2.id).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.device, d1.id);
        assert_eq!(store.subscriptions_for_user(&user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn subscribe_through_alias_reuses_row() {
        let (store, user, d1, _) = setup().await;
        let podcast = store
            .get_or_create_podcast_for_url(&url("http://example.com/feed.rss"))
            .await
            .unwrap();
        let alias = url("https://example.com/feed.rss");
        store.add_podcast_url(&podcast.id, &alias).await.unwrap();

        subscribe(&store, &podcast, &user, &d1.id).await.unwrap();
        subscribe_url(&store, &alias, &user, &d1.id).await.unwrap();
        assert_eq!(store.subscriptions_for_user(&user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unsubscribe_missing_is_noop() {
        let (store, user, d1, _) = setup().await;
        let podcast = store
            .get_or_create_podcast_for_url(&url("http://example.com/feed.rss"))
            .await
            .unwrap();

        assert!(!unsubscribe(&store, &podcast, &user, &d1.id).await.unwrap());
        assert!(!unsubscribe_url(&store, &url("http://unknown.example/"), &user, &d1.id)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn unsubscribe_from_other_device_removes_row() {
        let (store, user, d1, d2) = setup().await;
        let feed = url("http://example.com/feed.rss");
        subscribe_url(&store, &feed, &user, &d1.id).await.unwrap();

        assert!(unsubscribe_url(&store, &feed, &user, &d2.id).await.unwrap());
        assert!(store.subscriptions_for_user(&user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn foreign_device_is_rejected() {
        let (store, user, _, _) = setup().await;
        let bob = store.create_user("bob").await.unwrap();
        let bobs = store.get_or_create_device(&bob.id, "phone").await.unwrap();
        let feed = url("http://example.com/feed.rss");

        let err = subscribe_url(&store, &feed, &user, &bobs.id).await.unwrap_err();
        assert!(matches!(err, AccountError::OwnershipMismatch { .. }));
        let err = unsubscribe_url(&store, &feed, &user, &bobs.id).await.unwrap_err();
        assert!(matches!(err, AccountError::OwnershipMismatch { .. }));
    }

    #[tokio::test]
    async fn resolve_canonical_prefers_new_owner_of_held_url() {
        let (store, _, _, _) = setup().await;
        let feed = url("http://example.com/feed.rss");
        let target = store
            .get_or_create_podcast_for_url(&url("http://test.org/podcast/"))
            .await
            .unwrap();
        let source = store.get_or_create_podcast_for_url(&feed).await.unwrap();

        // Strip the source without deleting it.
        store.move_url(&feed, &source.id, &target.id).await.unwrap();
        assert!(store.get_podcast(&source.id).await.unwrap().unwrap().urls.is_empty());

        assert_eq!(resolve_canonical(&store, &source).await.unwrap().id, target.id);
        assert_eq!(resolve_canonical(&store, &target).await.unwrap().id, target.id);
    }

    #[tokio::test]
    async fn resolve_canonical_follows_urls() {
        let (store, _, _, _) = setup().await;
        let feed = url("http://example.com/feed.rss");
        let live = store.get_or_create_podcast_for_url(&feed).await.unwrap();

        let stale = Podcast {
            id: PodcastId::new(),
            urls: vec![url("http://gone.example/"), feed],
            stats: PodcastStats::default(),
            title: None,
        };
        assert_eq!(resolve_canonical(&store, &stale).await.unwrap().id, live.id);

        let lost = Podcast {
            urls: vec![url("http://gone.example/")],
            ..stale
        };
        let err = resolve_canonical(&store, &lost).await.unwrap_err();
        assert!(matches!(err, AccountError::PodcastNotFound(id) if id == lost.id));
    }
}
