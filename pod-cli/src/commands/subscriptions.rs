//! Subscribe, unsubscribe and list subscriptions.

use anyhow::Result;
use pod_store::{subscribe_url, unsubscribe_url, AccountStore};
use std::collections::HashMap;

use super::{find_device, find_user, parse_url};

/// Run `subscribe`.
pub async fn subscribe<S: AccountStore>(store: &S, user: &str, uid: &str, url: &str) -> Result<()> {
    let url = parse_url(url)?;
    let user = find_user(store, user).await?;
    let device = find_device(store, &user, uid).await?;

    let subscription = subscribe_url(store, &url, &user.id, &device.id).await?;
    println!(
        "Subscribed {} to {} (podcast {})",
        user.username, url, subscription.podcast
    );
    Ok(())
}

/// Run `unsubscribe`.
pub async fn unsubscribe<S: AccountStore>(
    store: &S,
    user: &str,
    uid: &str,
    url: &str,
) -> Result<()> {
    let url = parse_url(url)?;
    let user = find_user(store, user).await?;
    let device = find_device(store, &user, uid).await?;

    if unsubscribe_url(store, &url, &user.id, &device.id).await? {
        println!("Unsubscribed {} from {}", user.username, url);
    } else {
        println!("{} was not subscribed to {}", user.username, url);
    }
    Ok(())
}

/// Run `subscriptions`.
pub async fn list<S: AccountStore>(store: &S, user: &str) -> Result<()> {
    let user = find_user(store, user).await?;
    let devices: HashMap<_, _> = store
        .devices_for_user(&user.id)
        .await?
        .into_iter()
        .map(|d| (d.id, d.uid))
        .collect();

    let subscriptions = store.subscriptions_for_user(&user.id).await?;
    if subscriptions.is_empty() {
        println!("No subscriptions");
    }
    for subscription in subscriptions {
        let url = match store.get_podcast(&subscription.podcast).await? {
            Some(podcast) => podcast
                .url()
                .map(ToString::to_string)
                .unwrap_or_else(|| subscription.podcast.to_string()),
            None => subscription.podcast.to_string(),
        };
        let device = devices
            .get(&subscription.device)
            .map(String::as_str)
            .unwrap_or("?");
        println!("{}\t{}", url, device);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pod_store::SqliteStore;

    #[tokio::test]
    async fn subscribe_list_unsubscribe() {
        let store = SqliteStore::in_memory().await.unwrap();
        let alice = store.create_user("alice").await.unwrap();
        store.get_or_create_device(&alice.id, "phone").await.unwrap();

        subscribe(&store, "alice", "phone", "http://example.com/feed.rss")
            .await
            .unwrap();
        subscribe(&store, "alice", "phone", "http://example.com/feed.rss")
            .await
            .unwrap();
        list(&store, "alice").await.unwrap();
        assert_eq!(store.subscriptions_for_user(&alice.id).await.unwrap().len(), 1);

        unsubscribe(&store, "alice", "phone", "http://example.com/feed.rss")
            .await
            .unwrap();
        unsubscribe(&store, "alice", "phone", "http://example.com/feed.rss")
            .await
            .unwrap();
        assert!(store.subscriptions_for_user(&alice.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn subscribe_rejects_bad_url() {
        let store = SqliteStore::in_memory().await.unwrap();
        let alice = store.create_user("alice").await.unwrap();
        store.get_or_create_device(&alice.id, "phone").await.unwrap();

        assert!(subscribe(&store, "alice", "phone", "ftp://example.com/")
            .await
            .is_err());
    }
}
