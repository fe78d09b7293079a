//! Merge duplicate podcasts.

use anyhow::{Context, Result};
use pod_core::{ActionLog, MergeCounter};
use pod_store::{spawn_merge_worker, AccountStore, MergeConfig, PodcastMerger, SqliteStore};
use pod_types::Podcast;
use std::sync::Arc;

use super::parse_url;

/// Run `merge`.
///
/// Merges go through the merge worker unless it is disabled, in which
/// case they run inline.
pub async fn run(
    store: SqliteStore,
    config: MergeConfig,
    target: &str,
    sources: &[String],
) -> Result<()> {
    let mut podcasts = vec![lookup(&store, target).await?];
    for source in sources {
        podcasts.push(lookup(&store, source).await?);
    }

    let (result, counter, actions) = if config.enabled {
        let (queue, handle) = spawn_merge_worker(Arc::new(store), config);
        let report = queue.submit(podcasts).await?;
        drop(queue);
        handle.await.context("Merge worker panicked")?;
        (report.result, report.counter, report.actions)
    } else {
        let mut counter = MergeCounter::default();
        let mut actions = ActionLog::new();
        let result = PodcastMerger::new(&store, podcasts, &mut counter, &mut actions)
            .merge()
            .await;
        (result, counter, actions)
    };

    for action in &actions {
        println!("{}", action);
    }
    let target = result.context("Merge failed")?;
    println!("Merged into {}: {}", target, counter);
    Ok(())
}

async fn lookup<S: AccountStore>(store: &S, raw: &str) -> Result<Podcast> {
    let url = parse_url(raw)?;
    store
        .podcast_for_url(&url)
        .await?
        .with_context(|| format!("No podcast for {}", url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pod_types::FeedUrl;

    async fn store_with_duplicates() -> SqliteStore {
        let store = SqliteStore::in_memory().await.unwrap();
        for raw in ["http://example.com/feed.rss", "http://test.org/podcast/"] {
            store
                .get_or_create_podcast_for_url(&FeedUrl::parse(raw).unwrap())
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn merge_through_worker() {
        let store = store_with_duplicates().await;
        let probe = store.clone();

        run(
            store,
            MergeConfig::default(),
            "http://example.com/feed.rss",
            &["http://test.org/podcast/".to_string()],
        )
        .await
        .unwrap();

        let target = probe
            .podcast_for_url(&FeedUrl::parse("http://example.com/feed.rss").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(target.urls.len(), 2);
    }

    #[tokio::test]
    async fn merge_inline_when_worker_disabled() {
        let store = store_with_duplicates().await;
        let probe = store.clone();
        let config = MergeConfig {
            enabled: false,
            ..MergeConfig::default()
        };

        run(
            store,
            config,
            "http://test.org/podcast/",
            &["http://example.com/feed.rss".to_string()],
        )
        .await
        .unwrap();

        let target = probe
            .podcast_for_url(&FeedUrl::parse("http://test.org/podcast/").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(target.urls.len(), 2);
    }

    #[tokio::test]
    async fn merge_of_unknown_url_fails() {
        let store = store_with_duplicates().await;
        let result = run(
            store,
            MergeConfig::default(),
            "http://example.com/feed.rss",
            &["http://unknown.example/".to_string()],
        )
        .await;
        assert!(result.is_err());
    }
}
