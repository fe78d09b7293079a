//! Create users.

use anyhow::{Context, Result};
use pod_store::AccountStore;

/// Run `user add`.
pub async fn add<S: AccountStore>(store: &S, name: &str) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("Username must not be empty");
    }

    let user = store
        .create_user(name)
        .await
        .with_context(|| format!("Failed to create user '{}'", name))?;

    println!("Created user {} ({})", user.username, user.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pod_store::SqliteStore;

    #[tokio::test]
    async fn add_creates_user() {
        let store = SqliteStore::in_memory().await.unwrap();
        add(&store, "alice").await.unwrap();
        assert!(store.find_user("alice").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn add_fails_for_duplicate_or_blank() {
        let store = SqliteStore::in_memory().await.unwrap();
        add(&store, "alice").await.unwrap();

        assert!(add(&store, "alice").await.is_err());
        assert!(add(&store, "  ").await.is_err());
    }
}
