//! CLI command implementations.

pub mod device;
pub mod groups;
pub mod merge;
pub mod subscriptions;
pub mod user;

use anyhow::{Context, Result};
use pod_store::AccountStore;
use pod_types::{Device, FeedUrl, User};

/// Look up a user by name.
pub(crate) async fn find_user<S: AccountStore>(store: &S, name: &str) -> Result<User> {
    store
        .find_user(name)
        .await?
        .with_context(|| format!("Unknown user '{}'. Run 'podsync user add {}' first.", name, name))
}

/// Look up a device of `user` by label.
pub(crate) async fn find_device<S: AccountStore>(
    store: &S,
    user: &User,
    uid: &str,
) -> Result<Device> {
    store
        .find_device(&user.id, uid.trim())
        .await?
        .with_context(|| format!("Unknown device '{}' of user '{}'", uid, user.username))
}

/// Parse a feed URL argument.
pub(crate) fn parse_url(raw: &str) -> Result<FeedUrl> {
    FeedUrl::parse(raw).with_context(|| format!("Invalid feed URL '{}'", raw))
}
