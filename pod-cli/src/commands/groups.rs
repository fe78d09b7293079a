//! Sync edges, groups and targets.

use anyhow::Result;
use pod_core::SyncGroup;
use pod_store::{get_grouped_devices, get_sync_targets, sync_with, AccountStore, SyncOutcome};

use super::{find_device, find_user};

/// Run `sync`.
pub async fn sync<S: AccountStore>(store: &S, user: &str, a: &str, b: &str) -> Result<()> {
    let user = find_user(store, user).await?;
    let first = find_device(store, &user, a).await?;
    let second = find_device(store, &user, b).await?;

    match sync_with(store, &first.id, &second.id).await? {
        SyncOutcome::Created(_) => println!("Synced {} and {}", first.uid, second.uid),
        SyncOutcome::AlreadySynced => {
            println!("{} and {} already synced", first.uid, second.uid)
        }
    }
    Ok(())
}

/// Run `groups`.
pub async fn show<S: AccountStore>(store: &S, user: &str) -> Result<()> {
    let user = find_user(store, user).await?;

    let mut empty = true;
    for group in get_grouped_devices(store, &user.id).await? {
        empty = false;
        println!("{}", format_group(&group));
    }
    if empty {
        println!("No devices");
    }
    Ok(())
}

/// Run `targets`.
pub async fn targets<S: AccountStore>(store: &S, user: &str, uid: &str) -> Result<()> {
    let user = find_user(store, user).await?;
    let device = find_device(store, &user, uid).await?;

    for target in get_sync_targets(store, &device.id).await? {
        println!("{}", target.uid);
    }
    Ok(())
}

fn format_group(group: &SyncGroup) -> String {
    let label = if group.is_synced() {
        "synced"
    } else {
        "ungrouped"
    };
    let uids: Vec<&str> = group.devices().iter().map(|d| d.uid.as_str()).collect();
    format!("{}: {}", label, uids.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pod_store::SqliteStore;
    use pod_types::{Device, DeviceId, UserId};

    #[test]
    fn format_group_lists_labels() {
        let user = UserId::new();
        let device = |uid: &str, created_at| Device {
            id: DeviceId::new(),
            user,
            uid: uid.to_string(),
            created_at,
        };
        let group = SyncGroup::Synced(vec![device("d1", 1), device("d3", 3)]);
        assert_eq!(format_group(&group), "synced: d1 d3");

        let group = SyncGroup::Ungrouped(vec![device("d2", 2)]);
        assert_eq!(format_group(&group), "ungrouped: d2");
    }

    #[tokio::test]
    async fn sync_groups_and_targets() {
        let store = SqliteStore::in_memory().await.unwrap();
        let alice = store.create_user("alice").await.unwrap();
        for uid in ["d1", "d2", "d3"] {
            store.get_or_create_device(&alice.id, uid).await.unwrap();
        }

        sync(&store, "alice", "d1", "d3").await.unwrap();
        sync(&store, "alice", "d3", "d1").await.unwrap();
        show(&store, "alice").await.unwrap();
        targets(&store, "alice", "d1").await.unwrap();

        assert_eq!(store.edges_for_user(&alice.id).await.unwrap().len(), 1);
        assert!(sync(&store, "alice", "d1", "missing").await.is_err());
    }
}
