//! Manage devices.

use anyhow::Result;
use pod_store::{register_device, AccountStore};

use super::{find_device, find_user};

/// Run `device add`.
pub async fn add<S: AccountStore>(store: &S, user: &str, uid: &str) -> Result<()> {
    let user = find_user(store, user).await?;
    let device = register_device(store, &user.id, uid).await?;

    println!("Device {} ({})", device.uid, device.id);
    Ok(())
}

/// Run `device list`.
pub async fn list<S: AccountStore>(store: &S, user: &str) -> Result<()> {
    let user = find_user(store, user).await?;
    let devices = store.devices_for_user(&user.id).await?;

    if devices.is_empty() {
        println!("No devices");
    }
    for device in devices {
        println!("{}\t{}", device.uid, device.id);
    }
    Ok(())
}

/// Run `device remove`.
pub async fn remove<S: AccountStore>(store: &S, user: &str, uid: &str) -> Result<()> {
    let user = find_user(store, user).await?;
    let device = find_device(store, &user, uid).await?;

    store.delete_device(&device.id).await?;
    println!("Removed device {}", device.uid);
    Ok(())
}
