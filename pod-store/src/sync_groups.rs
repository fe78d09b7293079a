//! Store-backed sync group operations.
//!
//! Edges are the only persisted state. Groups and targets are recomputed
//! from a fresh read of the owner's devices and edges on every call.

use crate::error::{AccountError, Result};
use crate::storage::AccountStore;
use pod_core::{compute_groups, sync_targets, Partition, SyncGroups, SyncTargets};
use pod_types::{Device, DeviceId, SyncEdge, UserId};

/// What [`sync_with`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A new edge was recorded.
    Created(SyncEdge),
    /// The devices were already in one group; nothing was written.
    AlreadySynced,
}

async fn load_device<S>(store: &S, id: &DeviceId) -> Result<Device>
where
    S: AccountStore + ?Sized,
{
    store
        .get_device(id)
        .await?
        .ok_or(AccountError::DeviceNotFound(*id))
}

/// Check that `device` is owned by `user`.
pub(crate) fn ensure_owner(device: &Device, user: &UserId) -> Result<()> {
    if device.user != *user {
        return Err(AccountError::OwnershipMismatch {
            device: device.id,
            expected_owner: *user,
            actual_owner: device.user,
        });
    }
    Ok(())
}

/// Return the device `uid` of `user`, registering it on first use.
pub async fn register_device<S>(store: &S, user: &UserId, uid: &str) -> Result<Device>
where
    S: AccountStore + ?Sized,
{
    let uid = Device::parse_uid(uid)?;
    if store.get_user(user).await?.is_none() {
        return Err(AccountError::UserNotFound(user.to_string()));
    }

    let device = store.get_or_create_device(user, uid).await?;
    tracing::debug!("Device {} of user {} is {}", uid, user, device.id);
    Ok(device)
}

/// Record that devices `a` and `b` share synchronized state.
///
/// Both devices must belong to one user. Syncing devices that are already
/// connected, directly or through other edges, writes nothing.
pub async fn sync_with<S>(store: &S, a: &DeviceId, b: &DeviceId) -> Result<SyncOutcome>
where
    S: AccountStore + ?Sized,
{
    let first = load_device(store, a).await?;
    let second = load_device(store, b).await?;
    ensure_owner(&second, &first.user)?;

    if first.id == second.id {
        tracing::debug!("Device {} synced with itself, ignoring", first.id);
        return Ok(SyncOutcome::AlreadySynced);
    }

    let devices = store.devices_for_user(&first.user).await?;
    let edges = store.edges_for_user(&first.user).await?;
    if Partition::new(devices, &edges).same_group(&first.id, &second.id) {
        tracing::debug!("Devices {} and {} already in one group", first.uid, second.uid);
        return Ok(SyncOutcome::AlreadySynced);
    }

    match store.insert_edge(&first.id, &second.id).await? {
        Some(edge) => {
            tracing::info!(
                "Synced devices {} and {} of user {}",
                first.uid,
                second.uid,
                first.user
            );
            Ok(SyncOutcome::Created(edge))
        }
        None => {
            tracing::debug!("Edge {} / {} recorded concurrently", first.uid, second.uid);
            Ok(SyncOutcome::AlreadySynced)
        }
    }
}

/// The sync groups of `user`: the ungrouped bucket first, then synced groups.
pub async fn get_grouped_devices<S>(store: &S, user: &UserId) -> Result<SyncGroups>
where
    S: AccountStore + ?Sized,
{
    if store.get_user(user).await?.is_none() {
        return Err(AccountError::UserNotFound(user.to_string()));
    }

    let devices = store.devices_for_user(user).await?;
    let edges = store.edges_for_user(user).await?;
    Ok(compute_groups(devices, &edges))
}

/// Devices of the same owner that `device` is not yet synced with.
pub async fn get_sync_targets<S>(store: &S, device: &DeviceId) -> Result<SyncTargets>
where
    S: AccountStore + ?Sized,
{
    let device = load_device(store, device).await?;
    let devices = store.devices_for_user(&device.user).await?;
    let edges = store.edges_for_user(&device.user).await?;
    Ok(sync_targets(&device, devices, &edges))
}
