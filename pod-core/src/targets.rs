//! Sync target discovery.
//!
//! A device may sync with every other device of its owner that is not
//! already in its group. Ungrouped devices are not a group for this
//! purpose: an ungrouped device can pick any other device, including
//! another ungrouped one.

use crate::groups::Partition;
use pod_types::{Device, DeviceId, SyncEdge};

/// Lazy sequence of valid sync targets for one device, in device creation order.
#[derive(Debug, Clone)]
pub struct SyncTargets {
    partition: Partition,
    device: DeviceId,
    pos: usize,
}

impl SyncTargets {
    /// Targets for `device` within an already computed partition.
    pub fn new(partition: Partition, device: DeviceId) -> Self {
        Self {
            partition,
            device,
            pos: 0,
        }
    }
}

impl Iterator for SyncTargets {
    type Item = Device;

    fn next(&mut self) -> Option<Self::Item> {
        let devices = self.partition.devices();
        while let Some(candidate) = devices.get(self.pos) {
            self.pos += 1;
            if candidate.id == self.device {
                continue;
            }
            if self.partition.same_group(&self.device, &candidate.id) {
                continue;
            }
            return Some(candidate.clone());
        }
        None
    }
}

/// Devices of the same owner that `device` could still be synced with.
///
/// `devices` is the owner's full device set and `edges` the edges among it.
pub fn sync_targets(device: &Device, devices: Vec<Device>, edges: &[SyncEdge]) -> SyncTargets {
    let owned = devices.into_iter().filter(|d| d.same_owner(device)).collect();
    SyncTargets::new(Partition::new(owned, edges), device.id)
}
