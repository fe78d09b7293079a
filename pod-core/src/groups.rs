//! Sync group resolution.
//!
//! Groups are never stored. They are the connected components of a user's
//! sync edges, recomputed from scratch on every read:
//!
//! - every device that touches no edge lands in one shared *ungrouped*
//!   bucket (never a singleton group of its own)
//! - every connected component with at least one edge is a *synced* group
//!
//! [`Partition`] runs union-find over every device and edge up front.
//! [`SyncGroups`] then collects the members of one group per `next()`
//! call, so a caller that stops after the first group skips only the
//! member collection of the rest.

use pod_types::{Device, DeviceId, SyncEdge};
use std::collections::{HashMap, VecDeque};

/// A derived sync group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncGroup {
    /// All devices of the user that have no sync edge.
    Ungrouped(Vec<Device>),
    /// A maximal set of devices connected through sync edges.
    Synced(Vec<Device>),
}

impl SyncGroup {
    /// `false` for the ungrouped bucket, `true` for any connected component.
    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Synced(_))
    }

    /// Devices in device creation order.
    pub fn devices(&self) -> &[Device] {
        match self {
            Self::Ungrouped(devices) | Self::Synced(devices) => devices,
        }
    }

    /// Consume the group, returning its devices.
    pub fn into_devices(self) -> Vec<Device> {
        match self {
            Self::Ungrouped(devices) | Self::Synced(devices) => devices,
        }
    }

    /// Whether the group holds the given device.
    pub fn contains(&self, device: &DeviceId) -> bool {
        self.devices().iter().any(|d| d.id == *device)
    }

    /// Number of devices in the group.
    pub fn len(&self) -> usize {
        self.devices().len()
    }

    /// Whether the group is empty (never true for emitted groups).
    pub fn is_empty(&self) -> bool {
        self.devices().is_empty()
    }
}

/// Union-find over dense indices with path halving and union by rank.
#[derive(Debug, Clone)]
struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            rank: vec![0; len],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, x: usize, y: usize) {
        let (rx, ry) = (self.find(x), self.find(y));
        if rx == ry {
            return;
        }
        match self.rank[rx].cmp(&self.rank[ry]) {
            std::cmp::Ordering::Less => self.parent[rx] = ry,
            std::cmp::Ordering::Greater => self.parent[ry] = rx,
            std::cmp::Ordering::Equal => {
                self.parent[ry] = rx;
                self.rank[rx] += 1;
            }
        }
    }
}

/// The partition of one user's devices into sync groups.
///
/// Edges whose endpoints are not both in the device set are ignored, as
/// are self-edges; callers are expected to pass only the edges among the
/// user's own devices.
#[derive(Debug, Clone)]
pub struct Partition {
    /// Devices sorted by creation order.
    devices: Vec<Device>,
    index: HashMap<DeviceId, usize>,
    /// Root index per device; `None` for devices without edges.
    roots: Vec<Option<usize>>,
    /// Sequence of the most recently added edge, per root.
    latest_edge: HashMap<usize, u64>,
}

impl Partition {
    /// Build the partition for a device set and the edges among it.
    pub fn new(mut devices: Vec<Device>, edges: &[SyncEdge]) -> Self {
        devices.sort_by(|x, y| x.created_at.cmp(&y.created_at).then(x.id.cmp(&y.id)));
        let index: HashMap<DeviceId, usize> =
            devices.iter().enumerate().map(|(i, d)| (d.id, i)).collect();

        let mut set = DisjointSet::new(devices.len());
        let mut has_edge = vec![false; devices.len()];
        let mut valid = Vec::with_capacity(edges.len());

        for edge in edges {
            if edge.a == edge.b {
                continue;
            }
            if let (Some(&x), Some(&y)) = (index.get(&edge.a), index.get(&edge.b)) {
                set.union(x, y);
                has_edge[x] = true;
                has_edge[y] = true;
                valid.push((x, edge.seq));
            }
        }

        let roots: Vec<Option<usize>> = (0..devices.len())
            .map(|i| has_edge[i].then(|| set.find(i)))
            .collect();

        let mut latest_edge: HashMap<usize, u64> = HashMap::new();
        for (x, seq) in valid {
            let root = set.find(x);
            let latest = latest_edge.entry(root).or_insert(seq);
            *latest = (*latest).max(seq);
        }

        Self {
            devices,
            index,
            roots,
            latest_edge,
        }
    }

    /// All devices in creation order.
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Whether `device` is part of a synced group.
    pub fn is_grouped(&self, device: &DeviceId) -> bool {
        self.root_of(device).is_some()
    }

    /// Whether two devices already share a synced group.
    ///
    /// A device is always considered to share a group with itself, so a
    /// request to sync a device with itself is already satisfied.
    pub fn same_group(&self, x: &DeviceId, y: &DeviceId) -> bool {
        if x == y {
            return true;
        }
        match (self.root_of(x), self.root_of(y)) {
            (Some(rx), Some(ry)) => rx == ry,
            _ => false,
        }
    }

    /// The group containing `device`, if the device is known.
    pub fn group_of(&self, device: &DeviceId) -> Option<SyncGroup> {
        let &i = self.index.get(device)?;
        Some(match self.roots[i] {
            Some(root) => SyncGroup::Synced(self.members(Some(root))),
            None => SyncGroup::Ungrouped(self.members(None)),
        })
    }

    /// Lazily yield the groups: ungrouped first, then synced groups.
    pub fn into_groups(self) -> SyncGroups {
        SyncGroups::new(self)
    }

    fn root_of(&self, device: &DeviceId) -> Option<usize> {
        self.index.get(device).and_then(|&i| self.roots[i])
    }

    fn members(&self, root: Option<usize>) -> Vec<Device> {
        self.devices
            .iter()
            .zip(&self.roots)
            .filter(|(_, r)| **r == root)
            .map(|(d, _)| d.clone())
            .collect()
    }
}

/// Sequence of a user's sync groups.
///
/// The partition is already complete; only each group's member list is
/// built on demand.
///
/// The ungrouped bucket (if non-empty) comes first. Synced groups follow,
/// ordered by the sequence number of each group's most recently added
/// edge, oldest first.
#[derive(Debug, Clone)]
pub struct SyncGroups {
    partition: Partition,
    ungrouped_pending: bool,
    synced: VecDeque<usize>,
}

impl SyncGroups {
    fn new(partition: Partition) -> Self {
        let ungrouped_pending = partition.roots.iter().any(Option::is_none);

        let mut synced: Vec<(u64, usize)> = partition
            .latest_edge
            .iter()
            .map(|(&root, &seq)| (seq, root))
            .collect();
        synced.sort_unstable();

        Self {
            partition,
            ungrouped_pending,
            synced: synced.into_iter().map(|(_, root)| root).collect(),
        }
    }
}

impl Iterator for SyncGroups {
    type Item = SyncGroup;

    fn next(&mut self) -> Option<Self::Item> {
        if self.ungrouped_pending {
            self.ungrouped_pending = false;
            return Some(SyncGroup::Ungrouped(self.partition.members(None)));
        }
        let root = self.synced.pop_front()?;
        Some(SyncGroup::Synced(self.partition.members(Some(root))))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.synced.len() + usize::from(self.ungrouped_pending);
        (n, Some(n))
    }
}

impl ExactSizeIterator for SyncGroups {}

/// Partition `devices` by `edges` and return the group sequence.
pub fn compute_groups(devices: Vec<Device>, edges: &[SyncEdge]) -> SyncGroups {
    Partition::new(devices, edges).into_groups()
}
