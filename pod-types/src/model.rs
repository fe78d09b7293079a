//! Rows of the relation store.
//!
//! These are plain values: the store hands out copies and the core never
//! holds on to live references. Ordering fields (`created_at`, `seq`) are
//! assigned by the store and are what the read-side computations sort by.

use crate::error::ModelError;
use crate::ids::{DeviceId, PodcastId, SubscriptionId, UserId};
use crate::url::FeedUrl;
use serde::{Deserialize, Serialize};

/// A user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier.
    pub id: UserId,
    /// Unique login name.
    pub username: String,
}

/// A device (client) owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Device {
    /// Unique identifier.
    pub id: DeviceId,
    /// The owning user.
    pub user: UserId,
    /// Human label chosen by the client, unique per user.
    pub uid: String,
    /// Creation order assigned by the store (monotonic per store).
    pub created_at: i64,
}

impl Device {
    /// Validate a device label, returning it trimmed.
    pub fn parse_uid(raw: &str) -> Result<&str, ModelError> {
        let uid = raw.trim();
        if uid.is_empty() {
            return Err(ModelError::EmptyUid);
        }
        Ok(uid)
    }

    /// Whether both devices belong to the same user.
    pub fn same_owner(&self, other: &Device) -> bool {
        self.user == other.user
    }
}

/// A recorded symmetric "synced-with" relation between two devices.
///
/// The pair is unordered; [`SyncEdge::new`] stores the smaller id first so
/// that `{a, b}` and `{b, a}` compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncEdge {
    /// The smaller device id of the pair.
    pub a: DeviceId,
    /// The larger device id of the pair.
    pub b: DeviceId,
    /// Edge creation order assigned by the store.
    pub seq: u64,
}

impl SyncEdge {
    /// Create an edge, normalizing the pair order.
    pub fn new(x: DeviceId, y: DeviceId, seq: u64) -> Self {
        let (a, b) = if x <= y { (x, y) } else { (y, x) };
        Self { a, b, seq }
    }

    /// Whether the edge has `device` as one of its endpoints.
    pub fn touches(&self, device: &DeviceId) -> bool {
        self.a == *device || self.b == *device
    }

    /// The endpoint opposite `device`, if `device` is an endpoint.
    pub fn other(&self, device: &DeviceId) -> Option<DeviceId> {
        if self.a == *device {
            Some(self.b)
        } else if self.b == *device {
            Some(self.a)
        } else {
            None
        }
    }
}

/// Aggregate counters carried by a podcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodcastStats {
    /// Number of subscribers as last computed.
    pub subscribers: u64,
    /// Number of listeners as last computed.
    pub listeners: u64,
}

impl PodcastStats {
    /// Add another set of counters to this one (saturating).
    pub fn absorb(&mut self, other: PodcastStats) {
        self.subscribers = self.subscribers.saturating_add(other.subscribers);
        self.listeners = self.listeners.saturating_add(other.listeners);
    }

    /// Whether all counters are zero.
    pub fn is_zero(&self) -> bool {
        self.subscribers == 0 && self.listeners == 0
    }
}

/// A podcast record with its URL aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Podcast {
    /// Canonical identifier.
    pub id: PodcastId,
    /// URL aliases in the order they were attached; the first is primary.
    pub urls: Vec<FeedUrl>,
    /// Aggregate counters.
    pub stats: PodcastStats,
    /// Optional display title (not used by merge mechanics).
    pub title: Option<String>,
}

impl Podcast {
    /// The primary URL, if the podcast has any.
    pub fn url(&self) -> Option<&FeedUrl> {
        self.urls.first()
    }

    /// Whether `url` is one of this podcast's aliases.
    pub fn has_url(&self, url: &FeedUrl) -> bool {
        self.urls.contains(url)
    }
}

/// One user's subscription to a podcast, recorded from a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Unique identifier.
    pub id: SubscriptionId,
    /// The subscribed user.
    pub user: UserId,
    /// The device the subscription was first made from.
    pub device: DeviceId,
    /// The podcast subscribed to.
    pub podcast: PodcastId,
    /// Unix timestamp of creation.
    pub created_at: i64,
}
