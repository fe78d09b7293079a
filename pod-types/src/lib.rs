//! # pod-types
//!
//! Identifier and data model types shared by the podsync crates.
//!
//! - [`UserId`], [`DeviceId`], [`PodcastId`], [`SubscriptionId`] - opaque identifiers
//! - [`Device`], [`SyncEdge`], [`Podcast`], [`Subscription`] - rows of the relation store
//! - [`FeedUrl`] - a validated podcast URL alias
//! - [`ModelError`] - validation errors

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod model;
mod url;

pub use error::ModelError;
pub use ids::{DeviceId, PodcastId, SubscriptionId, UserId};
pub use model::{Device, Podcast, PodcastStats, Subscription, SyncEdge, User};
pub use url::FeedUrl;
