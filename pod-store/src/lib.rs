//! # podsync-store
//!
//! Store-backed account operations for podsync.
//!
//! This crate connects the pure algorithms of `pod-core` to a relation
//! store:
//! - Records sync edges between devices and derives sync groups and
//!   sync targets from them on every read
//! - Subscribes and unsubscribes users, keeping one row per
//!   (user, canonical podcast)
//! - Merges duplicate podcast records into one canonical record
//!
//! ## Architecture
//!
//! ```text
//!   pod-cli / application
//!            │
//!   ┌────────┴─────────────────────────────────┐
//!   │ sync_groups  subscriptions  merge        │
//!   │                    merge_worker (tokio)  │
//!   ├──────────────────────────────────────────┤
//!   │ storage::AccountStore ── SqliteStore     │
//!   └──────────────────────────────────────────┘
//! ```
//!
//! Sync groups are never stored; only edges are.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod merge;
pub mod merge_worker;
pub mod storage;
pub mod subscriptions;
pub mod sync_groups;

pub use config::{Config, ConfigError, LoggingConfig, MergeConfig, StorageConfig};
pub use error::{AccountError, MergeError, MergeResult, Result, StorageError, StorageResult};
pub use merge::PodcastMerger;
pub use merge_worker::{spawn_merge_worker, MergeQueue, MergeReport};
pub use storage::{AccountStore, SqliteStore, UrlMove};
pub use subscriptions::{resolve_canonical, subscribe, subscribe_url, unsubscribe, unsubscribe_url};
pub use sync_groups::{get_grouped_devices, get_sync_targets, register_device, sync_with, SyncOutcome};
