//! # pod-core
//!
//! Pure logic for podsync (no I/O, instant tests).
//!
//! - [`groups`]: partition a user's devices into sync groups (union-find)
//! - [`targets`]: which devices a given device may still sync with
//! - [`merge`]: merge planning and the caller-owned merge accumulators
//!
//! Everything here takes values and returns values. Reading devices,
//! edges and podcasts from storage, and writing the results back, is done
//! by `pod-store`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod groups;
pub mod merge;
pub mod targets;

pub use groups::{compute_groups, Partition, SyncGroup, SyncGroups};
pub use merge::{ActionLog, MergeAction, MergeCounter, MergePlan, MergePlanError};
pub use targets::{sync_targets, SyncTargets};
