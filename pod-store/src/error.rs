//! Error types for pod-store.

use pod_core::MergePlanError;
use pod_types::{DeviceId, ModelError, PodcastId, UserId};

/// Main error type for account operations.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Invalid input.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Two entities that must share an owner do not.
    ///
    /// Fatal to the single call; retrying with the same arguments fails again.
    #[error("device {device} belongs to user {actual_owner}, not {expected_owner}")]
    OwnershipMismatch {
        /// The offending device.
        device: DeviceId,
        /// The owner the operation required.
        expected_owner: UserId,
        /// The device's actual owner.
        actual_owner: UserId,
    },

    /// Device does not exist.
    #[error("device not found: {0}")]
    DeviceNotFound(DeviceId),

    /// User does not exist.
    #[error("user not found: {0}")]
    UserNotFound(String),

    /// Podcast does not exist and none of its URLs resolve any more.
    #[error("podcast not found: {0}")]
    PodcastNotFound(PodcastId),
}

/// Storage layer errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A uniqueness constraint rejected the write.
    #[error("{entity} conflict: {detail}")]
    Conflict {
        /// Kind of row that conflicted.
        entity: &'static str,
        /// What collided.
        detail: String,
    },

    /// A referenced row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of row.
        entity: &'static str,
        /// Its identifier.
        id: String,
    },

    /// A stored row could not be decoded.
    #[error("invalid row: {reason}")]
    InvalidRow {
        /// What was wrong with it.
        reason: String,
    },

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),
}

impl StorageError {
    /// Whether this is a uniqueness conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Merge errors.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// The podcast list cannot form a merge.
    #[error(transparent)]
    Plan(#[from] MergePlanError),

    /// The designated target does not exist.
    #[error("merge target {0} does not exist")]
    TargetMissing(PodcastId),

    /// Stripping a source failed for a reason other than a uniqueness conflict.
    #[error("merge failed: {0}")]
    Storage(#[from] StorageError),

    /// A stripped source could not be deleted.
    ///
    /// The source keeps no URLs and no subscriptions, so re-running the
    /// merge after the blocking reference is gone converges.
    #[error("could not delete merged podcast {source_id} ({failed} source(s) left undeleted): {error}")]
    MergeDeletionFailure {
        /// The first source that could not be deleted.
        source_id: PodcastId,
        /// How many sources failed to delete.
        failed: usize,
        /// The store error for `source_id`.
        #[source]
        error: StorageError,
    },

    /// The merge worker is not running.
    #[error("merge worker stopped")]
    WorkerStopped,
}

/// Result type alias for account operations.
pub type Result<T> = std::result::Result<T, AccountError>;

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Result type alias for merges.
pub type MergeResult<T> = std::result::Result<T, MergeError>;
