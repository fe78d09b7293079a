//! Validation errors for the data model.

use thiserror::Error;

/// Errors raised while constructing model values from untrusted input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// The URL cannot be used as a podcast alias.
    #[error("invalid podcast url {url:?}: {reason}")]
    InvalidUrl {
        /// The rejected input.
        url: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A device label was empty after trimming.
    #[error("device uid must not be empty")]
    EmptyUid,

    /// An identifier could not be decoded.
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}
