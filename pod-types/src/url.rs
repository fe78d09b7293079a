//! Podcast URL aliases.

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt;

const SCHEMES: [&str; 3] = ["http", "https", "feed"];

/// A validated podcast feed URL.
///
/// Several `FeedUrl`s may resolve to one podcast, but each URL belongs to
/// at most one podcast at a time. Validation is deliberately shallow: the
/// input is trimmed, the scheme lowercased and checked, and the host must
/// be non-empty. Everything after the scheme is kept verbatim.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FeedUrl(String);

impl FeedUrl {
    /// Parse and normalize a URL.
    pub fn parse(raw: &str) -> Result<Self, ModelError> {
        let trimmed = raw.trim();
        let invalid = |reason| ModelError::InvalidUrl {
            url: raw.to_string(),
            reason,
        };

        if trimmed.chars().any(char::is_whitespace) {
            return Err(invalid("contains whitespace"));
        }

        let (scheme, rest) = trimmed
            .split_once("://")
            .ok_or_else(|| invalid("missing scheme"))?;
        let scheme = scheme.to_ascii_lowercase();
        if !SCHEMES.contains(&scheme.as_str()) {
            return Err(invalid("unsupported scheme"));
        }

        let host = rest
            .split(|c| matches!(c, '/' | '?' | '#'))
            .next()
            .unwrap_or_default();
        if host.is_empty() {
            return Err(invalid("missing host"));
        }

        Ok(Self(format!("{}://{}", scheme, rest)))
    }

    /// The URL as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for FeedUrl {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FeedUrl> for String {
    fn from(url: FeedUrl) -> Self {
        url.0
    }
}

impl AsRef<str> for FeedUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for FeedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FeedUrl({})", self.0)
    }
}
