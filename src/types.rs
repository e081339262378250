//! Shared vocabulary: stored-record metadata keys, caller identity and sort
//! direction.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ============================================================================
// Stored-record metadata keys
// ============================================================================

/// Stable identifier of a stored row.
pub const UUID_KEY: &str = "__uuid";
/// Ownership map: subject-id → `true`.
pub const OWNER_KEY: &str = "__owner";
/// Viewer map: subject-id → `true` (read-only access).
pub const VIEWER_KEY: &str = "__viewer";
/// Removal flag, set on records forwarded to `Connector::remove`.
pub const REMOVED_KEY: &str = "__removed";
/// Gap-spaced sortable insertion index.
pub const INDEX_KEY: &str = "_index";
pub const GEOHASH_KEY: &str = "__geohash";
pub const LATITUDE_KEY: &str = "__latitude";
pub const LONGITUDE_KEY: &str = "__longitude";

pub(crate) const METADATA_KEYS: &[&str] = &[
    UUID_KEY,
    OWNER_KEY,
    VIEWER_KEY,
    REMOVED_KEY,
    INDEX_KEY,
    GEOHASH_KEY,
    LATITUDE_KEY,
    LONGITUDE_KEY,
];

pub(crate) fn is_metadata_key(key: &str) -> bool {
    METADATA_KEYS.contains(&key)
}

/// Ownership entry granting every caller owner-level visibility in public mode.
pub const EVERYBODY: &str = "EVERYBODY";

/// Distance between consecutive `_index` values handed out by a repository.
pub const DEFAULT_INDEX_GAP: i64 = 1 << 20;

// ============================================================================
// Identity
// ============================================================================

/// The caller on whose behalf a repository reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Identity {
    /// Signed-out caller; never recorded as an owner.
    Anonymous,
    Subject(String),
}

impl Identity {
    pub fn subject(id: impl Into<String>) -> Self {
        Self::Subject(id.into())
    }

    /// The subject-id, or `None` for an anonymous caller.
    pub fn subject_id(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::Subject(id) => Some(id.as_str()),
        }
    }
}

// ============================================================================
// Direction
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "asc", alias = "ASC", alias = "Asc")]
    Asc,
    #[serde(rename = "desc", alias = "DESC", alias = "Desc")]
    Desc,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(format!("unknown sort direction \"{other}\"")),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => f.write_str("ASC"),
            Self::Desc => f.write_str("DESC"),
        }
    }
}

/// Which access-control map of a stored record a predicate refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMap {
    Owner,
    Viewer,
}

impl AccessMap {
    pub fn key(self) -> &'static str {
        match self {
            Self::Owner => OWNER_KEY,
            Self::Viewer => VIEWER_KEY,
        }
    }
}
