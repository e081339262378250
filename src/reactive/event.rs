//! ChangeEvent: the repository-wide notification every live query listens to.
//!
//! `origin` carries the key of the connector that delivered the change, or
//! `None` for a local write.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// Rows were created or overwritten (upsert).
    Added {
        ids: Vec<String>,
        origin: Option<String>,
    },
    /// Existing rows were modified through `update`.
    Updated {
        ids: Vec<String>,
        origin: Option<String>,
    },
    /// Rows were removed from the table.
    Removed {
        ids: Vec<String>,
        origin: Option<String>,
    },
}

impl ChangeEvent {
    pub fn ids(&self) -> &[String] {
        match self {
            Self::Added { ids, .. } | Self::Updated { ids, .. } | Self::Removed { ids, .. } => ids,
        }
    }

    pub fn origin(&self) -> Option<&str> {
        match self {
            Self::Added { origin, .. }
            | Self::Updated { origin, .. }
            | Self::Removed { origin, .. } => origin.as_deref(),
        }
    }

    pub fn is_removal(&self) -> bool {
        matches!(self, Self::Removed { .. })
    }
}
