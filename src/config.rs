//! Repository and paginator configuration.
//!
//! Both structs deserialize from camelCase JSON so they can be loaded from
//! the same documents the backing stores use, e.g.
//! `{ "pageSize": 10, "pageSort": { "active": "age", "direction": "DESC" } }`.

use serde::{Deserialize, Serialize};

use crate::types::{Direction, Identity, DEFAULT_INDEX_GAP};

/// Page size options offered when the caller does not provide any.
pub const DEFAULT_PAGE_SIZE_OPTIONS: &[usize] = &[5, 10, 25, 100];

/// An explicit paginator sort. Takes precedence over a statement's `order_by`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSort {
    /// Field to sort on.
    pub active: String,
    pub direction: Direction,
}

impl PageSort {
    pub fn new(active: impl Into<String>, direction: Direction) -> Self {
        Self {
            active: active.into(),
            direction,
        }
    }
}

/// Initial window for a `Select`'s paginator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaginatorDefaults {
    /// `None` disables paging: the window is governed by the statement's
    /// own `limit`/`offset`.
    pub page_size: Option<usize>,
    pub page_size_options: Vec<usize>,
    pub page_sort: Option<PageSort>,
}

impl PaginatorDefaults {
    pub fn page_size(size: usize) -> Self {
        Self {
            page_size: Some(size),
            ..Default::default()
        }
    }

    pub fn sorted(mut self, active: impl Into<String>, direction: Direction) -> Self {
        self.page_sort = Some(PageSort::new(active, direction));
        self
    }
}

/// Options for a `Repository`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RepositoryOptions {
    /// Name used in logs and error messages. Defaults to the model's type name.
    pub name: Option<String>,
    /// Forces private (owner-only) or public visibility. When `None`, the
    /// repository is private if any attached connector reports private mode.
    pub private_mode: Option<bool>,
    /// Top-level collections fall back to `_index` ordering.
    pub top_level: bool,
    pub index_gap: i64,
    /// Initial caller identity. Queries stay pending until one is known.
    pub identity: Option<Identity>,
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        Self {
            name: None,
            private_mode: None,
            top_level: true,
            index_gap: DEFAULT_INDEX_GAP,
            identity: None,
        }
    }
}
