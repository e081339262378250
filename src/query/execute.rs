//! Ordering and windowing over matched rows.

use std::cmp::Ordering;
use std::ops::Range;

use serde_json::Value;

use crate::types::{Direction, INDEX_KEY, UUID_KEY};

use super::operators::{compare_values, get_field_value};
use super::statement::SortEntry;

// ============================================================================
// Sorting
// ============================================================================

/// Compare two stored-record docs by cascading sort keys, then `_index`, then
/// uuid so the order is total.
pub fn compare_docs(a: &Value, b: &Value, keys: &[SortEntry]) -> Ordering {
    for entry in keys {
        let va = get_field_value(a, &entry.field).unwrap_or(&Value::Null);
        let vb = get_field_value(b, &entry.field).unwrap_or(&Value::Null);
        let cmp = compare_values(va, vb);
        if cmp != Ordering::Equal {
            return if entry.direction == Direction::Desc {
                cmp.reverse()
            } else {
                cmp
            };
        }
    }
    let index = |v: &Value| v.get(INDEX_KEY).cloned().unwrap_or(Value::Null);
    compare_values(&index(a), &index(b)).then_with(|| {
        let uuid = |v: &Value| v.get(UUID_KEY).and_then(Value::as_str).unwrap_or("").to_string();
        uuid(a).cmp(&uuid(b))
    })
}

/// Sort rows in place, reading each row's doc through `doc`.
pub fn sort_rows<R>(rows: &mut [R], keys: &[SortEntry], doc: impl Fn(&R) -> &Value) {
    rows.sort_by(|a, b| compare_docs(doc(a), doc(b), keys));
}

// ============================================================================
// Windowing
// ============================================================================

/// Index range selected by offset then limit.
pub fn window(len: usize, offset: Option<usize>, limit: Option<usize>) -> Range<usize> {
    let start = offset.unwrap_or(0).min(len);
    let end = match limit {
        Some(n) => start.saturating_add(n).min(len),
        None => len,
    };
    start..end
}

/// Last valid page for `count` rows; 0 when there are none.
pub fn last_page(count: usize, page_size: usize) -> usize {
    if count == 0 || page_size == 0 {
        0
    } else {
        (count - 1) / page_size
    }
}

/// Range for page `index`, clamped to the last page. Returns the settled
/// index alongside the range.
pub fn page_window(count: usize, page_size: usize, index: usize) -> (usize, Range<usize>) {
    let index = index.min(last_page(count, page_size));
    let range = window(count, Some(index.saturating_mul(page_size)), Some(page_size));
    (index, range)
}
