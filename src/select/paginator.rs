//! QueryPaginator<T>: windowing and multi-select over one live query.
//!
//! Window changes take effect immediately: each setter updates the window
//! and recomputes. An out-of-range page index settles to the last valid page
//! within the same recompute. The selection is a set of uuids independent of
//! the visible page and is pruned to the matching rows on every recompute.

use std::sync::Arc;

use tokio::sync::watch;

use crate::config::PageSort;
use crate::reactive::Unsubscribe;
use crate::repository::{Entity, Model};

use super::subject::{QuerySubject, SubjectInner};

pub struct QueryPaginator<T: Model> {
    subject: Arc<SubjectInner<T>>,
}

impl<T: Model> Clone for QueryPaginator<T> {
    fn clone(&self) -> Self {
        Self {
            subject: Arc::clone(&self.subject),
        }
    }
}

impl<T: Model> QueryPaginator<T> {
    pub(crate) fn new(subject: &QuerySubject<T>) -> Self {
        Self {
            subject: Arc::clone(subject.inner()),
        }
    }

    fn matching_ids(&self) -> Vec<String> {
        self.subject
            .current()
            .result()
            .map(|set| {
                set.results_all
                    .iter()
                    .map(|e| e.uuid().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn matching_count(&self) -> usize {
        self.subject.current().result().map_or(0, |set| set.count)
    }

    // ------------------------------------------------------------------------
    // Window
    // ------------------------------------------------------------------------

    pub fn page_index(&self) -> usize {
        self.subject.window.lock().page_index
    }

    pub fn page_size(&self) -> Option<usize> {
        self.subject.window.lock().page_size
    }

    pub fn page_size_options(&self) -> Vec<usize> {
        self.subject.window.lock().page_size_options.clone()
    }

    pub fn page_sort(&self) -> Option<PageSort> {
        self.subject.window.lock().page_sort.clone()
    }

    /// Number of pages for the latest count; at least 1 when paging.
    pub fn page_count(&self) -> usize {
        match self.page_size() {
            Some(size) if size > 0 => self.matching_count().div_ceil(size).max(1),
            _ => 1,
        }
    }

    pub fn set_page_index(&self, index: usize) {
        self.subject.window.lock().page_index = index;
        self.subject.trigger();
    }

    /// Set the page size. Sizes not yet offered are added to the options.
    pub fn set_page_size(&self, size: usize) {
        {
            let mut window = self.subject.window.lock();
            window.page_size = Some(size);
            extend_options(&mut window.page_size_options, size);
        }
        self.subject.trigger();
    }

    /// Set index and size together with a single recompute.
    pub fn set_page(&self, index: usize, size: usize) {
        {
            let mut window = self.subject.window.lock();
            window.page_index = index;
            window.page_size = Some(size);
            extend_options(&mut window.page_size_options, size);
        }
        self.subject.trigger();
    }

    /// Explicit sort, taking precedence over the statement's `order_by`.
    /// `None` restores it.
    pub fn set_page_sort(&self, sort: Option<PageSort>) {
        self.subject.window.lock().page_sort = sort;
        self.subject.trigger();
    }

    // ------------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------------

    /// Toggle one row, or with `None` every matching row: select all unless
    /// all are already selected, in which case clear.
    pub fn toggle_selection(&self, uuid: Option<&str>) {
        let matching = self.matching_ids();
        match uuid {
            Some(uuid) => self.subject.update_selection(|selection| {
                if let Some(pos) = selection.iter().position(|id| id == uuid) {
                    selection.remove(pos);
                } else if matching.iter().any(|id| id == uuid) {
                    selection.push(uuid.to_string());
                }
            }),
            None => self.subject.update_selection(|selection| {
                let all_selected =
                    !matching.is_empty() && matching.iter().all(|id| selection.contains(id));
                if all_selected {
                    selection.clear();
                } else {
                    *selection = matching;
                }
            }),
        }
    }

    /// Add matching rows to the selection; unknown uuids are ignored.
    pub fn select_many(&self, uuids: &[String]) {
        let matching = self.matching_ids();
        self.subject.update_selection(|selection| {
            for uuid in uuids {
                if matching.contains(uuid) && !selection.contains(uuid) {
                    selection.push(uuid.clone());
                }
            }
        });
    }

    pub fn clear_selection(&self) {
        self.subject.update_selection(Vec::clear);
    }

    pub fn is_selected(&self, uuid: &str) -> bool {
        self.subject.selection.lock().iter().any(|id| id == uuid)
    }

    /// Selected uuids in selection order.
    pub fn selected_ids(&self) -> Vec<String> {
        self.subject.selection.lock().clone()
    }

    /// Selected rows in result order.
    pub fn selected(&self) -> Vec<Arc<Entity<T>>> {
        let selection = self.selected_ids();
        self.subject
            .current()
            .result()
            .map(|set| {
                set.results_all
                    .iter()
                    .filter(|e| selection.iter().any(|id| id == e.uuid()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn selected_count(&self) -> usize {
        self.subject.selection.lock().len()
    }

    /// Receiver tracking the selected count.
    pub fn watch_selected_count(&self) -> watch::Receiver<usize> {
        self.subject.selected_count.subscribe()
    }

    /// True when something is selected and everything matching is.
    pub fn is_selected_all(&self) -> bool {
        let selected = self.selected_count();
        selected > 0 && selected == self.matching_count()
    }

    pub fn on_selection_change(
        &self,
        callback: impl Fn(&Vec<String>) + Send + Sync + 'static,
    ) -> Unsubscribe {
        let id = self.subject.selection_changes.on(callback);
        let subject = Arc::clone(&self.subject);
        Box::new(move || subject.selection_changes.off(id))
    }
}

fn extend_options(options: &mut Vec<usize>, size: usize) {
    if !options.contains(&size) {
        options.push(size);
        options.sort_unstable();
    }
}
