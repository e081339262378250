//! QuerySubject<T>: one live query over a repository's table.
//!
//! Each evaluation cycle:
//! 1. waits (without blocking) until the repository knows the caller,
//! 2. snapshots every parameter and binds the compiled filter,
//! 3. adds ownership terms and the proximity filter,
//! 4. filters, orders, counts and windows the table,
//! 5. publishes the result set,
//! 6. forwards the canonical filter to the connectors when it changed.
//!
//! Cycles are triggered by parameter changes, table changes, identity
//! changes and paginator changes. Triggers arriving while a cycle runs are
//! coalesced into one more cycle that reads the latest snapshots.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::config::PageSort;
use crate::connector::{Connector, SelectRequest};
use crate::error::{LiveSetError, Result};
use crate::geo::{self, GeoPoint};
use crate::query::execute::{page_window, sort_rows, window};
use crate::query::{AccessScope, CompiledStatement, Predicate, SortEntry, Statement};
use crate::reactive::{EventEmitter, Reactive, Unsubscribe};
use crate::repository::{Entity, Model, RepositoryInner};
use crate::types::{Direction, INDEX_KEY};

// ============================================================================
// Results
// ============================================================================

/// One published evaluation.
#[derive(Debug)]
pub struct ResultSet<T> {
    /// Every visible match, ordered, before windowing.
    pub results_all: Vec<Arc<Entity<T>>>,
    /// The current window of `results_all`.
    pub results: Vec<Arc<Entity<T>>>,
    /// `results_all.len()`.
    pub count: usize,
    /// Settled page index when a paginator governs the window.
    pub page_index: Option<usize>,
    /// Resolved user filter, parameters inlined. Empty when unfiltered.
    pub filter: String,
}

impl<T: Model> ResultSet<T> {
    /// Centroid of the located entries in `results_all`.
    pub fn center(&self) -> Option<GeoPoint> {
        geo::centroid(self.results_all.iter().filter_map(|e| e.location()))
    }

    pub fn uuids(&self) -> Vec<String> {
        self.results.iter().map(|e| e.uuid().to_string()).collect()
    }
}

#[derive(Debug)]
pub enum QueryState<T> {
    /// No evaluation has completed yet.
    Pending,
    Ready(Arc<ResultSet<T>>),
    Failed(LiveSetError),
}

impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Pending => Self::Pending,
            Self::Ready(set) => Self::Ready(Arc::clone(set)),
            Self::Failed(err) => Self::Failed(err.clone()),
        }
    }
}

impl<T> QueryState<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn result(&self) -> Option<&Arc<ResultSet<T>>> {
        match self {
            Self::Ready(set) => Some(set),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&LiveSetError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// `Pending` maps to [`LiveSetError::Closed`].
    pub fn into_result(self) -> Result<Arc<ResultSet<T>>> {
        match self {
            Self::Ready(set) => Ok(set),
            Self::Failed(err) => Err(err),
            Self::Pending => Err(LiveSetError::Closed),
        }
    }
}

// ============================================================================
// Inner state
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Window {
    pub page_index: usize,
    pub page_size: Option<usize>,
    pub page_size_options: Vec<usize>,
    pub page_sort: Option<PageSort>,
}

static NEXT_QUERY_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) struct SubjectInner<T: Model> {
    id: u64,
    repo: Arc<RepositoryInner<T>>,
    compiled: CompiledStatement,
    pub(crate) window: Mutex<Window>,
    pub(crate) selection: Mutex<Vec<String>>,
    pub(crate) selected_count: watch::Sender<usize>,
    pub(crate) selection_changes: EventEmitter<Vec<String>>,
    state: watch::Sender<QueryState<T>>,
    results: EventEmitter<QueryState<T>>,
    last_request: Mutex<Option<SelectRequest>>,
    pending: AtomicBool,
    running: AtomicBool,
    closed: AtomicBool,
    subscriptions: Mutex<Vec<Unsubscribe>>,
}

impl<T: Model> SubjectInner<T> {
    pub(crate) fn current(&self) -> QueryState<T> {
        self.state.borrow().clone()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Request a recompute. Runs it now unless a cycle is already running,
    /// in which case that cycle's loop picks it up.
    pub(crate) fn trigger(&self) {
        self.pending.store(true, Ordering::SeqCst);
        loop {
            if self.running.swap(true, Ordering::SeqCst) {
                return;
            }
            while self.pending.swap(false, Ordering::SeqCst) {
                self.run_cycle();
            }
            self.running.store(false, Ordering::SeqCst);
            if !self.pending.load(Ordering::SeqCst) {
                return;
            }
        }
    }

    fn run_cycle(&self) {
        if self.is_closed() {
            return;
        }
        match self.evaluate() {
            Ok(None) => trace!(repository = self.repo.name(), "waiting for identity"),
            Ok(Some((set, request))) => {
                debug!(
                    repository = self.repo.name(),
                    count = set.count,
                    window = set.results.len(),
                    "publish"
                );
                self.prune_selection(&set);
                self.publish(QueryState::Ready(Arc::new(set)));
                self.retarget(request);
            }
            Err(err) => {
                warn!(repository = self.repo.name(), error = %err, "query evaluation failed");
                self.publish(QueryState::Failed(err));
            }
        }
    }

    fn sort_keys(&self, page_sort: Option<PageSort>) -> Vec<SortEntry> {
        if let Some(sort) = page_sort {
            return vec![SortEntry::new(sort.active, sort.direction)];
        }
        if !self.compiled.order().is_empty() {
            return self.compiled.order().to_vec();
        }
        if self.repo.top_level() {
            return vec![SortEntry::new(INDEX_KEY, Direction::Asc)];
        }
        Vec::new()
    }

    fn evaluate(&self) -> Result<Option<(ResultSet<T>, SelectRequest)>> {
        let Some(identity) = self.repo.identity().get() else {
            return Ok(None);
        };
        let resolved = self.compiled.resolve()?;
        let filter = match &resolved.predicate {
            Predicate::Const(true) => String::new(),
            other => other.to_string(),
        };
        let scope = AccessScope {
            identity,
            private: self.repo.is_private(),
        };
        let predicate = scope.compose(resolved.predicate, self.compiled.flags, self.compiled.near);

        let mut rows = self.repo.matching(&predicate);
        let current = self.window.lock().clone();
        sort_rows(&mut rows, &self.sort_keys(current.page_sort), |e| e.record());

        let count = rows.len();
        let (page_index, range) = match current.page_size {
            Some(size) => {
                let (settled, range) = page_window(count, size, current.page_index);
                if settled != current.page_index {
                    let mut window = self.window.lock();
                    if window.page_index > settled {
                        debug!(from = window.page_index, to = settled, "page index clamped");
                        window.page_index = settled;
                    }
                }
                (Some(settled), range)
            }
            None => (None, window(count, resolved.offset, resolved.limit)),
        };
        let results = rows[range].to_vec();

        Ok(Some((
            ResultSet {
                results_all: rows,
                results,
                count,
                page_index,
                filter,
            },
            SelectRequest::new(self.id, predicate),
        )))
    }

    fn publish(&self, state: QueryState<T>) {
        self.state.send_replace(state.clone());
        self.results.emit(&state);
    }

    fn prune_selection(&self, set: &ResultSet<T>) {
        self.update_selection(|selection| {
            selection.retain(|id| set.results_all.iter().any(|e| e.uuid() == id));
        });
    }

    /// Apply `f` to the selection and notify when it changed.
    pub(crate) fn update_selection(&self, f: impl FnOnce(&mut Vec<String>)) {
        let changed = {
            let mut selection = self.selection.lock();
            let before = selection.clone();
            f(&mut selection);
            (*selection != before).then(|| selection.clone())
        };
        if let Some(selection) = changed {
            self.selected_count.send_replace(selection.len());
            self.selection_changes.emit(&selection);
        }
    }

    fn retarget(&self, request: SelectRequest) {
        {
            let mut last = self.last_request.lock();
            if last.as_ref() == Some(&request) {
                return;
            }
            *last = Some(request.clone());
        }
        debug!(repository = self.repo.name(), sql = %request.sql, "retarget connectors");
        for connector in self.repo.connectors() {
            connector.select(&request);
        }
    }

    /// Point a newly attached connector at this query.
    pub(crate) fn attach(&self, connector: &Arc<dyn Connector>) {
        let before = self.last_request.lock().clone();
        // Private mode may have flipped with the new connector.
        self.trigger();
        let after = self.last_request.lock().clone();
        if before == after {
            if let Some(request) = after {
                connector.select(&request);
            }
        }
    }

    /// Tell every connector this query's subscription is gone.
    fn release_connectors(&self) {
        if self.last_request.lock().take().is_none() {
            return;
        }
        debug!(repository = self.repo.name(), query_id = self.id, "release connectors");
        for connector in self.repo.connectors() {
            connector.release(self.id);
        }
    }

    /// Release every subscription, connector subscriptions included.
    /// Idempotent.
    pub(crate) fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let subscriptions: Vec<_> = std::mem::take(&mut *self.subscriptions.lock());
        for unsubscribe in subscriptions {
            unsubscribe();
        }
        self.release_connectors();
        let pending = self.state.borrow().is_pending();
        if pending {
            self.state.send_replace(QueryState::Failed(LiveSetError::Closed));
        }
        self.results.clear();
        self.selection_changes.clear();
    }
}

impl<T: Model> Drop for SubjectInner<T> {
    fn drop(&mut self) {
        for unsubscribe in std::mem::take(self.subscriptions.get_mut()) {
            unsubscribe();
        }
        if !self.is_closed() {
            self.release_connectors();
        }
    }
}

// ============================================================================
// QuerySubject
// ============================================================================

/// A live, reactively updated result set for one statement.
pub struct QuerySubject<T: Model> {
    inner: Arc<SubjectInner<T>>,
}

impl<T: Model> Clone for QuerySubject<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Model> QuerySubject<T> {
    /// Compile `statement`, subscribe to everything it depends on and run
    /// the first evaluation.
    pub(crate) fn open(
        repo: Arc<RepositoryInner<T>>,
        statement: Statement,
        window: Window,
    ) -> Result<Self> {
        let compiled = CompiledStatement::compile(&statement)?;
        let inner = Arc::new(SubjectInner {
            id: NEXT_QUERY_ID.fetch_add(1, Ordering::Relaxed),
            repo: Arc::clone(&repo),
            compiled,
            window: Mutex::new(window),
            selection: Mutex::new(Vec::new()),
            selected_count: watch::channel(0).0,
            selection_changes: EventEmitter::new(),
            state: watch::channel(QueryState::Pending).0,
            results: EventEmitter::new(),
            last_request: Mutex::new(None),
            pending: AtomicBool::new(false),
            running: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            subscriptions: Mutex::new(Vec::new()),
        });

        let mut subscriptions: Vec<Unsubscribe> = Vec::new();
        for source in inner.compiled.reactive_sources() {
            let weak = Arc::downgrade(&inner);
            subscriptions.push(source.on_change(Box::new(move |_| retrigger(&weak))));
        }
        let weak = Arc::downgrade(&inner);
        let id = repo.changes().on(move |_| retrigger(&weak));
        let changes_repo = Arc::clone(&repo);
        subscriptions.push(Box::new(move || changes_repo.changes().off(id)));

        let weak = Arc::downgrade(&inner);
        subscriptions.push(repo.identity().on_change(Box::new(move |_| retrigger(&weak))));

        *inner.subscriptions.lock() = subscriptions;
        repo.register_subject(Arc::downgrade(&inner));
        inner.trigger();
        Ok(Self { inner })
    }

    pub(crate) fn inner(&self) -> &Arc<SubjectInner<T>> {
        &self.inner
    }

    /// Latest published state.
    pub fn state(&self) -> QueryState<T> {
        self.inner.current()
    }

    /// Latest result set, if one has been published.
    pub fn result_set(&self) -> Option<Arc<ResultSet<T>>> {
        self.inner.current().result().cloned()
    }

    /// Receiver observing every published state.
    pub fn watch(&self) -> watch::Receiver<QueryState<T>> {
        self.inner.state.subscribe()
    }

    /// Wait for the first settled state (ready or failed).
    pub async fn ready(&self) -> Result<Arc<ResultSet<T>>> {
        let mut rx = self.inner.state.subscribe();
        let state = rx
            .wait_for(|s| !s.is_pending())
            .await
            .map_err(|_| LiveSetError::Closed)?
            .clone();
        state.into_result()
    }

    /// Call `on_result` for every published result set and `on_error` for
    /// every failed evaluation. The current state is replayed first.
    pub fn subscribe(
        &self,
        on_result: impl Fn(&Arc<ResultSet<T>>) + Send + Sync + 'static,
        on_error: impl Fn(&LiveSetError) + Send + Sync + 'static,
    ) -> Unsubscribe {
        let dispatch = move |state: &QueryState<T>| match state {
            QueryState::Ready(set) => on_result(set),
            QueryState::Failed(err) => on_error(err),
            QueryState::Pending => {}
        };
        dispatch(&self.inner.current());
        let id = self.inner.results.on(dispatch);
        let inner = Arc::clone(&self.inner);
        Box::new(move || inner.results.off(id))
    }

    /// Force a recompute.
    pub fn invalidate(&self) {
        self.inner.trigger();
    }

    /// Stop re-evaluating and release every subscription. Idempotent.
    pub fn unsubscribe(&self) {
        self.inner.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Resolved user filter of the latest result set.
    pub fn filter(&self) -> Option<String> {
        self.result_set()
            .map(|set| set.filter.clone())
            .filter(|f| !f.is_empty())
    }

    /// Identifier carried by every [`SelectRequest`] this query sends.
    pub fn query_id(&self) -> u64 {
        self.inner.id
    }

    /// Canonical filter text last forwarded to connectors.
    pub fn forwarded_sql(&self) -> Option<String> {
        self.inner.last_request.lock().as_ref().map(|r| r.sql.clone())
    }
}

fn retrigger<T: Model>(weak: &Weak<SubjectInner<T>>) {
    if let Some(subject) = weak.upgrade() {
        subject.trigger();
    }
}
