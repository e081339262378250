//! Select<T> and SelectOne<T>: caller-facing live query handles.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;

use crate::config::{PaginatorDefaults, DEFAULT_PAGE_SIZE_OPTIONS};
use crate::error::{LiveSetError, Result};
use crate::query::Statement;
use crate::reactive::Unsubscribe;
use crate::repository::{CreateOptions, Entity, Model, Repository, RepositoryInner};

use super::paginator::QueryPaginator;
use super::subject::{QueryState, QuerySubject, ResultSet, Window};

fn initial_window(defaults: PaginatorDefaults) -> Window {
    let mut page_size_options = if defaults.page_size_options.is_empty() {
        DEFAULT_PAGE_SIZE_OPTIONS.to_vec()
    } else {
        defaults.page_size_options
    };
    if let Some(size) = defaults.page_size {
        if !page_size_options.contains(&size) {
            page_size_options.push(size);
        }
    }
    page_size_options.sort_unstable();
    page_size_options.dedup();
    Window {
        page_index: 0,
        page_size: defaults.page_size,
        page_size_options,
        page_sort: defaults.page_sort,
    }
}

// ============================================================================
// Select
// ============================================================================

/// A live query with pagination, selection and filter-aware creation.
pub struct Select<T: Model> {
    repo: Repository<T>,
    subject: QuerySubject<T>,
    paginator: QueryPaginator<T>,
}

impl<T: Model> Clone for Select<T> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            subject: self.subject.clone(),
            paginator: self.paginator.clone(),
        }
    }
}

impl<T: Model> Select<T> {
    pub(crate) fn open(
        repo: Arc<RepositoryInner<T>>,
        statement: Statement,
        defaults: PaginatorDefaults,
    ) -> Result<Self> {
        let subject = QuerySubject::open(Arc::clone(&repo), statement, initial_window(defaults))?;
        let paginator = QueryPaginator::new(&subject);
        Ok(Self {
            repo: Repository::from_inner(repo),
            subject,
            paginator,
        })
    }

    pub fn subject(&self) -> &QuerySubject<T> {
        &self.subject
    }

    pub fn paginator(&self) -> &QueryPaginator<T> {
        &self.paginator
    }

    /// Current window; empty until the first evaluation.
    pub fn results(&self) -> Vec<Arc<Entity<T>>> {
        self.subject
            .result_set()
            .map(|set| set.results.clone())
            .unwrap_or_default()
    }

    /// Current window once the query has settled.
    pub async fn results_async(&self) -> Result<Vec<Arc<Entity<T>>>> {
        Ok(self.subject.ready().await?.results.clone())
    }

    pub fn result_set(&self) -> Option<Arc<ResultSet<T>>> {
        self.subject.result_set()
    }

    /// Total matches before windowing; 0 until the first evaluation.
    pub fn count(&self) -> usize {
        self.subject.result_set().map_or(0, |set| set.count)
    }

    pub fn watch(&self) -> watch::Receiver<QueryState<T>> {
        self.subject.watch()
    }

    pub fn subscribe(
        &self,
        on_result: impl Fn(&Arc<ResultSet<T>>) + Send + Sync + 'static,
        on_error: impl Fn(&LiveSetError) + Send + Sync + 'static,
    ) -> Unsubscribe {
        self.subject.subscribe(on_result, on_error)
    }

    /// Create a record seeded from this select's active filter, so it lands
    /// in this view.
    pub async fn create(&self, data: Value) -> Result<Arc<Entity<T>>> {
        self.create_with_options(data, CreateOptions::default()).await
    }

    pub async fn create_with_id(&self, data: Value, id: impl Into<String>) -> Result<Arc<Entity<T>>> {
        self.create_with_options(data, CreateOptions::id(id)).await
    }

    async fn create_with_options(
        &self,
        data: Value,
        mut options: CreateOptions,
    ) -> Result<Arc<Entity<T>>> {
        options.prefill_from = self.subject.filter();
        self.repo.create_with(data, options).await
    }

    pub fn unsubscribe(&self) {
        self.subject.unsubscribe();
    }
}

// ============================================================================
// SelectOne
// ============================================================================

/// A live query tracking only its first match.
pub struct SelectOne<T: Model> {
    subject: QuerySubject<T>,
}

impl<T: Model> Clone for SelectOne<T> {
    fn clone(&self) -> Self {
        Self {
            subject: self.subject.clone(),
        }
    }
}

impl<T: Model> SelectOne<T> {
    pub(crate) fn open(repo: Arc<RepositoryInner<T>>, statement: Statement) -> Result<Self> {
        let subject = QuerySubject::open(repo, statement, initial_window(PaginatorDefaults::default()))?;
        Ok(Self { subject })
    }

    fn first(set: &ResultSet<T>) -> Option<Arc<Entity<T>>> {
        set.results.first().cloned()
    }

    pub fn current(&self) -> Option<Arc<Entity<T>>> {
        self.subject.result_set().and_then(|set| Self::first(&set))
    }

    pub async fn first_async(&self) -> Result<Option<Arc<Entity<T>>>> {
        Ok(Self::first(&*self.subject.ready().await?))
    }

    pub fn watch(&self) -> watch::Receiver<QueryState<T>> {
        self.subject.watch()
    }

    pub fn subscribe(
        &self,
        on_value: impl Fn(Option<Arc<Entity<T>>>) + Send + Sync + 'static,
        on_error: impl Fn(&LiveSetError) + Send + Sync + 'static,
    ) -> Unsubscribe {
        self.subject
            .subscribe(move |set| on_value(Self::first(set)), on_error)
    }

    pub fn unsubscribe(&self) {
        self.subject.unsubscribe();
    }
}
