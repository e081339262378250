//! Connector boundary: one adapter per backing store.
//!
//! A repository calls into its connectors for every local write and hands
//! each live query's canonical filter to [`Connector::select`]. Connectors
//! push remote changes back through the [`ConnectorSink`] they receive on
//! [`Connector::connect`]. Every call carries the connector's key so a
//! connector never has its own writes echoed back to it.

pub mod memory;

use std::fmt;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ConnectorError;
use crate::query::Predicate;
use crate::reactive::Reactive;
use crate::types::Identity;

pub use memory::{ConnectorCall, MemoryConnector};

// ============================================================================
// SelectRequest
// ============================================================================

/// A live query's filter as forwarded to connectors.
///
/// `query_id` stays the same for the life of one query, so a request with a
/// known id replaces that query's earlier subscription.
#[derive(Debug, Clone)]
pub struct SelectRequest {
    pub query_id: u64,
    /// Canonical filter text, ownership terms included.
    pub sql: String,
    pub predicate: Arc<Predicate>,
}

impl SelectRequest {
    pub fn new(query_id: u64, predicate: Predicate) -> Self {
        Self {
            query_id,
            sql: predicate.to_string(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn matches(&self, record: &Value) -> bool {
        self.predicate.matches(record)
    }
}

impl PartialEq for SelectRequest {
    fn eq(&self, other: &Self) -> bool {
        self.query_id == other.query_id && self.sql == other.sql
    }
}

// ============================================================================
// Connector
// ============================================================================

#[async_trait]
pub trait Connector: Send + Sync {
    /// Stable key identifying this connector in anti-echo bookkeeping.
    fn key(&self) -> &str;

    /// Called once when attached to a repository.
    fn connect(&self, sink: ConnectorSink);

    /// Persist new records. May be a merge.
    async fn add(&self, records: &[Value]) -> Result<(), ConnectorError>;

    async fn update(&self, records: &[Value]) -> Result<(), ConnectorError>;

    /// Delete records. Each carries `__removed: true`.
    async fn remove(&self, records: &[Value]) -> Result<(), ConnectorError>;

    /// (Re-)establish the live subscription for one query. Matching remote
    /// rows are delivered through the sink. A request carrying the
    /// `query_id` of an existing subscription replaces it.
    fn select(&self, request: &SelectRequest);

    /// Drop the live subscription of a closed query. Unknown ids are ignored.
    fn release(&self, query_id: u64);

    /// One-shot fetch of a single record.
    async fn select_one_by_identifier(&self, uuid: &str) -> Result<Option<Value>, ConnectorError>;

    /// Caller identity as seen by this store, when it has one.
    fn user_uuid(&self) -> Option<Arc<dyn Reactive<Option<Identity>>>> {
        None
    }

    fn is_private_mode(&self) -> bool {
        false
    }

    async fn disconnect(&self) -> Result<(), ConnectorError>;
}

// ============================================================================
// Forwarding
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteOp {
    Add,
    Update,
    Remove,
}

/// Send `records` to every target, trying all of them. Failures are logged;
/// the first one is returned.
pub(crate) async fn forward_all(
    targets: Vec<Arc<dyn Connector>>,
    op: WriteOp,
    records: Vec<Value>,
) -> Result<(), ConnectorError> {
    if records.is_empty() {
        return Ok(());
    }
    let mut first_error = None;
    for connector in targets {
        let result = match op {
            WriteOp::Add => connector.add(&records).await,
            WriteOp::Update => connector.update(&records).await,
            WriteOp::Remove => connector.remove(&records).await,
        };
        if let Err(err) = result {
            warn!(connector = connector.key(), ?op, error = %err, "connector write failed");
            first_error.get_or_insert(err);
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

// ============================================================================
// ConnectorSink
// ============================================================================

/// The repository side a sink writes into.
pub(crate) trait RemoteTarget: Send + Sync {
    /// Upsert remote records; returns the stored records actually applied.
    fn apply_upserts(&self, records: Vec<Value>, origin: &str) -> Vec<Value>;

    /// Remove rows; returns their final stored records.
    fn apply_removals(&self, uuids: &[String], origin: &str) -> Vec<Value>;

    /// Every attached connector except `skip`.
    fn forward_targets(&self, skip: &str) -> Vec<Arc<dyn Connector>>;

    fn created_at(&self) -> DateTime<Utc>;
}

/// Handle a connector uses to push remote changes into its repository.
///
/// Holds the repository weakly; once the repository is gone every call is a
/// no-op.
#[derive(Clone)]
pub struct ConnectorSink {
    key: String,
    target: Weak<dyn RemoteTarget>,
}

impl fmt::Debug for ConnectorSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorSink")
            .field("key", &self.key)
            .field("attached", &(self.target.strong_count() > 0))
            .finish()
    }
}

impl ConnectorSink {
    pub(crate) fn new(key: impl Into<String>, target: Weak<dyn RemoteTarget>) -> Self {
        Self {
            key: key.into(),
            target,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// When the repository was created, or `None` once it is gone.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.target.upgrade().map(|t| t.created_at())
    }

    /// Whether a snapshot stamped at `stamp` predates the repository.
    pub fn is_stale(&self, stamp: DateTime<Utc>) -> bool {
        self.created_at().is_some_and(|created| stamp < created)
    }

    /// Apply remote records locally, then forward them to the other
    /// connectors in the background when a tokio runtime is available.
    /// Returns the number of records applied.
    pub fn upsert(&self, records: Vec<Value>, stamped_at: Option<DateTime<Utc>>) -> usize {
        let Some((applied, targets)) = self.apply(records, stamped_at) else {
            return 0;
        };
        let count = applied.len();
        self.spawn_forward(targets, WriteOp::Add, applied);
        count
    }

    /// Like [`upsert`](Self::upsert) but awaits forwarding and reports the
    /// first connector failure.
    pub async fn upsert_and_forward(
        &self,
        records: Vec<Value>,
        stamped_at: Option<DateTime<Utc>>,
    ) -> Result<usize, ConnectorError> {
        let Some((applied, targets)) = self.apply(records, stamped_at) else {
            return Ok(0);
        };
        let count = applied.len();
        forward_all(targets, WriteOp::Add, applied).await?;
        Ok(count)
    }

    /// Remove rows deleted remotely. Returns the number removed.
    pub fn remove(&self, uuids: &[String]) -> usize {
        let Some(target) = self.target.upgrade() else {
            return 0;
        };
        let removed = target.apply_removals(uuids, &self.key);
        let count = removed.len();
        let targets = target.forward_targets(&self.key);
        drop(target);
        self.spawn_forward(targets, WriteOp::Remove, removed);
        count
    }

    fn apply(
        &self,
        records: Vec<Value>,
        stamped_at: Option<DateTime<Utc>>,
    ) -> Option<(Vec<Value>, Vec<Arc<dyn Connector>>)> {
        let target = self.target.upgrade()?;
        if let Some(stamp) = stamped_at {
            if stamp < target.created_at() {
                debug!(connector = %self.key, %stamp, "ignoring stale remote snapshot");
                return None;
            }
        }
        let applied = target.apply_upserts(records, &self.key);
        Some((applied, target.forward_targets(&self.key)))
    }

    fn spawn_forward(&self, targets: Vec<Arc<dyn Connector>>, op: WriteOp, records: Vec<Value>) {
        if targets.is_empty() || records.is_empty() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let _ = forward_all(targets, op, records).await;
                });
            }
            Err(_) => {
                warn!(connector = %self.key, ?op, "no async runtime, remote change not forwarded");
            }
        }
    }
}
