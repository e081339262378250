//! Repository<T>: the in-memory table for one model type and the hub
//! between that table and its connectors.
//!
//! # Threading model
//!
//! `Repository<T>` is a cheap `Arc` handle and is `Send + Sync`. The table,
//! connector list and subject list each sit behind their own
//! `parking_lot::Mutex`. No lock is held while change events are emitted or
//! while a connector is called, so a connector may push rows back into the
//! repository from inside `select`.

pub mod classify;
pub mod entity;
pub mod model;

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::{debug, info, trace, warn};

use crate::config::{PaginatorDefaults, RepositoryOptions};
use crate::connector::{forward_all, Connector, ConnectorSink, RemoteTarget, WriteOp};
use crate::error::{RepositoryError, Result};
use crate::query::prefill::prefill_from_filter;
use crate::query::{Predicate, Statement};
use crate::reactive::{ChangeEvent, EventEmitter, LiveValue, Unsubscribe};
use crate::select::subject::SubjectInner;
use crate::select::{Select, SelectOne};
use crate::types::{is_metadata_key, Identity, EVERYBODY, REMOVED_KEY};

pub use classify::ClassProperties;
pub use entity::{Entity, RecordMeta};
pub use model::{Factory, Model};

use entity::{split_record, PartialMeta};

/// Generate a new random record identifier.
pub fn generate_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ============================================================================
// CreateOptions
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateOptions {
    /// Fixed uuid. An existing row with this uuid is overwritten in place.
    pub id: Option<String>,
    /// Filter text whose simple conjuncts seed the new record's fields.
    pub prefill_from: Option<String>,
    /// Connector that already holds this write.
    pub skip_connector: Option<String>,
    /// Explicit `_index`, e.g. from [`Repository::index_between`].
    pub index: Option<i64>,
}

impl CreateOptions {
    pub fn id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn prefill_from(mut self, filter: impl Into<String>) -> Self {
        self.prefill_from = Some(filter.into());
        self
    }

    pub fn skip_connector(mut self, key: impl Into<String>) -> Self {
        self.skip_connector = Some(key.into());
        self
    }

    pub fn index(mut self, index: i64) -> Self {
        self.index = Some(index);
        self
    }
}

// ============================================================================
// Inner state
// ============================================================================

pub(crate) struct RepositoryInner<T: Model> {
    name: String,
    factory: Box<dyn Factory<T>>,
    props: ClassProperties,
    options: RepositoryOptions,
    table: Mutex<HashMap<String, Arc<Entity<T>>>>,
    max_index: Mutex<Option<i64>>,
    connectors: Mutex<Vec<Arc<dyn Connector>>>,
    identity: LiveValue<Option<Identity>>,
    changes: EventEmitter<ChangeEvent>,
    subjects: Mutex<Vec<Weak<SubjectInner<T>>>>,
    listeners: Mutex<Vec<Unsubscribe>>,
    created_at: DateTime<Utc>,
    destroyed: AtomicBool,
}

/// Recursively merge `patch` into `target`. Objects merge key by key;
/// anything else replaces.
fn merge_into(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(&key) {
                    Some(slot) => merge_into(slot, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn strip_metadata(fields: Map<String, Value>) -> Value {
    Value::Object(
        fields
            .into_iter()
            .filter(|(k, _)| !is_metadata_key(k))
            .collect(),
    )
}

fn removal_record(entity: &Entity<impl Model>) -> Value {
    let mut record = entity.to_record();
    if let Some(map) = record.as_object_mut() {
        map.insert(REMOVED_KEY.to_string(), Value::Bool(true));
    }
    record
}

impl<T: Model> RepositoryInner<T> {
    fn ensure_alive(&self) -> Result<()> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(RepositoryError::Destroyed(self.name.clone()).into());
        }
        Ok(())
    }

    fn mismatch(&self, reason: impl Into<String>) -> RepositoryError {
        RepositoryError::TypeMismatch {
            model: self.name.clone(),
            reason: reason.into(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn is_private(&self) -> bool {
        self.options
            .private_mode
            .unwrap_or_else(|| self.connectors.lock().iter().any(|c| c.is_private_mode()))
    }

    pub(crate) fn top_level(&self) -> bool {
        self.options.top_level
    }

    pub(crate) fn identity(&self) -> &LiveValue<Option<Identity>> {
        &self.identity
    }

    pub(crate) fn changes(&self) -> &EventEmitter<ChangeEvent> {
        &self.changes
    }

    pub(crate) fn connectors(&self) -> Vec<Arc<dyn Connector>> {
        self.connectors.lock().clone()
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Rows whose stored record satisfies `predicate`, in no particular order.
    pub(crate) fn matching(&self, predicate: &Predicate) -> Vec<Arc<Entity<T>>> {
        self.table
            .lock()
            .values()
            .filter(|e| predicate.matches(e.record()))
            .cloned()
            .collect()
    }

    pub(crate) fn register_subject(&self, subject: Weak<SubjectInner<T>>) {
        let mut subjects = self.subjects.lock();
        subjects.retain(|s| s.strong_count() > 0);
        subjects.push(subject);
    }

    fn live_subjects(&self) -> Vec<Arc<SubjectInner<T>>> {
        self.subjects.lock().iter().filter_map(Weak::upgrade).collect()
    }

    fn prototype(&self) -> Result<Value> {
        let value = serde_json::to_value(self.factory.build())
            .map_err(|e| self.mismatch(e.to_string()))?;
        if !value.is_object() {
            return Err(self.mismatch("model does not serialize to an object").into());
        }
        Ok(value)
    }

    fn next_index(&self) -> i64 {
        let mut max = self.max_index.lock();
        let next = match *max {
            Some(current) => current.saturating_add(self.options.index_gap),
            None => 0,
        };
        *max = Some(next);
        next
    }

    fn observe_index(&self, index: i64) {
        let mut max = self.max_index.lock();
        if max.map_or(true, |current| index > current) {
            *max = Some(index);
        }
    }

    fn default_owner(&self) -> BTreeMap<String, bool> {
        let mut owner = BTreeMap::new();
        if let Some(subject) = self.identity.get().as_ref().and_then(Identity::subject_id) {
            owner.insert(subject.to_string(), true);
        }
        if !self.is_private() {
            owner.insert(EVERYBODY.to_string(), true);
        }
        owner
    }

    fn build_model(&self, fields: Value) -> Result<T> {
        let mut merged = self.prototype()?;
        merge_into(&mut merged, fields);
        serde_json::from_value(merged).map_err(|e| self.mismatch(e.to_string()).into())
    }

    /// Resolve metadata for an upsert: explicit values first, then the
    /// existing row's, then defaults.
    fn resolve_meta(&self, uuid: &str, partial: PartialMeta) -> RecordMeta {
        let existing = self.table.lock().get(uuid).map(|e| e.meta().clone());
        let index = match partial.index.or(existing.as_ref().map(|m| m.index)) {
            Some(index) => {
                self.observe_index(index);
                index
            }
            None => self.next_index(),
        };
        RecordMeta {
            owner: partial
                .owner
                .or_else(|| existing.as_ref().map(|m| m.owner.clone()))
                .unwrap_or_else(|| self.default_owner()),
            viewer: partial
                .viewer
                .or_else(|| existing.as_ref().map(|m| m.viewer.clone()))
                .unwrap_or_default(),
            index,
            removed: false,
        }
    }

    fn store(&self, entity: Entity<T>) -> Arc<Entity<T>> {
        let entity = Arc::new(entity);
        self.table
            .lock()
            .insert(entity.uuid().to_string(), Arc::clone(&entity));
        entity
    }

    fn emit(&self, event: ChangeEvent) {
        if event.ids().is_empty() {
            return;
        }
        trace!(repository = %self.name, ?event, "change");
        self.changes.emit(&event);
    }

    fn forward_except(&self, skip: Option<&str>) -> Vec<Arc<dyn Connector>> {
        self.connectors
            .lock()
            .iter()
            .filter(|c| Some(c.key()) != skip)
            .cloned()
            .collect()
    }

    /// Local create: defaults, then prefill, then `data`.
    fn create_local(&self, data: Value, options: &CreateOptions) -> Result<Arc<Entity<T>>> {
        self.ensure_alive()?;
        let mut fields = Value::Object(Map::new());
        if let Some(filter) = options.prefill_from.as_deref() {
            merge_into(&mut fields, Value::Object(prefill_from_filter(filter)));
        }
        match data {
            Value::Null => {}
            Value::Object(map) => merge_into(&mut fields, strip_metadata(map)),
            other => return Err(self.mismatch(format!("expected an object, got {other}")).into()),
        }
        let model = self.build_model(fields)?;
        let uuid = options.id.clone().unwrap_or_else(generate_uuid);
        let meta = self.resolve_meta(
            &uuid,
            PartialMeta {
                index: options.index,
                ..Default::default()
            },
        );
        let entity = self.store(Entity::new(uuid, model, meta, &self.props));
        debug!(repository = %self.name, uuid = entity.uuid(), "created");
        self.emit(ChangeEvent::Added {
            ids: vec![entity.uuid().to_string()],
            origin: None,
        });
        Ok(entity)
    }

    /// Upsert stored-record shaped values. Rows flagged `__removed` are
    /// removed instead. Returns the applied entities and removed records.
    ///
    /// Every model is built before any row is stored: a local batch with one
    /// bad record fails with the table untouched. Remote batches skip bad
    /// records instead.
    fn apply_records(
        &self,
        records: Vec<Value>,
        origin: Option<&str>,
    ) -> Result<(Vec<Arc<Entity<T>>>, Vec<Value>)> {
        self.ensure_alive()?;
        let mut built = Vec::with_capacity(records.len());
        let mut removed_ids = Vec::new();
        for record in records {
            let (fields, partial) = split_record(record);
            let uuid = partial.uuid.clone().unwrap_or_else(generate_uuid);
            if partial.removed {
                removed_ids.push(uuid);
                continue;
            }
            match self.build_model(Value::Object(fields)) {
                Ok(model) => built.push((uuid, model, partial)),
                Err(err) if origin.is_some() => {
                    warn!(repository = %self.name, %uuid, error = %err, "skipping remote record");
                }
                Err(err) => return Err(err),
            }
        }
        let applied: Vec<Arc<Entity<T>>> = built
            .into_iter()
            .map(|(uuid, model, partial)| {
                let meta = self.resolve_meta(&uuid, partial);
                self.store(Entity::new(uuid, model, meta, &self.props))
            })
            .collect();
        let origin = origin.map(str::to_string);
        self.emit(ChangeEvent::Added {
            ids: applied.iter().map(|e| e.uuid().to_string()).collect(),
            origin: origin.clone(),
        });
        let removed = self.remove_rows(&removed_ids, origin);
        Ok((applied, removed))
    }

    fn remove_rows(&self, uuids: &[String], origin: Option<String>) -> Vec<Value> {
        let removed: Vec<Arc<Entity<T>>> = {
            let mut table = self.table.lock();
            uuids.iter().filter_map(|id| table.remove(id)).collect()
        };
        self.emit(ChangeEvent::Removed {
            ids: removed.iter().map(|e| e.uuid().to_string()).collect(),
            origin,
        });
        removed.iter().map(|e| removal_record(e.as_ref())).collect()
    }

    fn replace_model(&self, uuid: &str, model: T) -> Result<Arc<Entity<T>>> {
        self.ensure_alive()?;
        let meta = self
            .table
            .lock()
            .get(uuid)
            .map(|e| e.meta().clone())
            .ok_or_else(|| RepositoryError::NotFound {
                model: self.name.clone(),
                uuid: uuid.to_string(),
            })?;
        let entity = self.store(Entity::new(uuid.to_string(), model, meta, &self.props));
        self.emit(ChangeEvent::Updated {
            ids: vec![uuid.to_string()],
            origin: None,
        });
        Ok(entity)
    }
}

impl<T: Model> RemoteTarget for RepositoryInner<T> {
    fn apply_upserts(&self, records: Vec<Value>, origin: &str) -> Vec<Value> {
        match self.apply_records(records, Some(origin)) {
            Ok((applied, _)) => applied.iter().map(|e| e.to_record()).collect(),
            Err(err) => {
                debug!(repository = %self.name, connector = origin, error = %err, "remote upsert ignored");
                Vec::new()
            }
        }
    }

    fn apply_removals(&self, uuids: &[String], origin: &str) -> Vec<Value> {
        if self.is_destroyed() {
            return Vec::new();
        }
        self.remove_rows(uuids, Some(origin.to_string()))
    }

    fn forward_targets(&self, skip: &str) -> Vec<Arc<dyn Connector>> {
        self.forward_except(Some(skip))
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

// ============================================================================
// Repository
// ============================================================================

/// In-memory table of `T` entities kept in sync with zero or more connectors.
pub struct Repository<T: Model> {
    inner: Arc<RepositoryInner<T>>,
}

impl<T: Model> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Model + Default> Repository<T> {
    /// Repository whose new records start from `T::default()`.
    pub fn with_default(options: RepositoryOptions) -> Result<Self> {
        Self::new(T::default, options)
    }
}

impl<T: Model> Repository<T> {
    /// Build a repository. One instance from `factory` is serialized to
    /// classify the model's properties.
    pub fn new(factory: impl Factory<T> + 'static, options: RepositoryOptions) -> Result<Self> {
        let name = options.name.clone().unwrap_or_else(|| {
            let full = std::any::type_name::<T>();
            full.rsplit("::").next().unwrap_or(full).to_string()
        });
        let prototype = serde_json::to_value(factory.build()).map_err(|e| {
            RepositoryError::TypeMismatch {
                model: name.clone(),
                reason: e.to_string(),
            }
        })?;
        let props = ClassProperties::classify(&name, &prototype, T::transient_fields())?;

        Ok(Self {
            inner: Arc::new(RepositoryInner {
                identity: LiveValue::new(options.identity.clone()),
                name,
                factory: Box::new(factory),
                props,
                options,
                table: Mutex::new(HashMap::new()),
                max_index: Mutex::new(None),
                connectors: Mutex::new(Vec::new()),
                changes: EventEmitter::new(),
                subjects: Mutex::new(Vec::new()),
                listeners: Mutex::new(Vec::new()),
                created_at: Utc::now(),
                destroyed: AtomicBool::new(false),
            }),
        })
    }

    pub(crate) fn from_inner(inner: Arc<RepositoryInner<T>>) -> Self {
        Self { inner }
    }

    /// Attach `connector` and return `self`, for construction chains.
    pub fn with_connector(self, connector: Arc<dyn Connector>) -> Self {
        self.connect(connector);
        self
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.is_destroyed()
    }

    pub fn is_private(&self) -> bool {
        self.inner.is_private()
    }

    pub fn class_properties(&self) -> &ClassProperties {
        &self.inner.props
    }

    // ------------------------------------------------------------------------
    // Identity and connectors
    // ------------------------------------------------------------------------

    pub fn identity(&self) -> Option<Identity> {
        self.inner.identity.get()
    }

    /// Set the caller identity. Pending queries start evaluating.
    pub fn set_identity(&self, identity: Identity) {
        self.inner.identity.set_if_changed(Some(identity));
    }

    /// Attach a connector: hand it a sink, mirror its identity, and point it
    /// at every live query.
    pub fn connect(&self, connector: Arc<dyn Connector>) {
        if self.inner.is_destroyed() {
            warn!(repository = %self.inner.name, connector = connector.key(), "connect after destroy ignored");
            return;
        }
        let weak: Weak<dyn RemoteTarget> = Arc::downgrade(&self.inner) as Weak<dyn RemoteTarget>;
        connector.connect(ConnectorSink::new(connector.key(), weak));
        self.inner.connectors.lock().push(Arc::clone(&connector));
        debug!(repository = %self.inner.name, connector = connector.key(), "connector attached");

        if let Some(source) = connector.user_uuid() {
            if let Some(identity) = source.snapshot() {
                self.inner.identity.set_if_changed(Some(identity));
            }
            // A connector dropping back to no identity is a sign-out.
            let mirror = self.inner.identity.clone();
            let unsubscribe = source.on_change(Box::new(move |identity: &Option<Identity>| {
                let identity = identity.clone().unwrap_or(Identity::Anonymous);
                mirror.set_if_changed(Some(identity));
            }));
            self.inner.listeners.lock().push(unsubscribe);
        }

        for subject in self.inner.live_subjects() {
            subject.attach(&connector);
        }
    }

    /// Keys of the attached connectors, in attach order.
    pub fn connector_keys(&self) -> Vec<String> {
        self.inner
            .connectors
            .lock()
            .iter()
            .map(|c| c.key().to_string())
            .collect()
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Create a record from `data` merged over the factory defaults.
    pub async fn create(&self, data: Value) -> Result<Arc<Entity<T>>> {
        self.create_with(data, CreateOptions::default()).await
    }

    /// Create (or overwrite, when `options.id` exists) one record, then
    /// forward it to every connector except `options.skip_connector`.
    ///
    /// The row is in the table before any connector is awaited; a connector
    /// failure is returned but does not roll the row back.
    pub async fn create_with(&self, data: Value, options: CreateOptions) -> Result<Arc<Entity<T>>> {
        let entity = self.inner.create_local(data, &options)?;
        let targets = self.inner.forward_except(options.skip_connector.as_deref());
        forward_all(targets, WriteOp::Add, vec![entity.to_record()]).await?;
        Ok(entity)
    }

    /// Upsert a batch. Values carrying `__uuid` keep their uuid and any
    /// ownership, viewer and index metadata they hold. `origin` names the
    /// connector the batch came from; it is not written back to.
    pub async fn create_many(
        &self,
        list: Vec<Value>,
        origin: Option<&str>,
    ) -> Result<Vec<Arc<Entity<T>>>> {
        let (applied, removed) = self.inner.apply_records(list, origin)?;
        let targets = self.inner.forward_except(origin);
        let added: Vec<Value> = applied.iter().map(|e| e.to_record()).collect();
        forward_all(targets.clone(), WriteOp::Add, added).await?;
        forward_all(targets, WriteOp::Remove, removed).await?;
        Ok(applied)
    }

    /// Store `entity`'s model under its uuid, keeping the row's metadata.
    pub async fn update(&self, entity: &Entity<T>, skip: Option<&str>) -> Result<Arc<Entity<T>>> {
        let updated = self.inner.replace_model(entity.uuid(), entity.model().clone())?;
        let targets = self.inner.forward_except(skip);
        forward_all(targets, WriteOp::Update, vec![updated.to_record()]).await?;
        Ok(updated)
    }

    /// Merge a JSON patch into the row's model.
    pub async fn update_value(
        &self,
        uuid: &str,
        patch: Value,
        skip: Option<&str>,
    ) -> Result<Arc<Entity<T>>> {
        let current = self.get(uuid).ok_or_else(|| RepositoryError::NotFound {
            model: self.inner.name.clone(),
            uuid: uuid.to_string(),
        })?;
        let mut value =
            serde_json::to_value(current.model()).map_err(|e| self.inner.mismatch(e.to_string()))?;
        match patch {
            Value::Object(map) => merge_into(&mut value, strip_metadata(map)),
            other => {
                return Err(self
                    .inner
                    .mismatch(format!("expected an object patch, got {other}"))
                    .into())
            }
        }
        let model: T =
            serde_json::from_value(value).map_err(|e| self.inner.mismatch(e.to_string()))?;
        let updated = self.inner.replace_model(uuid, model)?;
        let targets = self.inner.forward_except(skip);
        forward_all(targets, WriteOp::Update, vec![updated.to_record()]).await?;
        Ok(updated)
    }

    /// Remove rows. Unknown uuids are ignored. Returns how many were removed.
    pub async fn remove(&self, uuids: &[String], skip: Option<&str>) -> Result<usize> {
        self.inner.ensure_alive()?;
        let removed = self.inner.remove_rows(uuids, None);
        let count = removed.len();
        let targets = self.inner.forward_except(skip);
        forward_all(targets, WriteOp::Remove, removed).await?;
        Ok(count)
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    pub fn get(&self, uuid: &str) -> Option<Arc<Entity<T>>> {
        self.inner.table.lock().get(uuid).cloned()
    }

    /// Local row, or a one-shot fetch from the connectors in attach order.
    pub async fn fetch(&self, uuid: &str) -> Result<Option<Arc<Entity<T>>>> {
        if let Some(entity) = self.get(uuid) {
            return Ok(Some(entity));
        }
        for connector in self.inner.connectors() {
            if let Some(record) = connector.select_one_by_identifier(uuid).await? {
                let (applied, _) = self.inner.apply_records(vec![record], Some(connector.key()))?;
                return Ok(applied.into_iter().next());
            }
        }
        Ok(None)
    }

    pub fn count(&self) -> usize {
        self.inner.table.lock().len()
    }

    /// Every row ordered by `_index`.
    pub fn entities(&self) -> Vec<Arc<Entity<T>>> {
        let mut rows: Vec<_> = self.inner.table.lock().values().cloned().collect();
        rows.sort_by(|a, b| a.index().cmp(&b.index()).then_with(|| a.uuid().cmp(b.uuid())));
        rows
    }

    /// An `_index` between two neighbours for gap insertion. Open ends step
    /// one gap away from the known neighbour.
    pub fn index_between(&self, before: Option<i64>, after: Option<i64>) -> i64 {
        let gap = self.inner.options.index_gap;
        match (before, after) {
            (Some(a), Some(b)) => a + (b - a) / 2,
            (Some(a), None) => a.saturating_add(gap),
            (None, Some(b)) => b.saturating_sub(gap),
            (None, None) => self.inner.max_index.lock().map_or(0, |m| m.saturating_add(gap)),
        }
    }

    /// Listen to every table change.
    pub fn on_change(&self, callback: impl Fn(&ChangeEvent) + Send + Sync + 'static) -> Unsubscribe {
        let id = self.inner.changes.on(callback);
        let inner = Arc::clone(&self.inner);
        Box::new(move || inner.changes.off(id))
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Open a live query. Malformed statements fail here.
    pub fn select(&self, statement: Statement, defaults: PaginatorDefaults) -> Result<Select<T>> {
        self.inner.ensure_alive()?;
        Select::open(Arc::clone(&self.inner), statement, defaults)
    }

    /// Live query for a single row: the first match in statement order.
    pub fn select_one(&self, statement: Statement) -> Result<SelectOne<T>> {
        self.inner.ensure_alive()?;
        SelectOne::open(Arc::clone(&self.inner), statement)
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Tear down every live query and disconnect every connector. Safe to
    /// call more than once.
    pub async fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        let subjects: Vec<_> = std::mem::take(&mut *self.inner.subjects.lock());
        for subject in subjects.iter().filter_map(Weak::upgrade) {
            subject.close();
        }
        let listeners: Vec<_> = std::mem::take(&mut *self.inner.listeners.lock());
        for unsubscribe in listeners {
            unsubscribe();
        }
        let connectors: Vec<_> = std::mem::take(&mut *self.inner.connectors.lock());
        for connector in connectors {
            if let Err(err) = connector.disconnect().await {
                warn!(repository = %self.inner.name, connector = connector.key(), error = %err, "disconnect failed");
            }
        }
        self.inner.table.lock().clear();
        self.inner.changes.clear();
        info!(repository = %self.inner.name, "destroyed");
    }
}
