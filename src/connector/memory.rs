//! In-process connector modelling a remote document store.
//!
//! Holds stored records keyed by uuid, keeps the live subscriptions handed
//! to it through `select`, and pushes matching rows into its sink. Remote
//! activity is simulated with [`MemoryConnector::push_remote`] and
//! [`MemoryConnector::delete_remote`]. Every call is logged, and the next
//! write can be made to fail.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use crate::error::ConnectorError;
use crate::reactive::{LiveValue, Reactive};
use crate::types::{Identity, UUID_KEY};

use super::{Connector, ConnectorSink, SelectRequest};

/// One logged call. Write calls carry the affected uuids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorCall {
    Add(Vec<String>),
    Update(Vec<String>),
    Remove(Vec<String>),
    Select(String),
    Release(u64),
    FetchOne(String),
    Disconnect,
}

#[derive(Default)]
struct MemoryState {
    records: BTreeMap<String, Value>,
    calls: Vec<ConnectorCall>,
    subscriptions: Vec<SelectRequest>,
    sink: Option<ConnectorSink>,
    fail_next: Option<String>,
}

pub struct MemoryConnector {
    key: String,
    private: bool,
    identity: LiveValue<Option<Identity>>,
    state: Mutex<MemoryState>,
}

fn uuid_of(record: &Value) -> Option<String> {
    record.get(UUID_KEY).and_then(Value::as_str).map(str::to_string)
}

fn uuids(records: &[Value]) -> Vec<String> {
    records.iter().filter_map(uuid_of).collect()
}

impl MemoryConnector {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            private: false,
            identity: LiveValue::new(None),
            state: Mutex::new(MemoryState::default()),
        }
    }

    pub fn with_identity(self, identity: Identity) -> Self {
        self.identity.set(Some(identity));
        self
    }

    pub fn private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }

    /// Seed the remote store before it is connected.
    pub fn with_records(self, records: Vec<Value>) -> Self {
        {
            let mut state = self.state.lock();
            for record in records {
                if let Some(uuid) = uuid_of(&record) {
                    state.records.insert(uuid, record);
                }
            }
        }
        self
    }

    /// Publish a new caller identity, as a sign-in would.
    pub fn set_identity(&self, identity: Option<Identity>) {
        self.identity.set_if_changed(identity);
    }

    /// Make the next `add`/`update`/`remove` fail with `message`.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.state.lock().fail_next = Some(message.into());
    }

    pub fn calls(&self) -> Vec<ConnectorCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn records(&self) -> Vec<Value> {
        self.state.lock().records.values().cloned().collect()
    }

    pub fn record(&self, uuid: &str) -> Option<Value> {
        self.state.lock().records.get(uuid).cloned()
    }

    /// Canonical text of every live subscription.
    pub fn subscriptions(&self) -> Vec<String> {
        self.state
            .lock()
            .subscriptions
            .iter()
            .map(|r| r.sql.clone())
            .collect()
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().sink.is_some()
    }

    /// Simulate a remote write: store the records, then deliver the ones a
    /// live subscription matches. Returns how many the repository applied.
    pub async fn push_remote(
        &self,
        records: Vec<Value>,
        stamped_at: Option<DateTime<Utc>>,
    ) -> Result<usize, ConnectorError> {
        let (sink, matching) = {
            let mut state = self.state.lock();
            for record in &records {
                if let Some(uuid) = uuid_of(record) {
                    state.records.insert(uuid, record.clone());
                }
            }
            let matching: Vec<Value> = records
                .into_iter()
                .filter(|r| state.subscriptions.iter().any(|s| s.matches(r)))
                .collect();
            (state.sink.clone(), matching)
        };
        match sink {
            Some(sink) if !matching.is_empty() => sink.upsert_and_forward(matching, stamped_at).await,
            _ => Ok(0),
        }
    }

    /// Simulate a remote delete.
    pub async fn delete_remote(&self, uuids: &[String]) -> usize {
        let sink = {
            let mut state = self.state.lock();
            for uuid in uuids {
                state.records.remove(uuid);
            }
            state.sink.clone()
        };
        match sink {
            Some(sink) => sink.remove(uuids),
            None => 0,
        }
    }

    fn write(
        &self,
        call: ConnectorCall,
        records: &[Value],
        store: bool,
    ) -> Result<(), ConnectorError> {
        let mut state = self.state.lock();
        state.calls.push(call);
        if let Some(message) = state.fail_next.take() {
            return Err(ConnectorError::new(&self.key, message));
        }
        for record in records {
            if let Some(uuid) = uuid_of(record) {
                if store {
                    state.records.insert(uuid, record.clone());
                } else {
                    state.records.remove(&uuid);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    fn key(&self) -> &str {
        &self.key
    }

    fn connect(&self, sink: ConnectorSink) {
        self.state.lock().sink = Some(sink);
    }

    async fn add(&self, records: &[Value]) -> Result<(), ConnectorError> {
        self.write(ConnectorCall::Add(uuids(records)), records, true)
    }

    async fn update(&self, records: &[Value]) -> Result<(), ConnectorError> {
        self.write(ConnectorCall::Update(uuids(records)), records, true)
    }

    async fn remove(&self, records: &[Value]) -> Result<(), ConnectorError> {
        self.write(ConnectorCall::Remove(uuids(records)), records, false)
    }

    fn select(&self, request: &SelectRequest) {
        let (sink, matching) = {
            let mut state = self.state.lock();
            state.calls.push(ConnectorCall::Select(request.sql.clone()));
            match state
                .subscriptions
                .iter_mut()
                .find(|s| s.query_id == request.query_id)
            {
                Some(existing) => *existing = request.clone(),
                None => state.subscriptions.push(request.clone()),
            }
            let matching: Vec<Value> = state
                .records
                .values()
                .filter(|r| request.matches(r))
                .cloned()
                .collect();
            (state.sink.clone(), matching)
        };
        debug!(connector = %self.key, sql = %request.sql, rows = matching.len(), "select");
        if let Some(sink) = sink {
            if !matching.is_empty() {
                sink.upsert(matching, None);
            }
        }
    }

    fn release(&self, query_id: u64) {
        let mut state = self.state.lock();
        state.calls.push(ConnectorCall::Release(query_id));
        let before = state.subscriptions.len();
        state.subscriptions.retain(|s| s.query_id != query_id);
        if state.subscriptions.len() != before {
            debug!(connector = %self.key, query_id, "subscription released");
        }
    }

    async fn select_one_by_identifier(&self, uuid: &str) -> Result<Option<Value>, ConnectorError> {
        let mut state = self.state.lock();
        state.calls.push(ConnectorCall::FetchOne(uuid.to_string()));
        Ok(state.records.get(uuid).cloned())
    }

    fn user_uuid(&self) -> Option<Arc<dyn Reactive<Option<Identity>>>> {
        Some(Arc::new(self.identity.clone()))
    }

    fn is_private_mode(&self) -> bool {
        self.private
    }

    async fn disconnect(&self) -> Result<(), ConnectorError> {
        let mut state = self.state.lock();
        state.calls.push(ConnectorCall::Disconnect);
        state.subscriptions.clear();
        state.sink = None;
        Ok(())
    }
}
