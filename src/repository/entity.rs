//! Entity: a live model instance plus its bookkeeping.

use std::collections::BTreeMap;
use std::ops::Deref;

use serde_json::{Map, Value};

use crate::geo::{self, GeoPoint};
use crate::types::{
    is_metadata_key, GEOHASH_KEY, INDEX_KEY, LATITUDE_KEY, LONGITUDE_KEY, OWNER_KEY,
    REMOVED_KEY, UUID_KEY, VIEWER_KEY,
};

use super::classify::ClassProperties;
use super::model::Model;

/// Access maps and ordering metadata of one stored row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordMeta {
    pub owner: BTreeMap<String, bool>,
    pub viewer: BTreeMap<String, bool>,
    pub index: i64,
    pub removed: bool,
}

impl RecordMeta {
    /// Read whatever metadata a stored record carries. Missing maps and
    /// index come back as `None` so the caller can apply defaults.
    pub(crate) fn read(record: &Map<String, Value>) -> PartialMeta {
        fn access_map(value: Option<&Value>) -> Option<BTreeMap<String, bool>> {
            let map = value?.as_object()?;
            Some(
                map.iter()
                    .filter_map(|(k, v)| v.as_bool().map(|b| (k.clone(), b)))
                    .collect(),
            )
        }
        PartialMeta {
            uuid: record.get(UUID_KEY).and_then(Value::as_str).map(str::to_string),
            owner: access_map(record.get(OWNER_KEY)),
            viewer: access_map(record.get(VIEWER_KEY)),
            index: record.get(INDEX_KEY).and_then(|v| {
                v.as_i64().or_else(|| v.as_f64().map(|f| f as i64))
            }),
            removed: record
                .get(REMOVED_KEY)
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct PartialMeta {
    pub uuid: Option<String>,
    pub owner: Option<BTreeMap<String, bool>>,
    pub viewer: Option<BTreeMap<String, bool>>,
    pub index: Option<i64>,
    pub removed: bool,
}

/// Split a stored record into user fields and metadata.
pub(crate) fn split_record(record: Value) -> (Map<String, Value>, PartialMeta) {
    let map = match record {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let meta = RecordMeta::read(&map);
    let fields = map
        .into_iter()
        .filter(|(k, _)| !is_metadata_key(k))
        .collect();
    (fields, meta)
}

/// A model instance held by a repository.
///
/// Derefs to the model, so fields read directly: `entity.age`.
#[derive(Debug, Clone)]
pub struct Entity<T> {
    uuid: String,
    model: T,
    meta: RecordMeta,
    record: Value,
}

impl<T: Model> Entity<T> {
    pub(crate) fn new(uuid: String, model: T, meta: RecordMeta, props: &ClassProperties) -> Self {
        let record = build_record(&uuid, &model, &meta, props);
        Self {
            uuid,
            model,
            meta,
            record,
        }
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn model(&self) -> &T {
        &self.model
    }

    /// Mutable access for preparing an `update`.
    pub fn model_mut(&mut self) -> &mut T {
        &mut self.model
    }

    pub fn into_model(self) -> T {
        self.model
    }

    pub fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    pub fn index(&self) -> i64 {
        self.meta.index
    }

    pub fn is_owned_by(&self, subject: &str) -> bool {
        self.meta.owner.get(subject).copied().unwrap_or(false)
    }

    pub fn is_viewable_by(&self, subject: &str) -> bool {
        self.meta.viewer.get(subject).copied().unwrap_or(false)
    }

    pub fn location(&self) -> Option<GeoPoint> {
        self.model.location()
    }

    /// Stored-record form as of the last write: plain-data fields plus
    /// metadata keys.
    pub fn record(&self) -> &Value {
        &self.record
    }

    pub fn to_record(&self) -> Value {
        self.record.clone()
    }
}

impl<T> Deref for Entity<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.model
    }
}

fn access_value(map: &BTreeMap<String, bool>) -> Value {
    Value::Object(map.iter().map(|(k, v)| (k.clone(), Value::Bool(*v))).collect())
}

fn build_record<T: Model>(uuid: &str, model: &T, meta: &RecordMeta, props: &ClassProperties) -> Value {
    let mut record = match serde_json::to_value(model) {
        Ok(Value::Object(map)) => map
            .into_iter()
            .filter(|(k, _)| props.is_data(k) && !is_metadata_key(k))
            .collect(),
        _ => Map::new(),
    };
    record.insert(UUID_KEY.to_string(), Value::String(uuid.to_string()));
    record.insert(OWNER_KEY.to_string(), access_value(&meta.owner));
    record.insert(VIEWER_KEY.to_string(), access_value(&meta.viewer));
    record.insert(REMOVED_KEY.to_string(), Value::Bool(meta.removed));
    record.insert(INDEX_KEY.to_string(), Value::from(meta.index));
    if let Some(point) = model.location() {
        record.insert(
            GEOHASH_KEY.to_string(),
            Value::String(geo::encode(point, geo::STORED_PRECISION)),
        );
        record.insert(LATITUDE_KEY.to_string(), Value::from(point.latitude));
        record.insert(LONGITUDE_KEY.to_string(), Value::from(point.longitude));
    }
    Value::Object(record)
}
