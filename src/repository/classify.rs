//! Classify a model's properties as plain data or excluded.
//!
//! One throwaway instance from the factory is serialized. A property is
//! excluded when it is declared transient or when its value embeds another
//! stored record (an object carrying a `__uuid`); everything else is data.

use serde_json::Value;

use crate::error::RepositoryError;
use crate::types::{is_metadata_key, UUID_KEY};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassProperties {
    pub data: Vec<String>,
    pub excluded: Vec<String>,
}

fn embeds_record(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.contains_key(UUID_KEY) || map.values().any(embeds_record),
        Value::Array(items) => items.iter().any(embeds_record),
        _ => false,
    }
}

impl ClassProperties {
    pub fn classify(
        model: &str,
        prototype: &Value,
        transient: &[&str],
    ) -> Result<Self, RepositoryError> {
        let map = prototype
            .as_object()
            .ok_or_else(|| RepositoryError::TypeMismatch {
                model: model.to_string(),
                reason: format!("expected the model to serialize to an object, got {prototype}"),
            })?;

        let mut props = Self::default();
        for (name, value) in map {
            if is_metadata_key(name) {
                continue;
            }
            if transient.contains(&name.as_str()) || embeds_record(value) {
                props.excluded.push(name.clone());
            } else {
                props.data.push(name.clone());
            }
        }
        Ok(props)
    }

    pub fn is_data(&self, name: &str) -> bool {
        !self.excluded.iter().any(|e| e == name)
    }
}
