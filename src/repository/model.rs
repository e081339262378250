//! What a repository stores, and how it builds fresh instances.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::geo::GeoPoint;

/// A user model held by a [`Repository`](super::Repository).
///
/// The serialized form must be a JSON object; its fields become the stored
/// record's user fields.
pub trait Model: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Location used by the geo-indexing extension.
    fn location(&self) -> Option<GeoPoint> {
        None
    }

    /// Fields that hold runtime state and are never persisted.
    fn transient_fields() -> &'static [&'static str] {
        &[]
    }
}

/// Builds the default instance new records start from.
pub trait Factory<T>: Send + Sync {
    fn build(&self) -> T;
}

impl<T, F> Factory<T> for F
where
    F: Fn() -> T + Send + Sync,
{
    fn build(&self) -> T {
        self()
    }
}
