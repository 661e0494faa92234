use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use todadot_core::Entity;

use crate::error::StorageError;
use crate::traits::KeyValueStore;

/// Decode and validate one stored record. Used for both local blobs and
/// remote documents.
pub fn decode_record<T: Entity>(value: Value) -> Result<T, StorageError> {
    let record: T = serde_json::from_value(value)?;
    record.validate()?;
    Ok(record)
}

/// Decode a JSON array blob. A blob that is not an array yields nothing;
/// individual bad records are skipped.
pub fn decode_collection<T: Entity>(raw: &str) -> Vec<T> {
    let values: Vec<Value> = match serde_json::from_str(raw) {
        Ok(values) => values,
        Err(err) => {
            warn!(kind = %T::KIND, error = %err, "unreadable local collection, starting empty");
            return Vec::new();
        }
    };
    values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match decode_record::<T>(value) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(kind = %T::KIND, index, error = %err, "skipping malformed local record");
                None
            }
        })
        .collect()
}

/// Typed view of one entity kind's blob in the local key-value store.
pub struct LocalCollection<T> {
    store: Arc<dyn KeyValueStore>,
    _kind: PhantomData<fn() -> T>,
}

impl<T> Clone for LocalCollection<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _kind: PhantomData,
        }
    }
}

impl<T: Entity> LocalCollection<T> {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store, _kind: PhantomData }
    }

    pub fn key(&self) -> &'static str {
        T::KIND.local_key()
    }

    /// Never fails: read or parse errors are logged and yield an empty
    /// collection.
    pub fn load(&self) -> Vec<T> {
        match self.store.get(self.key()) {
            Ok(Some(raw)) => decode_collection(&raw),
            Ok(None) => Vec::new(),
            Err(err) => {
                warn!(kind = %T::KIND, error = %err, "local store read failed, starting empty");
                Vec::new()
            }
        }
    }

    pub fn save(&self, items: &[T]) -> Result<(), StorageError> {
        let raw = serde_json::to_string(items)?;
        self.store.set(self.key(), &raw)
    }
}
