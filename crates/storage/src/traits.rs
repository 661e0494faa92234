use async_trait::async_trait;
use serde_json::Value;

use todadot_core::{EntityId, ExternalEvent, TimeRange};

use crate::error::StorageError;

/// Most writes a single remote commit accepts.
pub const MAX_BATCH_WRITES: usize = 500;

/// Durable string key-value store holding one JSON blob per entity kind.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Device-local long-form memo text keyed by entity id. Never synced.
pub trait MemoStore: Send + Sync {
    fn get_memo(&self, entity_id: &EntityId) -> Result<Option<String>, StorageError>;

    fn set_memo(&self, entity_id: &EntityId, content: &str) -> Result<(), StorageError>;

    fn delete_memo(&self, entity_id: &EntityId) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub uid: String,
    pub email: Option<String>,
}

impl UserIdentity {
    pub fn new(uid: impl Into<String>) -> Self {
        Self { uid: uid.into(), email: None }
    }
}

/// Resolves the signed-in user, if any.
pub trait UserSource: Send + Sync {
    fn current_user(&self) -> Option<UserIdentity>;
}

/// Per-user document collections, documents addressed by id:
/// `users/{uid}/{collection}/{id}`.
#[async_trait]
pub trait RemoteDocumentStore: Send + Sync {
    async fn list(&self, uid: &str, collection: &str) -> Result<Vec<Value>, StorageError>;

    async fn put(
        &self,
        uid: &str,
        collection: &str,
        id: &str,
        document: Value,
    ) -> Result<(), StorageError>;

    async fn delete(&self, uid: &str, collection: &str, id: &str) -> Result<(), StorageError>;

    /// Atomic multi-document write. Stores reject more than
    /// [`MAX_BATCH_WRITES`] writes per commit.
    async fn commit_batch(
        &self,
        uid: &str,
        collection: &str,
        writes: Vec<(String, Value)>,
    ) -> Result<(), StorageError>;
}

/// Third-party calendar the Event collection can be mirrored into.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    async fn list_events(&self, range: &TimeRange) -> Result<Vec<ExternalEvent>, StorageError>;

    /// Returns the id the calendar assigned.
    async fn create_event(&self, event: &ExternalEvent) -> Result<String, StorageError>;

    /// Returns the event's id afterwards, which the calendar may have changed.
    async fn update_event(&self, event: &ExternalEvent) -> Result<String, StorageError>;

    async fn delete_event(&self, external_id: &str) -> Result<(), StorageError>;
}
