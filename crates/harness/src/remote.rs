use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use todadot_core::Entity;
use todadot_storage::{MAX_BATCH_WRITES, RemoteDocumentStore, StorageError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    List { collection: String },
    Put { collection: String, id: String },
    Delete { collection: String, id: String },
    Commit { collection: String, writes: usize },
}

type CollectionKey = (String, String);

#[derive(Default)]
struct RemoteState {
    collections: BTreeMap<CollectionKey, BTreeMap<String, Value>>,
    calls: Vec<RemoteCall>,
    pass_before_fail: u32,
    fail_next: u32,
    offline: bool,
}

impl RemoteState {
    fn check_available(&mut self) -> Result<(), StorageError> {
        if self.offline {
            return Err(StorageError::Remote("remote unreachable".into()));
        }
        if self.fail_next > 0 {
            if self.pass_before_fail > 0 {
                self.pass_before_fail -= 1;
                return Ok(());
            }
            self.fail_next -= 1;
            return Err(StorageError::Remote("injected failure".into()));
        }
        Ok(())
    }

    fn collection_mut(&mut self, uid: &str, collection: &str) -> &mut BTreeMap<String, Value> {
        self.collections
            .entry((uid.to_string(), collection.to_string()))
            .or_default()
    }
}

/// Per-user document store kept in memory, with failure injection and a log
/// of every call that was applied.
#[derive(Default)]
pub struct InMemoryRemoteStore {
    state: Mutex<RemoteState>,
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RemoteState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail the next `count` calls of any kind.
    pub fn fail_next(&self, count: u32) {
        self.fail_after(0, count);
    }

    /// Let `ok_calls` calls through, then fail the `count` after them.
    pub fn fail_after(&self, ok_calls: u32, count: u32) {
        let mut state = self.state();
        state.pass_before_fail = ok_calls;
        state.fail_next = count;
    }

    /// While offline every call fails.
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn commit_count(&self, collection: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| matches!(call, RemoteCall::Commit { collection: c, .. } if c == collection))
            .count()
    }

    pub fn documents(&self, uid: &str, collection: &str) -> Vec<Value> {
        self.state()
            .collections
            .get(&(uid.to_string(), collection.to_string()))
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn document(&self, uid: &str, collection: &str, id: &str) -> Option<Value> {
        self.state()
            .collections
            .get(&(uid.to_string(), collection.to_string()))
            .and_then(|docs| docs.get(id).cloned())
    }

    /// Decode a user's collection, sorted by `(createdAt, id)`.
    pub fn entities<T: Entity>(&self, uid: &str) -> Result<Vec<T>, StorageError> {
        let mut entities = self
            .documents(uid, T::KIND.collection())
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()?;
        todadot_core::merge::sort_canonical(&mut entities);
        Ok(entities)
    }

    /// Write entities directly, bypassing failure injection and the call log.
    pub fn seed<T: Entity>(&self, uid: &str, entities: &[T]) -> Result<(), StorageError> {
        let mut state = self.state();
        let docs = state.collection_mut(uid, T::KIND.collection());
        for entity in entities {
            docs.insert(entity.id().to_string(), serde_json::to_value(entity)?);
        }
        Ok(())
    }

    pub fn seed_raw(&self, uid: &str, collection: &str, id: &str, document: Value) {
        self.state().collection_mut(uid, collection).insert(id.to_string(), document);
    }
}

#[async_trait]
impl RemoteDocumentStore for InMemoryRemoteStore {
    async fn list(&self, uid: &str, collection: &str) -> Result<Vec<Value>, StorageError> {
        let mut state = self.state();
        state.check_available()?;
        state.calls.push(RemoteCall::List { collection: collection.to_string() });
        Ok(state
            .collections
            .get(&(uid.to_string(), collection.to_string()))
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn put(
        &self,
        uid: &str,
        collection: &str,
        id: &str,
        document: Value,
    ) -> Result<(), StorageError> {
        let mut state = self.state();
        state.check_available()?;
        state.collection_mut(uid, collection).insert(id.to_string(), document);
        state.calls.push(RemoteCall::Put {
            collection: collection.to_string(),
            id: id.to_string(),
        });
        Ok(())
    }

    async fn delete(&self, uid: &str, collection: &str, id: &str) -> Result<(), StorageError> {
        let mut state = self.state();
        state.check_available()?;
        state.collection_mut(uid, collection).remove(id);
        state.calls.push(RemoteCall::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        });
        Ok(())
    }

    async fn commit_batch(
        &self,
        uid: &str,
        collection: &str,
        writes: Vec<(String, Value)>,
    ) -> Result<(), StorageError> {
        let mut state = self.state();
        if writes.len() > MAX_BATCH_WRITES {
            return Err(StorageError::BatchTooLarge {
                size: writes.len(),
                max: MAX_BATCH_WRITES,
            });
        }
        state.check_available()?;
        let count = writes.len();
        let docs = state.collection_mut(uid, collection);
        for (id, document) in writes {
            docs.insert(id, document);
        }
        state.calls.push(RemoteCall::Commit {
            collection: collection.to_string(),
            writes: count,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn oversized_commit_is_rejected() {
        let store = InMemoryRemoteStore::new();
        let writes = (0..=MAX_BATCH_WRITES)
            .map(|i| (i.to_string(), Value::Null))
            .collect();
        let result = store.commit_batch("u", "todos", writes).await;
        assert!(matches!(result, Err(StorageError::BatchTooLarge { size: 501, max: 500 })));
        assert!(store.documents("u", "todos").is_empty());
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() -> Result<(), Box<dyn std::error::Error>> {
        let store = InMemoryRemoteStore::new();
        store.fail_next(1);
        assert!(store.put("u", "todos", "a", Value::Null).await.is_err());
        store.put("u", "todos", "a", Value::Null).await?;
        assert_eq!(store.calls().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn fail_after_lets_calls_through_first() -> Result<(), Box<dyn std::error::Error>> {
        let store = InMemoryRemoteStore::new();
        store.fail_after(2, 1);
        store.put("u", "todos", "a", Value::Null).await?;
        store.put("u", "todos", "b", Value::Null).await?;
        assert!(store.put("u", "todos", "c", Value::Null).await.is_err());
        store.put("u", "todos", "c", Value::Null).await?;
        assert_eq!(store.documents("u", "todos").len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn users_are_isolated() -> Result<(), Box<dyn std::error::Error>> {
        let store = InMemoryRemoteStore::new();
        store.put("alice", "todos", "a", Value::Bool(true)).await?;
        assert!(store.list("bob", "todos").await?.is_empty());
        assert_eq!(store.list("alice", "todos").await?.len(), 1);
        Ok(())
    }
}
