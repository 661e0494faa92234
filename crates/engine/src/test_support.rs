use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use todadot_core::Entity;
use todadot_storage::{
    KeyValueStore, LocalCollection, RemoteCollection, RemoteDocumentStore, SqliteStore,
    StorageError, UserSource,
};

use crate::auth::AuthState;
use crate::error::EngineError;
use crate::queue::{RemoteQueue, RetryPolicy};
use crate::router::MutationRouter;

/// Remote that holds nothing and accepts everything.
struct NullRemote;

#[async_trait]
impl RemoteDocumentStore for NullRemote {
    async fn list(&self, _uid: &str, _collection: &str) -> Result<Vec<Value>, StorageError> {
        Ok(Vec::new())
    }

    async fn put(&self, _uid: &str, _collection: &str, _id: &str, _document: Value) -> Result<(), StorageError> {
        Ok(())
    }

    async fn delete(&self, _uid: &str, _collection: &str, _id: &str) -> Result<(), StorageError> {
        Ok(())
    }

    async fn commit_batch(
        &self,
        _uid: &str,
        _collection: &str,
        _writes: Vec<(String, Value)>,
    ) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Signed-out router over `store`. Needs a tokio runtime.
pub(crate) fn reopen<T: Entity>(store: &Arc<SqliteStore>) -> Result<MutationRouter<T>, EngineError> {
    let queue = Arc::new(RemoteQueue::new(RetryPolicy::no_retry())?);
    let users: Arc<dyn UserSource> = Arc::new(AuthState::new());
    let local = LocalCollection::new(Arc::clone(store) as Arc<dyn KeyValueStore>);
    let remote = RemoteCollection::new(Arc::new(NullRemote), users);
    Ok(MutationRouter::open(local, remote, queue))
}

pub(crate) fn router_with_store<T: Entity>() -> Result<(MutationRouter<T>, Arc<SqliteStore>), EngineError> {
    let store = Arc::new(SqliteStore::open_in_memory()?);
    Ok((reopen(&store)?, store))
}

pub(crate) fn router<T: Entity>() -> Result<MutationRouter<T>, EngineError> {
    Ok(router_with_store()?.0)
}
