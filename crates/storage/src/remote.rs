use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{debug, warn};

use todadot_core::{Entity, EntityId};

use crate::error::StorageError;
use crate::local::decode_record;
use crate::traits::{MAX_BATCH_WRITES, RemoteDocumentStore, UserIdentity, UserSource};

/// Typed view of one entity kind's per-user remote collection.
///
/// Writes name the user they belong to, so a write queued before a sign-out
/// or a user switch still lands in the account it was made in.
pub struct RemoteCollection<T> {
    store: Arc<dyn RemoteDocumentStore>,
    users: Arc<dyn UserSource>,
    batch_limit: usize,
    _kind: PhantomData<fn() -> T>,
}

impl<T> Clone for RemoteCollection<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            users: Arc::clone(&self.users),
            batch_limit: self.batch_limit,
            _kind: PhantomData,
        }
    }
}

impl<T: Entity> RemoteCollection<T> {
    pub fn new(store: Arc<dyn RemoteDocumentStore>, users: Arc<dyn UserSource>) -> Self {
        Self {
            store,
            users,
            batch_limit: MAX_BATCH_WRITES,
            _kind: PhantomData,
        }
    }

    /// Chunk size for [`save_batch`](Self::save_batch), capped at the store
    /// limit.
    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit.clamp(1, MAX_BATCH_WRITES);
        self
    }

    pub fn collection(&self) -> &'static str {
        T::KIND.collection()
    }

    pub fn current_user(&self) -> Option<UserIdentity> {
        self.users.current_user()
    }

    pub async fn load_all_for(&self, user: &UserIdentity) -> Result<Vec<T>, StorageError> {
        let documents = self.store.list(&user.uid, self.collection()).await?;
        let records = documents
            .into_iter()
            .filter_map(|document| match decode_record::<T>(document) {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!(kind = %T::KIND, error = %err, "skipping malformed remote document");
                    None
                }
            })
            .collect();
        Ok(records)
    }

    /// Write `entity` into `user`'s collection, whoever is signed in now.
    pub async fn save_for(&self, user: &UserIdentity, entity: &T) -> Result<(), StorageError> {
        let document = serde_json::to_value(entity)?;
        self.store
            .put(&user.uid, self.collection(), entity.id().as_str(), document)
            .await
    }

    pub async fn delete_for(&self, user: &UserIdentity, id: &EntityId) -> Result<(), StorageError> {
        debug!(kind = %T::KIND, uid = %user.uid, id = %id, "remote delete");
        self.store.delete(&user.uid, self.collection(), id.as_str()).await
    }

    /// Upload in commits of at most the batch limit. Returns the number of
    /// commits issued. Stops at the first failed commit; earlier commits stay
    /// applied.
    pub async fn save_batch_for(&self, user: &UserIdentity, entities: &[T]) -> Result<usize, StorageError> {
        let mut commits = 0usize;
        for chunk in entities.chunks(self.batch_limit) {
            let writes = chunk
                .iter()
                .map(|entity| Ok((entity.id().to_string(), serde_json::to_value(entity)?)))
                .collect::<Result<Vec<_>, StorageError>>()?;
            self.store
                .commit_batch(&user.uid, self.collection(), writes)
                .await?;
            commits += 1;
        }
        Ok(commits)
    }
}
