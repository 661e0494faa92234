use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use todadot_core::merge::{CollectionDiff, diff};
use todadot_core::{CreationClock, Entity, EntityId};
use todadot_storage::{LocalCollection, RemoteCollection, UserIdentity};

use crate::error::EngineError;
use crate::queue::{RemoteFuture, RemoteJob, RemoteQueue, RemoteTarget};
use crate::reconciler::{ReconcileReport, Reconciler};

/// Owns the in-memory collection for one entity kind.
///
/// Every mutation computes the next collection from the current one, swaps it
/// in, persists it locally and then hands the remote writes to the
/// [`RemoteQueue`]. A mutation that fails validation leaves everything
/// untouched; a failing local save or remote write is only logged.
pub struct MutationRouter<T> {
    items: Vec<T>,
    reconciler: Reconciler<T>,
    queue: Arc<RemoteQueue>,
    clock: CreationClock,
}

impl<T: Entity> MutationRouter<T> {
    /// Load the local collection and start unauthenticated.
    pub fn open(
        local: LocalCollection<T>,
        remote: RemoteCollection<T>,
        queue: Arc<RemoteQueue>,
    ) -> Self {
        let items = local.load();
        let mut clock = CreationClock::new();
        for item in &items {
            clock.observe(item.created_at());
        }
        debug!(kind = %T::KIND, count = items.len(), "collection loaded");
        Self {
            items,
            reconciler: Reconciler::new(local, remote),
            queue,
            clock,
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn get(&self, id: &EntityId) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_synced(&self) -> bool {
        self.reconciler.has_synced()
    }

    pub fn queue(&self) -> &Arc<RemoteQueue> {
        &self.queue
    }

    // ========================================================================
    // Auth
    // ========================================================================

    /// Run the reconciler for an auth observation and adopt its result.
    pub async fn handle_auth_change(&mut self, user: Option<&UserIdentity>) -> Option<ReconcileReport> {
        let outcome = self.reconciler.on_auth_change(user, &self.items).await?;
        for item in &outcome.items {
            self.clock.observe(item.created_at());
        }
        self.items = outcome.items;
        Some(outcome.report)
    }

    // ========================================================================
    // Generic mutations
    // ========================================================================

    /// Fresh id and `createdAt` for a record about to be added.
    pub fn next_identity(&mut self) -> Result<(EntityId, i64), EngineError> {
        let created_at = self.clock.tick()?;
        Ok((EntityId::generate(created_at), created_at))
    }

    pub fn add(&mut self, entity: T) -> Result<(), EngineError> {
        if self.get(entity.id()).is_some() {
            return Err(EngineError::EntityExists(entity.id().to_string()));
        }
        self.clock.observe(entity.created_at());
        self.mutate(|items| {
            items.push(entity);
            Ok(())
        })
    }

    /// Patch one record in place. `id` and `createdAt` must not change.
    pub fn update(&mut self, id: &EntityId, patch: impl FnOnce(&mut T)) -> Result<T, EngineError> {
        self.mutate(|items| {
            let item = find_mut(items, id)?;
            let created_at = item.created_at();
            patch(item);
            if item.id() != id || item.created_at() != created_at {
                return Err(EngineError::InvalidOperation(format!(
                    "update of {} {id} changed its identity",
                    T::KIND
                )));
            }
            Ok(item.clone())
        })
    }

    pub fn delete(&mut self, id: &EntityId) -> Result<T, EngineError> {
        self.mutate(|items| {
            let index = position(items, id)?;
            Ok(items.remove(index))
        })
    }

    /// Remove every record matching `predicate`. Returns how many went.
    pub fn delete_where(&mut self, predicate: impl Fn(&T) -> bool) -> Result<usize, EngineError> {
        self.mutate(|items| {
            let before = items.len();
            items.retain(|item| !predicate(item));
            Ok(before - items.len())
        })
    }

    /// Swap in a whole new collection. Ids must be unique.
    pub fn replace_all(&mut self, items: Vec<T>) -> Result<(), EngineError> {
        if let Some(duplicate) = first_duplicate(&items) {
            return Err(EngineError::InvalidOperation(format!(
                "duplicate {} id {duplicate}",
                T::KIND
            )));
        }
        for item in &items {
            self.clock.observe(item.created_at());
        }
        self.mutate(|current| {
            *current = items;
            Ok(())
        })
    }

    /// Apply `change` to a copy of the collection. If it succeeds and every
    /// touched record validates, the copy becomes the collection and is
    /// committed.
    pub fn mutate<R>(
        &mut self,
        change: impl FnOnce(&mut Vec<T>) -> Result<R, EngineError>,
    ) -> Result<R, EngineError> {
        let mut next = self.items.clone();
        let result = change(&mut next)?;
        let changes = diff(&self.items, &next);
        for entity in &changes.upserts {
            entity.validate()?;
        }
        self.commit(next, changes);
        Ok(result)
    }

    fn commit(&mut self, next: Vec<T>, changes: CollectionDiff<T>) {
        self.items = next;
        if let Err(err) = self.reconciler.local().save(&self.items) {
            warn!(kind = %T::KIND, error = %err, "local save failed, keeping in-memory state");
        }
        if changes.is_empty() {
            return;
        }
        // The account is fixed here; a later sign-out or switch must not
        // redirect writes that are still queued.
        let Some(user) = self.reconciler.remote().current_user() else {
            return;
        };
        let user = Arc::new(user);
        for entity in changes.upserts {
            self.dispatch_save(&user, entity);
        }
        for id in changes.removed {
            self.dispatch_delete(&user, id);
        }
    }

    fn dispatch_save(&self, user: &Arc<UserIdentity>, entity: T) {
        let remote = self.reconciler.remote().clone();
        let target = RemoteTarget::save(T::KIND, entity.id().clone()).owned_by(&user.uid);
        let user = Arc::clone(user);
        let entity = Arc::new(entity);
        let job: RemoteJob = Arc::new(move || -> RemoteFuture {
            let remote = remote.clone();
            let user = Arc::clone(&user);
            let entity = Arc::clone(&entity);
            Box::pin(async move { remote.save_for(&user, &entity).await })
        });
        self.queue.dispatch(target, job);
    }

    fn dispatch_delete(&self, user: &Arc<UserIdentity>, id: EntityId) {
        let remote = self.reconciler.remote().clone();
        let target = RemoteTarget::delete(T::KIND, id.clone()).owned_by(&user.uid);
        let user = Arc::clone(user);
        let job: RemoteJob = Arc::new(move || -> RemoteFuture {
            let remote = remote.clone();
            let user = Arc::clone(&user);
            let id = id.clone();
            Box::pin(async move { remote.delete_for(&user, &id).await })
        });
        self.queue.dispatch(target, job);
    }
}

fn first_duplicate<T: Entity>(items: &[T]) -> Option<EntityId> {
    let mut seen = HashSet::new();
    items
        .iter()
        .find(|item| !seen.insert(item.id()))
        .map(|item| item.id().clone())
}

pub(crate) fn position<T: Entity>(items: &[T], id: &EntityId) -> Result<usize, EngineError> {
    items
        .iter()
        .position(|item| item.id() == id)
        .ok_or_else(|| EngineError::EntityNotFound(format!("{} {id}", T::KIND)))
}

pub(crate) fn find_mut<'a, T: Entity>(items: &'a mut [T], id: &EntityId) -> Result<&'a mut T, EngineError> {
    let index = position(items, id)?;
    Ok(&mut items[index])
}
