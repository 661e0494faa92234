use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::watch;
use tracing::{debug, warn};

use todadot_core::{Entity, EntityId, Event, EventCategory, QuadrantColorSet, Todo};
use todadot_storage::{
    CalendarProvider, KeyValueStore, LocalCollection, MemoStore, RemoteCollection,
    RemoteDocumentStore, SqliteStore, UserIdentity, UserSource,
};

use crate::auth::AuthState;
use crate::config::SyncConfig;
use crate::error::EngineError;
use crate::events::CalendarSyncReport;
use crate::queue::RemoteQueue;
use crate::reconciler::ReconcileReport;
use crate::router::MutationRouter;

/// Shared plumbing built once per process: config, the local store, the
/// remote store, auth state and the remote dispatch queue.
pub struct SyncContext {
    config: SyncConfig,
    store: Arc<SqliteStore>,
    remote: Arc<dyn RemoteDocumentStore>,
    auth: AuthState,
    queue: Arc<RemoteQueue>,
}

impl SyncContext {
    /// Open the SQLite store at the configured path. Must be called from
    /// within a tokio runtime.
    pub fn open(config: SyncConfig, remote: Arc<dyn RemoteDocumentStore>) -> Result<Self, EngineError> {
        let store = Arc::new(SqliteStore::open(&config.database_path)?);
        Self::with_store(config, store, remote)
    }

    pub fn with_store(
        config: SyncConfig,
        store: Arc<SqliteStore>,
        remote: Arc<dyn RemoteDocumentStore>,
    ) -> Result<Self, EngineError> {
        let queue = Arc::new(RemoteQueue::new(config.retry_policy())?);
        Ok(Self {
            config,
            store,
            remote,
            auth: AuthState::new(),
            queue,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<SqliteStore> {
        &self.store
    }

    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    pub fn queue(&self) -> &Arc<RemoteQueue> {
        &self.queue
    }

    pub fn memos(&self) -> &dyn MemoStore {
        self.store.as_ref()
    }

    pub fn router<T: Entity>(&self) -> MutationRouter<T> {
        let local = LocalCollection::new(Arc::clone(&self.store) as Arc<dyn KeyValueStore>);
        let users: Arc<dyn UserSource> = Arc::new(self.auth.clone());
        let remote = RemoteCollection::new(Arc::clone(&self.remote), users)
            .with_batch_limit(self.config.remote_batch_limit);
        MutationRouter::open(local, remote, Arc::clone(&self.queue))
    }
}

/// All four entity kinds wired to one [`SyncContext`].
pub struct Workspace {
    context: SyncContext,
    todos: MutationRouter<Todo>,
    events: MutationRouter<Event>,
    categories: MutationRouter<EventCategory>,
    colors: MutationRouter<QuadrantColorSet>,
    auth_rx: watch::Receiver<Option<UserIdentity>>,
}

impl Workspace {
    pub fn open(context: SyncContext) -> Self {
        let auth_rx = context.auth().subscribe();
        Self {
            todos: context.router(),
            events: context.router(),
            categories: context.router(),
            colors: context.router(),
            auth_rx,
            context,
        }
    }

    pub fn context(&self) -> &SyncContext {
        &self.context
    }

    pub fn auth(&self) -> &AuthState {
        self.context.auth()
    }

    pub fn todos(&self) -> &MutationRouter<Todo> {
        &self.todos
    }

    pub fn todos_mut(&mut self) -> &mut MutationRouter<Todo> {
        &mut self.todos
    }

    pub fn events(&self) -> &MutationRouter<Event> {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut MutationRouter<Event> {
        &mut self.events
    }

    pub fn categories(&self) -> &MutationRouter<EventCategory> {
        &self.categories
    }

    pub fn categories_mut(&mut self) -> &mut MutationRouter<EventCategory> {
        &mut self.categories
    }

    pub fn colors(&self) -> &MutationRouter<QuadrantColorSet> {
        &self.colors
    }

    pub fn colors_mut(&mut self) -> &mut MutationRouter<QuadrantColorSet> {
        &mut self.colors
    }

    // ========================================================================
    // Auth
    // ========================================================================

    /// Feed the current auth state to every kind. Returns the reports of the
    /// passes that ran.
    pub async fn sync_auth_state(&mut self) -> Vec<ReconcileReport> {
        let user = self.auth_rx.borrow_and_update().clone();
        debug!(signed_in = user.is_some(), "auth state observed");
        let user = user.as_ref();
        let mut reports = Vec::new();
        reports.extend(self.todos.handle_auth_change(user).await);
        reports.extend(self.events.handle_auth_change(user).await);
        reports.extend(self.categories.handle_auth_change(user).await);
        reports.extend(self.colors.handle_auth_change(user).await);
        reports
    }

    /// Wait for the next sign-in or sign-out and react to it.
    pub async fn next_auth_change(&mut self) -> Result<Vec<ReconcileReport>, EngineError> {
        self.auth_rx
            .changed()
            .await
            .map_err(|e| EngineError::InvalidOperation(format!("auth state closed: {e}")))?;
        Ok(self.sync_auth_state().await)
    }

    // ========================================================================
    // Memos
    // ========================================================================

    pub fn read_memo(&self, id: &EntityId) -> Result<Option<String>, EngineError> {
        Ok(self.context.memos().get_memo(id)?)
    }

    /// Blank content removes the memo.
    pub fn write_memo(&self, id: &EntityId, content: &str) -> Result<(), EngineError> {
        let memos = self.context.memos();
        if content.trim().is_empty() {
            memos.delete_memo(id)?;
        } else {
            memos.set_memo(id, content)?;
        }
        Ok(())
    }

    /// Delete a todo together with its memo. A failing memo delete is only
    /// logged; the todo is gone either way.
    pub fn delete_todo(&mut self, id: &EntityId) -> Result<Todo, EngineError> {
        let removed = self.todos.delete(id)?;
        if let Err(err) = self.context.memos().delete_memo(id) {
            warn!(id = %id, error = %err, "failed to delete memo of removed todo");
        }
        Ok(removed)
    }

    // ========================================================================
    // Calendar
    // ========================================================================

    /// Sync events with the calendar over the configured window around
    /// `today`.
    pub async fn sync_calendar(
        &mut self,
        calendar: &dyn CalendarProvider,
        today: NaiveDate,
    ) -> Result<CalendarSyncReport, EngineError> {
        let range = self.context.config().calendar_range(today)?;
        self.events.sync_external_calendar(calendar, &range).await
    }

    /// Wait for every dispatched remote write to finish.
    pub async fn shutdown(&self) {
        self.context.queue().drain().await;
    }
}
