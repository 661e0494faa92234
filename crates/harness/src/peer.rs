use std::sync::Arc;

use todadot_engine::{
    EngineError, QueueStats, ReconcileReport, SyncConfig, SyncContext, Workspace,
};
use todadot_storage::{RemoteDocumentStore, SqliteStore, UserIdentity};

use crate::remote::InMemoryRemoteStore;

/// Config used by peers: no retry backoff so drains stay fast.
pub fn test_config() -> SyncConfig {
    SyncConfig {
        remote_retry_backoff_ms: 0,
        ..SyncConfig::default()
    }
}

/// One device: an in-memory SQLite store and a workspace wired to a shared
/// remote. Must be created inside a tokio runtime.
pub struct TestPeer {
    pub workspace: Workspace,
    pub store: Arc<SqliteStore>,
    remote: Arc<InMemoryRemoteStore>,
    config: SyncConfig,
}

impl TestPeer {
    pub fn new(remote: Arc<InMemoryRemoteStore>) -> Result<Self, EngineError> {
        Self::with_config(remote, test_config())
    }

    pub fn with_config(remote: Arc<InMemoryRemoteStore>, config: SyncConfig) -> Result<Self, EngineError> {
        let store = Arc::new(SqliteStore::open_in_memory()?);
        Self::on_store(remote, store, config)
    }

    fn on_store(
        remote: Arc<InMemoryRemoteStore>,
        store: Arc<SqliteStore>,
        config: SyncConfig,
    ) -> Result<Self, EngineError> {
        let shared: Arc<dyn RemoteDocumentStore> = remote.clone();
        let context = SyncContext::with_store(config.clone(), Arc::clone(&store), shared)?;
        Ok(Self {
            workspace: Workspace::open(context),
            store,
            remote,
            config,
        })
    }

    /// Simulate an app restart on the same device: a fresh workspace over the
    /// same local store, signed out.
    pub fn restart(&self) -> Result<Self, EngineError> {
        Self::on_store(Arc::clone(&self.remote), Arc::clone(&self.store), self.config.clone())
    }

    pub fn remote(&self) -> &Arc<InMemoryRemoteStore> {
        &self.remote
    }

    pub async fn sign_in(&mut self, uid: &str) -> Vec<ReconcileReport> {
        self.workspace.auth().sign_in(UserIdentity::new(uid));
        self.workspace.sync_auth_state().await
    }

    pub async fn sign_out(&mut self) -> Vec<ReconcileReport> {
        self.workspace.auth().sign_out();
        self.workspace.sync_auth_state().await
    }

    pub async fn drain(&self) {
        self.workspace.shutdown().await;
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.workspace.context().queue().stats()
    }
}
