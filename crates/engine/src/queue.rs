//! Best-effort dispatch of remote writes.
//!
//! Every remote write runs as its own tokio task tracked in a `JoinSet`. The
//! caller never awaits the write; failures are logged per task and never roll
//! back local state. Writes aimed at the same entity carry a sequence token
//! so that a write superseded before it starts is skipped.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use todadot_core::{EntityId, EntityKind};
use todadot_storage::StorageError;

use crate::error::EngineError;

pub type RemoteFuture = Pin<Box<dyn Future<Output = Result<(), StorageError>> + Send>>;

/// Produces the remote call. Invoked once per attempt.
pub type RemoteJob = Arc<dyn Fn() -> RemoteFuture + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOp {
    Save,
    Delete,
    Batch,
    Calendar,
}

impl fmt::Display for RemoteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RemoteOp::Save => "save",
            RemoteOp::Delete => "delete",
            RemoteOp::Batch => "batch",
            RemoteOp::Calendar => "calendar",
        })
    }
}

/// What a dispatched task writes. Tasks with an entity id take part in
/// sequencing per entity and owning account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub kind: EntityKind,
    pub entity: Option<EntityId>,
    pub op: RemoteOp,
    /// Account the write belongs to, if any.
    pub owner: Option<String>,
}

impl RemoteTarget {
    pub fn save(kind: EntityKind, id: EntityId) -> Self {
        Self { kind, entity: Some(id), op: RemoteOp::Save, owner: None }
    }

    pub fn delete(kind: EntityKind, id: EntityId) -> Self {
        Self { kind, entity: Some(id), op: RemoteOp::Delete, owner: None }
    }

    pub fn batch(kind: EntityKind) -> Self {
        Self { kind, entity: None, op: RemoteOp::Batch, owner: None }
    }

    pub fn calendar(id: EntityId) -> Self {
        Self { kind: EntityKind::Event, entity: Some(id), op: RemoteOp::Calendar, owner: None }
    }

    pub fn owned_by(mut self, uid: &str) -> Self {
        self.owner = Some(uid.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per task, at least one.
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self { max_attempts: 1, backoff: Duration::ZERO }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub dispatched: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub superseded: u64,
    pub retried: u64,
}

#[derive(Default)]
struct Counters {
    dispatched: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    superseded: AtomicU64,
    retried: AtomicU64,
    in_flight: AtomicUsize,
}

type SequenceKey = (EntityKind, EntityId, Option<String>);

/// Latest token handed out per entity.
#[derive(Default)]
struct Sequencer {
    latest: Mutex<HashMap<SequenceKey, u64>>,
}

impl Sequencer {
    fn next(&self, key: &SequenceKey) -> u64 {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        let token = latest.get(key).copied().unwrap_or(0) + 1;
        latest.insert(key.clone(), token);
        token
    }

    fn is_current(&self, key: &SequenceKey, token: u64) -> bool {
        let latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        latest.get(key).is_none_or(|current| *current == token)
    }

    fn release(&self, key: &SequenceKey, token: u64) {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        if latest.get(key) == Some(&token) {
            latest.remove(key);
        }
    }
}

pub struct RemoteQueue {
    handle: Handle,
    tasks: Mutex<JoinSet<()>>,
    sequencer: Arc<Sequencer>,
    counters: Arc<Counters>,
    policy: RetryPolicy,
}

impl RemoteQueue {
    /// Bind to the runtime the caller is running on.
    pub fn new(policy: RetryPolicy) -> Result<Self, EngineError> {
        let handle = Handle::try_current().map_err(|e| EngineError::Runtime(e.to_string()))?;
        Ok(Self::with_handle(handle, policy))
    }

    pub fn with_handle(handle: Handle, policy: RetryPolicy) -> Self {
        Self {
            handle,
            tasks: Mutex::new(JoinSet::new()),
            sequencer: Arc::new(Sequencer::default()),
            counters: Arc::new(Counters::default()),
            policy: RetryPolicy {
                max_attempts: policy.max_attempts.max(1),
                ..policy
            },
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Spawn `job` without waiting for it.
    pub fn dispatch(&self, target: RemoteTarget, job: RemoteJob) {
        let sequence = target.entity.clone().map(|id| {
            let key = (target.kind, id, target.owner.clone());
            let token = self.sequencer.next(&key);
            (key, token)
        });
        let sequencer = Arc::clone(&self.sequencer);
        let counters = Arc::clone(&self.counters);
        let policy = self.policy;

        counters.dispatched.fetch_add(1, Ordering::Relaxed);
        counters.in_flight.fetch_add(1, Ordering::SeqCst);
        debug!(kind = %target.kind, op = %target.op, entity = ?target.entity, owner = ?target.owner, "remote write dispatched");

        let task = async move {
            run_job(&target, job, policy, sequence.as_ref(), &sequencer, &counters).await;
            if let Some((key, token)) = &sequence {
                sequencer.release(key, *token);
            }
            counters.in_flight.fetch_sub(1, Ordering::SeqCst);
        };

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}
        tasks.spawn_on(task, &self.handle);
    }

    /// Await every dispatched write, including writes dispatched while
    /// draining.
    pub async fn drain(&self) {
        loop {
            let mut batch = {
                let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
                std::mem::take(&mut *tasks)
            };
            if batch.is_empty() {
                break;
            }
            while let Some(joined) = batch.join_next().await {
                if let Err(err) = joined {
                    warn!(error = %err, "remote write task aborted");
                }
            }
        }
    }

    /// Writes dispatched and not yet finished.
    pub fn pending(&self) -> usize {
        self.counters.in_flight.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> QueueStats {
        let c = &self.counters;
        QueueStats {
            dispatched: c.dispatched.load(Ordering::Relaxed),
            succeeded: c.succeeded.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            superseded: c.superseded.load(Ordering::Relaxed),
            retried: c.retried.load(Ordering::Relaxed),
        }
    }
}

async fn run_job(
    target: &RemoteTarget,
    job: RemoteJob,
    policy: RetryPolicy,
    sequence: Option<&(SequenceKey, u64)>,
    sequencer: &Sequencer,
    counters: &Counters,
) {
    for attempt in 1..=policy.max_attempts {
        if let Some((key, token)) = sequence
            && !sequencer.is_current(key, *token)
        {
            counters.superseded.fetch_add(1, Ordering::Relaxed);
            debug!(kind = %target.kind, op = %target.op, id = %key.1, token, "superseded, skipping");
            return;
        }

        match job().await {
            Ok(()) => {
                counters.succeeded.fetch_add(1, Ordering::Relaxed);
                debug!(kind = %target.kind, op = %target.op, entity = ?target.entity, attempt, "remote write done");
                return;
            }
            Err(err) if attempt < policy.max_attempts => {
                counters.retried.fetch_add(1, Ordering::Relaxed);
                debug!(kind = %target.kind, op = %target.op, attempt, error = %err, "remote write failed, retrying");
                if !policy.backoff.is_zero() {
                    tokio::time::sleep(policy.backoff).await;
                }
            }
            Err(err) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    kind = %target.kind,
                    op = %target.op,
                    entity = ?target.entity,
                    attempts = attempt,
                    error = %err,
                    "remote write failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use super::*;

    fn counting_job(calls: Arc<AtomicU32>, fail_first: u32) -> RemoteJob {
        Arc::new(move || -> RemoteFuture {
            let calls = Arc::clone(&calls);
            Box::pin(async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < fail_first {
                    Err(StorageError::Remote("unavailable".into()))
                } else {
                    Ok(())
                }
            })
        })
    }

    fn quick_retry() -> RetryPolicy {
        RetryPolicy { max_attempts: 2, backoff: Duration::ZERO }
    }

    #[tokio::test]
    async fn drain_waits_for_all_tasks() -> Result<(), Box<dyn std::error::Error>> {
        let queue = RemoteQueue::new(quick_retry())?;
        let calls = Arc::new(AtomicU32::new(0));
        for i in 0..5 {
            let target = RemoteTarget::save(EntityKind::Todo, EntityId::new(format!("t{i}")));
            queue.dispatch(target, counting_job(Arc::clone(&calls), 0));
        }
        queue.drain().await;

        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(queue.pending(), 0);
        let stats = queue.stats();
        assert_eq!(stats.dispatched, 5);
        assert_eq!(stats.succeeded, 5);
        Ok(())
    }

    #[tokio::test]
    async fn transient_failure_is_retried() -> Result<(), Box<dyn std::error::Error>> {
        let queue = RemoteQueue::new(quick_retry())?;
        let calls = Arc::new(AtomicU32::new(0));
        queue.dispatch(
            RemoteTarget::delete(EntityKind::Todo, EntityId::new("a")),
            counting_job(Arc::clone(&calls), 1),
        );
        queue.drain().await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let stats = queue.stats();
        assert_eq!(stats.retried, 1);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.failed, 0);
        Ok(())
    }

    #[tokio::test]
    async fn persistent_failure_is_counted_once() -> Result<(), Box<dyn std::error::Error>> {
        let queue = RemoteQueue::new(quick_retry())?;
        let calls = Arc::new(AtomicU32::new(0));
        queue.dispatch(RemoteTarget::batch(EntityKind::Event), counting_job(Arc::clone(&calls), 10));
        queue.drain().await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(queue.stats().failed, 1);
        Ok(())
    }

    #[tokio::test(flavor = "current_thread")]
    async fn superseded_write_is_skipped() -> Result<(), Box<dyn std::error::Error>> {
        // On a current-thread runtime nothing runs until drain yields, so the
        // first write is still queued when the second is dispatched.
        let queue = RemoteQueue::new(quick_retry())?;
        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));
        let id = EntityId::new("a");

        queue.dispatch(RemoteTarget::save(EntityKind::Todo, id.clone()), counting_job(Arc::clone(&first), 0));
        queue.dispatch(RemoteTarget::delete(EntityKind::Todo, id), counting_job(Arc::clone(&second), 0));
        queue.drain().await;

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(queue.stats().superseded, 1);
        Ok(())
    }

    #[tokio::test(flavor = "current_thread")]
    async fn different_entities_do_not_supersede() -> Result<(), Box<dyn std::error::Error>> {
        let queue = RemoteQueue::new(quick_retry())?;
        let calls = Arc::new(AtomicU32::new(0));
        queue.dispatch(RemoteTarget::save(EntityKind::Todo, EntityId::new("a")), counting_job(Arc::clone(&calls), 0));
        queue.dispatch(RemoteTarget::save(EntityKind::Event, EntityId::new("a")), counting_job(Arc::clone(&calls), 0));
        queue.drain().await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(queue.stats().superseded, 0);
        Ok(())
    }

    #[tokio::test(flavor = "current_thread")]
    async fn owners_are_sequenced_separately() -> Result<(), Box<dyn std::error::Error>> {
        let queue = RemoteQueue::new(quick_retry())?;
        let calls = Arc::new(AtomicU32::new(0));
        let id = EntityId::new("a");
        for owner in ["alice", "bob", "bob"] {
            let target = RemoteTarget::save(EntityKind::Todo, id.clone()).owned_by(owner);
            queue.dispatch(target, counting_job(Arc::clone(&calls), 0));
        }
        queue.drain().await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(queue.stats().superseded, 1);
        Ok(())
    }

    #[test]
    fn new_outside_runtime_fails() {
        assert!(matches!(RemoteQueue::new(RetryPolicy::default()), Err(EngineError::Runtime(_))));
    }
}
