use tracing::{info, warn};

use todadot_core::merge::merge_local_first;
use todadot_core::{Entity, EntityKind};
use todadot_storage::{LocalCollection, RemoteCollection, UserIdentity};

use crate::auth::{AuthTracker, AuthTransition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub kind: EntityKind,
    pub local_count: usize,
    pub remote_count: usize,
    pub merged_count: usize,
    /// Commits issued to seed an empty remote collection.
    pub seed_commits: usize,
    /// The remote could not be read or seeded; local state was kept as is.
    pub degraded: bool,
}

#[derive(Debug, Clone)]
pub struct ReconcileOutcome<T> {
    pub items: Vec<T>,
    pub report: ReconcileReport,
}

/// Merges one entity kind's local and remote collections when a user signs
/// in. Runs at most once per session: a successful pass sets `has_synced`,
/// sign-out or a user switch clears it.
pub struct Reconciler<T> {
    local: LocalCollection<T>,
    remote: RemoteCollection<T>,
    tracker: AuthTracker,
    has_synced: bool,
    seed_pending: bool,
}

impl<T: Entity> Reconciler<T> {
    pub fn new(local: LocalCollection<T>, remote: RemoteCollection<T>) -> Self {
        Self {
            local,
            remote,
            tracker: AuthTracker::new(),
            has_synced: false,
            seed_pending: false,
        }
    }

    pub fn local(&self) -> &LocalCollection<T> {
        &self.local
    }

    pub fn remote(&self) -> &RemoteCollection<T> {
        &self.remote
    }

    pub fn has_synced(&self) -> bool {
        self.has_synced
    }

    /// Feed an auth observation. Returns the outcome when a pass ran.
    ///
    /// A pass that degraded leaves `has_synced` unset, so the next
    /// observation of the same signed-in user retries it.
    pub async fn on_auth_change(
        &mut self,
        user: Option<&UserIdentity>,
        current: &[T],
    ) -> Option<ReconcileOutcome<T>> {
        match self.tracker.observe(user) {
            AuthTransition::SignedOut => {
                self.has_synced = false;
                self.seed_pending = false;
                None
            }
            AuthTransition::SwitchedUser(user) => {
                self.has_synced = false;
                self.seed_pending = false;
                Some(self.reconcile(&user, current).await)
            }
            AuthTransition::SignedIn(user) => Some(self.reconcile(&user, current).await),
            AuthTransition::Unchanged => match user {
                Some(user) if !self.has_synced => Some(self.reconcile(user, current).await),
                _ => None,
            },
        }
    }

    /// One merge pass over `current` (the in-memory local collection) and
    /// `user`'s remote collection. The merged result is written back locally
    /// whatever the remote held; an empty remote is seeded from the merge. A
    /// seed that failed part way is re-sent in full on the next pass.
    pub async fn reconcile(&mut self, user: &UserIdentity, current: &[T]) -> ReconcileOutcome<T> {
        let kind = T::KIND;
        let mut report = ReconcileReport {
            kind,
            local_count: current.len(),
            remote_count: 0,
            merged_count: current.len(),
            seed_commits: 0,
            degraded: false,
        };

        let remote = match self.remote.load_all_for(user).await {
            Ok(remote) => remote,
            Err(err) => {
                warn!(kind = %kind, error = %err, "remote load failed, keeping local collection");
                report.degraded = true;
                return ReconcileOutcome { items: current.to_vec(), report };
            }
        };
        report.remote_count = remote.len();

        let merged = merge_local_first(current, &remote);
        report.merged_count = merged.len();
        if let Err(err) = self.local.save(&merged) {
            warn!(kind = %kind, error = %err, "failed to persist merged collection");
        }

        if self.seed_pending || (remote.is_empty() && !current.is_empty()) {
            match self.remote.save_batch_for(user, &merged).await {
                Ok(commits) => {
                    report.seed_commits = commits;
                    self.seed_pending = false;
                }
                Err(err) => {
                    warn!(kind = %kind, error = %err, "seeding remote collection failed");
                    report.degraded = true;
                    self.seed_pending = true;
                }
            }
        }

        self.has_synced = !report.degraded;
        info!(
            kind = %kind,
            local = report.local_count,
            remote = report.remote_count,
            merged = report.merged_count,
            seed_commits = report.seed_commits,
            degraded = report.degraded,
            "reconciliation pass finished"
        );
        ReconcileOutcome { items: merged, report }
    }
}
