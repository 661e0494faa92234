pub mod auth;
pub mod categories;
pub mod colors;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod queue;
pub mod reconciler;
pub mod router;
pub mod telemetry;
pub mod todos;

#[cfg(test)]
mod test_support;

pub use auth::{AuthState, AuthStatus, AuthTracker, AuthTransition};
pub use config::{CalendarWindow, SyncConfig};
pub use context::{SyncContext, Workspace};
pub use error::EngineError;
pub use events::{CalendarSyncReport, EventDraft};
pub use queue::{QueueStats, RemoteJob, RemoteOp, RemoteQueue, RemoteTarget, RetryPolicy};
pub use reconciler::{ReconcileOutcome, ReconcileReport, Reconciler};
pub use router::MutationRouter;
pub use telemetry::init_tracing;
pub use todos::TodoDraft;
