use std::sync::Arc;

use tokio::sync::watch;

use todadot_storage::{UserIdentity, UserSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    Unauthenticated,
    Authenticated,
}

/// Shared, observable sign-in state. Cloning hands out another handle to the
/// same state.
#[derive(Clone)]
pub struct AuthState {
    tx: Arc<watch::Sender<Option<UserIdentity>>>,
}

impl Default for AuthState {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn sign_in(&self, user: UserIdentity) {
        self.tx.send_replace(Some(user));
    }

    pub fn sign_out(&self) {
        self.tx.send_replace(None);
    }

    pub fn status(&self) -> AuthStatus {
        if self.tx.borrow().is_some() {
            AuthStatus::Authenticated
        } else {
            AuthStatus::Unauthenticated
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<UserIdentity>> {
        self.tx.subscribe()
    }
}

impl UserSource for AuthState {
    fn current_user(&self) -> Option<UserIdentity> {
        self.tx.borrow().clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthTransition {
    SignedIn(UserIdentity),
    SwitchedUser(UserIdentity),
    SignedOut,
    Unchanged,
}

/// Remembers the last user seen so a stream of observations can be turned
/// into transitions.
#[derive(Debug, Default)]
pub struct AuthTracker {
    previous: Option<UserIdentity>,
}

impl AuthTracker {
    pub fn new() -> Self {
        Self { previous: None }
    }

    pub fn observe(&mut self, current: Option<&UserIdentity>) -> AuthTransition {
        let transition = match (&self.previous, current) {
            (None, Some(user)) => AuthTransition::SignedIn(user.clone()),
            (Some(_), None) => AuthTransition::SignedOut,
            (Some(prev), Some(user)) if prev.uid != user.uid => {
                AuthTransition::SwitchedUser(user.clone())
            }
            _ => AuthTransition::Unchanged,
        };
        self.previous = current.cloned();
        transition
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_follows_sign_in_and_out() {
        let auth = AuthState::new();
        assert_eq!(auth.status(), AuthStatus::Unauthenticated);
        assert_eq!(auth.current_user(), None);

        auth.sign_in(UserIdentity::new("u1"));
        assert_eq!(auth.status(), AuthStatus::Authenticated);
        assert_eq!(auth.current_user().map(|u| u.uid), Some("u1".to_string()));

        auth.sign_out();
        assert_eq!(auth.status(), AuthStatus::Unauthenticated);
    }

    #[test]
    fn clones_share_state() {
        let auth = AuthState::new();
        let other = auth.clone();
        auth.sign_in(UserIdentity::new("u1"));
        assert_eq!(other.status(), AuthStatus::Authenticated);
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let auth = AuthState::new();
        let mut rx = auth.subscribe();
        auth.sign_in(UserIdentity::new("u1"));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().as_ref().map(|u| u.uid.as_str()), Some("u1"));
    }

    #[test]
    fn tracker_transitions() {
        let mut tracker = AuthTracker::new();
        let alice = UserIdentity::new("alice");
        let bob = UserIdentity::new("bob");

        assert_eq!(tracker.observe(None), AuthTransition::Unchanged);
        assert_eq!(tracker.observe(Some(&alice)), AuthTransition::SignedIn(alice.clone()));
        assert_eq!(tracker.observe(Some(&alice)), AuthTransition::Unchanged);
        assert_eq!(tracker.observe(Some(&bob)), AuthTransition::SwitchedUser(bob.clone()));
        assert_eq!(tracker.observe(None), AuthTransition::SignedOut);
        assert_eq!(tracker.observe(None), AuthTransition::Unchanged);
    }
}
