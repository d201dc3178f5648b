//! Token holder — the single writer of session state.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{info, warn};

use super::provider::IdentityProvider;
use super::session::{AuthState, Session};
use crate::error::AuthError;

/// Owns the authenticated session and publishes every transition.
///
/// Dependents read the session (or subscribe to changes); only the
/// identity-provider integration methods below write it.
pub struct TokenHolder {
    tx: watch::Sender<AuthState>,
}

impl TokenHolder {
    pub fn new() -> Arc<Self> {
        let (tx, _rx) = watch::channel(AuthState::default());
        Arc::new(Self { tx })
    }

    /// Subscribe to auth state transitions.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.tx.subscribe()
    }

    /// Snapshot of the observable auth state.
    pub fn state(&self) -> AuthState {
        self.tx.borrow().clone()
    }

    /// The live session, or `None` when unauthenticated or expired.
    pub fn current_session(&self) -> Option<Session> {
        self.tx.borrow().user().cloned()
    }

    /// True when there is no session or its token has expired.
    pub fn is_expired(&self) -> bool {
        self.tx
            .borrow()
            .session
            .as_ref()
            .is_none_or(Session::is_expired)
    }

    pub fn epoch(&self) -> u64 {
        self.tx.borrow().epoch
    }

    // ── Transitions ─────────────────────────────────────────────────

    /// Mark a sign-in as in progress.
    pub fn begin_sign_in(&self) {
        self.tx.send_modify(|state| {
            state.is_loading = true;
            state.error = None;
        });
    }

    /// Login success: install a new session under a new epoch.
    pub fn establish(&self, session: Session) {
        let subject = session.subject_id.clone();
        self.tx.send_modify(|state| {
            state.epoch += 1;
            state.session = Some(session);
            state.is_loading = false;
            state.error = None;
        });
        info!(subject = %subject, epoch = self.epoch(), "Session established");
    }

    /// Token refresh: swap the token, keeping the epoch when the subject is
    /// unchanged. A different subject is a new login.
    pub fn replace_token(&self, session: Session) {
        let same_subject = self
            .tx
            .borrow()
            .session
            .as_ref()
            .is_some_and(|s| s.subject_id == session.subject_id);

        if !same_subject {
            self.establish(session);
            return;
        }

        self.tx.send_modify(|state| {
            state.session = Some(session);
            state.error = None;
        });
        info!(epoch = self.epoch(), "Session token refreshed");
    }

    /// Logout or expiry: drop the session. The epoch only moves when there
    /// was a session to drop.
    pub fn clear(&self, reason: Option<String>) {
        let had_session = self.tx.send_if_modified(|state| {
            let had = state.session.take().is_some();
            if had {
                state.epoch += 1;
            }
            let changed = had || state.is_loading || state.error != reason;
            state.is_loading = false;
            state.error = reason.clone();
            changed
        });
        if had_session {
            info!(epoch = self.epoch(), reason = ?reason, "Session cleared");
        }
    }

    // ── Provider-driven flows ───────────────────────────────────────

    /// Run the provider's sign-in and install the resulting session.
    pub async fn sign_in(&self, provider: &dyn IdentityProvider) -> Result<Session, AuthError> {
        self.begin_sign_in();
        match provider.sign_in().await {
            Ok(session) => {
                self.establish(session.clone());
                Ok(session)
            }
            Err(e) => {
                warn!(provider = provider.name(), error = %e, "Sign-in failed");
                self.clear(Some(e.to_string()));
                Err(e)
            }
        }
    }

    /// Sign out with the provider. The local session is dropped even if the
    /// provider call fails.
    pub async fn sign_out(&self, provider: &dyn IdentityProvider) -> Result<(), AuthError> {
        let session = self.tx.borrow().session.clone();
        let result = provider.sign_out(session.as_ref()).await;
        if let Err(ref e) = result {
            warn!(provider = provider.name(), error = %e, "Provider sign-out failed");
        }
        self.clear(None);
        result
    }

    /// Refresh the token. No retries: any failure forces a logout.
    pub async fn refresh_token(
        &self,
        provider: &dyn IdentityProvider,
    ) -> Result<Session, AuthError> {
        let Some(current) = self.tx.borrow().session.clone() else {
            return Err(AuthError::NoSession);
        };
        match provider.refresh(&current).await {
            Ok(session) => {
                self.replace_token(session.clone());
                Ok(session)
            }
            Err(e) => {
                warn!(provider = provider.name(), error = %e, "Token refresh failed, logging out");
                self.clear(Some(e.to_string()));
                Err(e)
            }
        }
    }

    /// Resolves once the epoch differs from `epoch` (logout or a new login).
    pub async fn epoch_changed(&self, epoch: u64) {
        let mut rx = self.tx.subscribe();
        loop {
            if rx.borrow_and_update().epoch != epoch {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Spawn a background task that refreshes the token as soon as it
/// expires, and logs out when the refresh fails.
///
/// The task sleeps until the current session's `expires_at`, waking early
/// on any auth transition. `max_wait` caps a single sleep.
pub fn spawn_expiry_watch(
    holder: Arc<TokenHolder>,
    provider: Arc<dyn IdentityProvider>,
    max_wait: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut rx = holder.subscribe();
        loop {
            let expires_at = rx
                .borrow_and_update()
                .session
                .as_ref()
                .map(|s| s.expires_at);

            let Some(expires_at) = expires_at else {
                if rx.changed().await.is_err() {
                    return;
                }
                continue;
            };

            let remaining = (expires_at - Utc::now()).to_std().unwrap_or_default();
            if remaining.is_zero() {
                info!("Session token expired, attempting refresh");
                if let Ok(session) = holder.refresh_token(provider.as_ref()).await {
                    if session.is_expired() {
                        warn!(provider = provider.name(), "Refreshed token already expired, logging out");
                        holder.clear(Some("session expired".into()));
                    }
                }
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(remaining.min(max_wait)) => {}
                changed = rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};

    fn session(subject: &str, token: &str) -> Session {
        Session::new(subject, "dr@example.com", token, Utc::now() + ChronoDuration::hours(1))
    }

    struct FailingRefresh;

    #[async_trait]
    impl IdentityProvider for FailingRefresh {
        fn name(&self) -> &str {
            "failing"
        }
        async fn sign_in(&self) -> Result<Session, AuthError> {
            Err(AuthError::SignInFailed("denied".into()))
        }
        async fn sign_out(&self, _session: Option<&Session>) -> Result<(), AuthError> {
            Ok(())
        }
        async fn refresh(&self, _session: &Session) -> Result<Session, AuthError> {
            Err(AuthError::RefreshFailed("revoked".into()))
        }
    }

    #[test]
    fn starts_unauthenticated() {
        let holder = TokenHolder::new();
        assert!(holder.current_session().is_none());
        assert!(holder.is_expired());
        assert_eq!(holder.epoch(), 0);
    }

    #[test]
    fn establish_and_clear_move_epoch() {
        let holder = TokenHolder::new();
        holder.establish(session("sub-1", "t1"));
        assert_eq!(holder.epoch(), 1);
        assert_eq!(holder.current_session().unwrap().bearer_token(), "t1");

        holder.clear(None);
        assert_eq!(holder.epoch(), 2);
        assert!(holder.current_session().is_none());

        // Clearing again is not a transition.
        holder.clear(None);
        assert_eq!(holder.epoch(), 2);
    }

    #[test]
    fn token_refresh_keeps_epoch_for_same_subject() {
        let holder = TokenHolder::new();
        holder.establish(session("sub-1", "t1"));
        holder.replace_token(session("sub-1", "t2"));
        assert_eq!(holder.epoch(), 1);
        assert_eq!(holder.current_session().unwrap().bearer_token(), "t2");

        holder.replace_token(session("sub-2", "t3"));
        assert_eq!(holder.epoch(), 2);
    }

    #[test]
    fn expired_session_is_not_current() {
        let holder = TokenHolder::new();
        holder.establish(Session::new(
            "sub-1",
            "e",
            "t",
            Utc::now() - ChronoDuration::seconds(5),
        ));
        assert!(holder.is_expired());
        assert!(holder.current_session().is_none());
    }

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let holder = TokenHolder::new();
        let mut rx = holder.subscribe();
        holder.establish(session("sub-1", "t1"));
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_authenticated());
    }

    #[tokio::test]
    async fn refresh_failure_forces_logout() {
        let holder = TokenHolder::new();
        holder.establish(session("sub-1", "t1"));

        let err = holder.refresh_token(&FailingRefresh).await.unwrap_err();
        assert_eq!(err, AuthError::RefreshFailed("revoked".into()));
        let state = holder.state();
        assert!(state.session.is_none());
        assert!(state.error.unwrap().contains("revoked"));
        assert_eq!(state.epoch, 2);
    }

    #[tokio::test]
    async fn failed_sign_in_records_error() {
        let holder = TokenHolder::new();
        assert!(holder.sign_in(&FailingRefresh).await.is_err());
        let state = holder.state();
        assert!(!state.is_loading);
        assert!(state.error.is_some());
        assert_eq!(state.epoch, 0);
    }

    #[tokio::test]
    async fn epoch_changed_resolves_on_logout() {
        let holder = TokenHolder::new();
        holder.establish(session("sub-1", "t1"));
        let epoch = holder.epoch();

        let waiter = {
            let holder = Arc::clone(&holder);
            tokio::spawn(async move { holder.epoch_changed(epoch).await })
        };
        tokio::task::yield_now().await;
        holder.clear(None);

        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("epoch change not observed")
            .unwrap();
    }

    #[tokio::test]
    async fn expiry_watch_logs_out_at_expiry() {
        let holder = TokenHolder::new();
        holder.establish(Session::new(
            "sub-1",
            "e",
            "t",
            Utc::now() + ChronoDuration::milliseconds(150),
        ));
        let epoch = holder.epoch();

        // A long cap must not delay the logout past the token's expiry.
        let watch = spawn_expiry_watch(
            Arc::clone(&holder),
            Arc::new(FailingRefresh),
            Duration::from_secs(3600),
        );

        tokio::time::timeout(Duration::from_secs(2), holder.epoch_changed(epoch))
            .await
            .expect("expiry not acted on");
        let state = holder.state();
        assert!(state.session.is_none());
        assert!(state.error.unwrap().contains("revoked"));
        watch.abort();
    }
}
