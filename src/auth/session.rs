//! Session value and the observable auth state.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};

/// The authenticated identity obtained from the identity provider.
///
/// The bearer token is kept in a [`SecretString`] so it never shows up in
/// `Debug` output or logs.
#[derive(Debug, Clone)]
pub struct Session {
    pub subject_id: String,
    pub email: String,
    bearer_token: SecretString,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        subject_id: impl Into<String>,
        email: impl Into<String>,
        bearer_token: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            email: email.into(),
            bearer_token: SecretString::from(bearer_token.into()),
            expires_at,
        }
    }

    /// Raw token for the `Authorization` header.
    pub fn bearer_token(&self) -> &str {
        self.bearer_token.expose_secret()
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    pub fn is_authenticated(&self) -> bool {
        !self.is_expired()
    }
}

/// Observable auth state published by the [`TokenHolder`](super::TokenHolder).
///
/// `epoch` increases on every login and every logout. A token refresh for
/// the same subject keeps it, so dependents can tell "same session, new
/// token" apart from "new session".
#[derive(Debug, Clone, Default)]
pub struct AuthState {
    pub is_loading: bool,
    pub session: Option<Session>,
    pub error: Option<String>,
    pub epoch: u64,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_authenticated)
    }

    /// The current user, if authenticated.
    pub fn user(&self) -> Option<&Session> {
        self.session.as_ref().filter(|s| s.is_authenticated())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn token_redacted_in_debug() {
        let session = Session::new("sub-1", "a@b.c", "super-secret", Utc::now());
        let debug = format!("{session:?}");
        assert!(!debug.contains("super-secret"));
        assert_eq!(session.bearer_token(), "super-secret");
    }

    #[test]
    fn expiry() {
        let live = Session::new("s", "e", "t", Utc::now() + Duration::minutes(5));
        assert!(live.is_authenticated());

        let stale = Session::new("s", "e", "t", Utc::now() - Duration::seconds(1));
        assert!(stale.is_expired());
        assert!(!stale.is_authenticated());
    }

    #[test]
    fn auth_state_hides_expired_user() {
        let state = AuthState {
            session: Some(Session::new("s", "e", "t", Utc::now() - Duration::seconds(1))),
            ..Default::default()
        };
        assert!(!state.is_authenticated());
        assert!(state.user().is_none());
    }
}
