//! Identity-provider seam.

use async_trait::async_trait;
use chrono::Utc;
use secrecy::ExposeSecret;

use super::session::Session;
use crate::config::IdentityConfig;
use crate::error::AuthError;

/// External identity provider (OIDC authorization-code flow with PKCE in
/// the browser deployment). The redirect exchange is the provider's
/// business; this crate only sees the resulting [`Session`].
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Complete a sign-in and return the authenticated session.
    async fn sign_in(&self) -> Result<Session, AuthError>;

    /// End the provider-side session.
    async fn sign_out(&self, session: Option<&Session>) -> Result<(), AuthError>;

    /// Obtain a fresh token for an existing session.
    async fn refresh(&self, session: &Session) -> Result<Session, AuthError>;
}

/// Provider backed by a pre-issued access token.
///
/// Tokens from this provider cannot be refreshed, so expiry ends the session.
pub struct StaticTokenProvider {
    config: IdentityConfig,
}

impl StaticTokenProvider {
    pub fn new(config: IdentityConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl IdentityProvider for StaticTokenProvider {
    fn name(&self) -> &str {
        "static"
    }

    async fn sign_in(&self) -> Result<Session, AuthError> {
        if self.config.access_token.expose_secret().is_empty() {
            return Err(AuthError::SignInFailed("empty access token".into()));
        }
        let ttl = chrono::Duration::from_std(self.config.token_ttl)
            .map_err(|e| AuthError::SignInFailed(format!("invalid token lifetime: {e}")))?;
        Ok(Session::new(
            self.config.subject_id.clone(),
            self.config.email.clone(),
            self.config.access_token.expose_secret().to_string(),
            Utc::now() + ttl,
        ))
    }

    async fn sign_out(&self, _session: Option<&Session>) -> Result<(), AuthError> {
        Ok(())
    }

    async fn refresh(&self, _session: &Session) -> Result<Session, AuthError> {
        Err(AuthError::RefreshFailed(
            "static tokens cannot be refreshed".into(),
        ))
    }
}
