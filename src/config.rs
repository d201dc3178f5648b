//! Configuration types.

use std::time::Duration;

use reqwest::Url;

use crate::error::ConfigError;

/// Dashboard configuration.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Base URL every backend path is resolved against.
    pub api_base_url: Url,
    /// Upper bound on a single expiry-watch sleep.
    pub expiry_check_interval: Duration,
    /// Pre-issued identity for the static token provider, if any.
    pub identity: Option<IdentityConfig>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_base_url: Url::parse("http://localhost:8000/api/").expect("valid default URL"),
            expiry_check_interval: Duration::from_secs(30),
            identity: None,
        }
    }
}

impl DashboardConfig {
    /// Load configuration from the environment.
    ///
    /// Required: `DEID_API_URL`. Optional: `DEID_EXPIRY_CHECK_SECS` plus the
    /// identity variables read by [`IdentityConfig::from_env`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw = std::env::var("DEID_API_URL")
            .map_err(|_| ConfigError::MissingEnvVar("DEID_API_URL".into()))?;
        let api_base_url = parse_base_url(&raw)?;

        let expiry_check_interval = match std::env::var("DEID_EXPIRY_CHECK_SECS") {
            Ok(s) => Duration::from_secs(parse_u64("DEID_EXPIRY_CHECK_SECS", &s)?),
            Err(_) => Duration::from_secs(30),
        };

        Ok(Self {
            api_base_url,
            expiry_check_interval,
            identity: IdentityConfig::from_env()?,
        })
    }
}

/// Pre-issued token material for [`crate::auth::StaticTokenProvider`].
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub access_token: secrecy::SecretString,
    pub subject_id: String,
    pub email: String,
    pub token_ttl: Duration,
}

impl IdentityConfig {
    /// Reads `DEID_ACCESS_TOKEN`, `DEID_SUBJECT`, `DEID_EMAIL` and
    /// `DEID_TOKEN_TTL_SECS`. Returns `None` when no token is set.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Ok(token) = std::env::var("DEID_ACCESS_TOKEN") else {
            return Ok(None);
        };
        let subject_id = std::env::var("DEID_SUBJECT")
            .map_err(|_| ConfigError::MissingEnvVar("DEID_SUBJECT".into()))?;
        let email = std::env::var("DEID_EMAIL").unwrap_or_default();
        let ttl = match std::env::var("DEID_TOKEN_TTL_SECS") {
            Ok(s) => parse_u64("DEID_TOKEN_TTL_SECS", &s)?,
            Err(_) => 3600,
        };

        Ok(Some(Self {
            access_token: secrecy::SecretString::from(token),
            subject_id,
            email,
            token_ttl: Duration::from_secs(ttl),
        }))
    }
}

/// Parse a base URL, forcing a trailing slash so relative joins keep the
/// full path prefix.
pub fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidValue {
        key: "DEID_API_URL".into(),
        message: e.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidValue {
            key: "DEID_API_URL".into(),
            message: "not a base URL".into(),
        });
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("expected a whole number of seconds, got {value:?}"),
    })
}
