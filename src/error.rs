//! Error types for the dashboard core.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Mutation error: {0}")]
    Mutation(#[from] MutationError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Identity-provider integration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Sign-in failed: {0}")]
    SignInFailed(String),

    #[error("Sign-out failed: {0}")]
    SignOutFailed(String),

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("No active session")]
    NoSession,
}

/// Failure classification for every backend call.
///
/// The fetch client returns this instead of panicking, so every caller
/// handles both branches explicitly.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// No session, or the session token has expired. Never reaches the network.
    #[error("Not authenticated")]
    Unauthenticated,

    /// The backend rejected the request.
    #[error("HTTP {status}: {detail}")]
    Http { status: u16, detail: String },

    /// Connectivity failure.
    #[error("Network error: {0}")]
    Network(String),

    /// A 2xx response whose body did not have the expected shape.
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl ApiError {
    /// Only connectivity failures are worth a user-initiated retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Whether this is an HTTP rejection with the given status.
    pub fn is_status(&self, code: u16) -> bool {
        matches!(self, Self::Http { status, .. } if *status == code)
    }

    /// Text suitable for inline display next to the invoking control.
    pub fn user_message(&self) -> String {
        match self {
            Self::Http { detail, .. } => detail.clone(),
            Self::Network(_) => "Network error, please try again.".to_string(),
            other => other.to_string(),
        }
    }
}

/// A single form field failed local validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }

    pub fn required(field: &'static str) -> Self {
        Self::new(field, "This field is required.")
    }
}

/// Errors surfaced by the mutation controllers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Action was not confirmed")]
    Declined,

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl MutationError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(e) => e.message.clone(),
            Self::Declined => self.to_string(),
            Self::Api(e) => e.user_message(),
        }
    }
}

/// Result type alias for the dashboard core.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_surfaces_detail_verbatim() {
        let err = ApiError::Http {
            status: 400,
            detail: "Bucket name is invalid.".into(),
        };
        assert_eq!(err.user_message(), "Bucket name is invalid.");
        assert!(err.is_status(400));
        assert!(!err.is_status(404));
        assert!(!err.is_retryable());
    }

    #[test]
    fn only_network_is_retryable() {
        assert!(ApiError::Network("refused".into()).is_retryable());
        assert!(!ApiError::Unauthenticated.is_retryable());
        assert!(!ApiError::Malformed("eof".into()).is_retryable());
    }

    #[test]
    fn mutation_error_messages() {
        let err = MutationError::from(ValidationError::required("user_bucket"));
        assert_eq!(err.user_message(), "This field is required.");

        let err = MutationError::from(ApiError::Http {
            status: 404,
            detail: "Not found.".into(),
        });
        assert_eq!(err.user_message(), "Not found.");
    }

    #[test]
    fn top_level_wraps_sources() {
        let err: Error = ConfigError::MissingEnvVar("DEID_API_URL".into()).into();
        assert_eq!(
            err.to_string(),
            "Configuration error: Missing required environment variable: DEID_API_URL"
        );
        let err: Error = MutationError::Declined.into();
        assert!(matches!(err, Error::Mutation(MutationError::Declined)));
    }
}
