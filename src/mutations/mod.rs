//! Mutation controllers — user-initiated writes against the backend.
//!
//! Every controller validates locally first (no network call on a field
//! error), then calls the [`ApiClient`](crate::api::ApiClient), then resyncs:
//! a store refresh for connections and jobs, a gate re-evaluation for the
//! onboarding profile. A backend rejection is returned as-is and leaves
//! local state untouched.

pub mod connections;
pub mod jobs;
pub mod profile;

pub use connections::{ConnectionController, ConnectionForm};
pub use jobs::{JobController, JobForm};
pub use profile::{OnboardingForm, ProfileController};

use async_trait::async_trait;

use crate::error::ValidationError;

/// Asks the user to approve a destructive action.
#[async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, prompt: &str) -> bool;
}

/// Fixed answer, for non-interactive callers.
pub struct AutoConfirm(pub bool);

#[async_trait]
impl Confirm for AutoConfirm {
    async fn confirm(&self, _prompt: &str) -> bool {
        self.0
    }
}

/// Trimmed value of a required text field.
pub(crate) fn required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::required(field));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_trims() {
        assert_eq!(required("name", "  prod  ").unwrap(), "prod");
        let err = required("name", "   ").unwrap_err();
        assert_eq!(err.field, "name");
        assert_eq!(err.message, "This field is required.");
    }

    #[tokio::test]
    async fn auto_confirm_answers() {
        assert!(AutoConfirm(true).confirm("ok?").await);
        assert!(!AutoConfirm(false).confirm("ok?").await);
    }
}
