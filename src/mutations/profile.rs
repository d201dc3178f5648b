//! Onboarding profile submission.

use std::sync::Arc;

use tracing::{info, warn};

use super::required;
use crate::api::{ApiClient, Profile, ProfileSubmission, Role};
use crate::error::{ApiError, MutationError};
use crate::onboarding::{GateState, OnboardingGate};

/// Raw input of the onboarding form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OnboardingForm {
    pub display_name: String,
    pub role: Role,
}

impl From<&Profile> for OnboardingForm {
    fn from(profile: &Profile) -> Self {
        Self {
            display_name: profile.display_name.clone().unwrap_or_default(),
            role: profile.role,
        }
    }
}

pub struct ProfileController {
    client: ApiClient,
    gate: Arc<OnboardingGate>,
}

impl ProfileController {
    pub fn new(client: ApiClient, gate: Arc<OnboardingGate>) -> Self {
        Self { client, gate }
    }

    /// Pre-populate the onboarding form from an existing profile.
    /// A profile that was never created yields an empty form.
    pub async fn prefill(&self) -> Result<OnboardingForm, MutationError> {
        match self.client.fetch_profile().await {
            Ok(profile) => Ok(OnboardingForm::from(&profile)),
            Err(e) if e.is_status(404) => Ok(OnboardingForm::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Complete onboarding, then re-run the gate check.
    ///
    /// Returns the gate state after re-evaluation; the backend decides
    /// whether onboarding is actually complete.
    pub async fn submit_onboarding(
        &self,
        form: &OnboardingForm,
    ) -> Result<GateState, MutationError> {
        let display_name = required("display_name", &form.display_name)?;
        let session = self
            .client
            .holder()
            .current_session()
            .ok_or(ApiError::Unauthenticated)?;

        let body = ProfileSubmission {
            display_name,
            email: session.email,
            user_id: session.subject_id,
            role: form.role,
            onboarding_complete: true,
        };
        self.client.submit_profile(&body).await.inspect_err(|e| {
            warn!(user_id = %body.user_id, error = %e, "Onboarding submission rejected");
        })?;
        info!(user_id = %body.user_id, role = %body.role, "Onboarding profile saved");

        Ok(self.gate.reevaluate().await)
    }
}
