//! Onboarding gate state machine.

use crate::api::Profile;
use crate::error::ApiError;

/// Where the gate stands for the current session.
///
/// Starts at `Unknown`; every session establishment passes through
/// `Checking` before settling. Only `Ready` opens the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GateState {
    #[default]
    Unknown,
    Checking,
    Unauthenticated,
    NeedsOnboarding,
    Ready,
    /// The profile check failed for a reason other than 404. Not retried.
    Error(String),
}

impl GateState {
    /// Check if a transition from `self` to `target` is valid.
    ///
    /// Settled states reach each other only through a fresh `Checking`,
    /// so `NeedsOnboarding` can never jump straight to `Ready`.
    pub fn can_transition_to(&self, target: &GateState) -> bool {
        use GateState::*;
        match (self, target) {
            (_, Unauthenticated) => true,
            (Checking, Checking) => false,
            (_, Checking) => true,
            (Checking, NeedsOnboarding | Ready | Error(_)) => true,
            _ => false,
        }
    }

    /// Whether the check has produced an answer for this session.
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Unknown | Self::Checking)
    }

    /// Only `Ready` authorizes dashboard routes.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Map the outcome of a profile fetch to the state it drives the gate to.
    pub fn from_profile_result(result: Result<Profile, ApiError>) -> GateState {
        match result {
            Ok(profile) if profile.onboarding_complete => Self::Ready,
            Ok(_) => Self::NeedsOnboarding,
            Err(e) if e.is_status(404) => Self::NeedsOnboarding,
            Err(ApiError::Unauthenticated) => Self::Unauthenticated,
            Err(e) => Self::Error(e.user_message()),
        }
    }
}

impl std::fmt::Display for GateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Checking => write!(f, "checking"),
            Self::Unauthenticated => write!(f, "unauthenticated"),
            Self::NeedsOnboarding => write!(f, "needs_onboarding"),
            Self::Ready => write!(f, "ready"),
            Self::Error(msg) => write!(f, "error: {msg}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Role;

    fn profile(onboarding_complete: bool) -> Profile {
        Profile {
            user_id: "u".into(),
            display_name: None,
            email: "e@x.org".into(),
            role: Role::Other,
            onboarding_complete,
            credits: 0,
        }
    }

    #[test]
    fn valid_transitions() {
        use GateState::*;
        let transitions = [
            (Unknown, Checking),
            (Unknown, Unauthenticated),
            (Checking, Ready),
            (Checking, NeedsOnboarding),
            (Checking, Error("boom".into())),
            (NeedsOnboarding, Checking),
            (Ready, Checking),
            (Ready, Unauthenticated),
            (Error("boom".into()), Checking),
            (Unauthenticated, Checking),
        ];
        for (from, to) in transitions {
            assert!(from.can_transition_to(&to), "{from} should transition to {to}");
        }
    }

    #[test]
    fn invalid_transitions() {
        use GateState::*;
        // No settling without a check
        assert!(!Unknown.can_transition_to(&Ready));
        assert!(!NeedsOnboarding.can_transition_to(&Ready));
        assert!(!Error("x".into()).can_transition_to(&Ready));
        assert!(!Unauthenticated.can_transition_to(&NeedsOnboarding));
        assert!(!Checking.can_transition_to(&Checking));
    }

    #[test]
    fn missing_and_incomplete_profiles_need_onboarding() {
        let not_found = Err(ApiError::Http {
            status: 404,
            detail: "request failed with status 404".into(),
        });
        assert_eq!(GateState::from_profile_result(not_found), GateState::NeedsOnboarding);
        assert_eq!(
            GateState::from_profile_result(Ok(profile(false))),
            GateState::NeedsOnboarding
        );
        assert_eq!(GateState::from_profile_result(Ok(profile(true))), GateState::Ready);
    }

    #[test]
    fn other_failures_are_errors() {
        let server = Err(ApiError::Http {
            status: 500,
            detail: "Internal error".into(),
        });
        assert_eq!(
            GateState::from_profile_result(server),
            GateState::Error("Internal error".into())
        );
        assert!(matches!(
            GateState::from_profile_result(Err(ApiError::Malformed("eof".into()))),
            GateState::Error(_)
        ));
        assert_eq!(
            GateState::from_profile_result(Err(ApiError::Unauthenticated)),
            GateState::Unauthenticated
        );
    }

    #[test]
    fn only_ready_is_ready() {
        assert!(GateState::Ready.is_ready());
        assert!(!GateState::NeedsOnboarding.is_ready());
        assert!(!GateState::Checking.is_settled());
        assert!(GateState::Error("x".into()).is_settled());
    }
}
