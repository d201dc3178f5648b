//! Onboarding gate — routes each new session to either the onboarding form
//! or the dashboard, based on the backend profile.
//!
//! A missing profile (404) and a profile with `onboarding_complete = false`
//! both need onboarding. Only a completed profile opens the dashboard.

pub mod gate;
pub mod state;

pub use gate::OnboardingGate;
pub use state::GateState;
