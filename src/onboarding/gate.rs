//! Onboarding gate — decides, once per session, whether the user goes to
//! the onboarding form or the dashboard.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tracing::{info, warn};

use super::state::GateState;
use crate::api::ApiClient;
use crate::auth::{AuthState, TokenHolder};

/// Runs the profile check and publishes the resulting [`GateState`].
pub struct OnboardingGate {
    client: ApiClient,
    holder: Arc<TokenHolder>,
    tx: watch::Sender<GateState>,
    /// Epoch of the last session the gate fired for (0 = none).
    fired_epoch: AtomicU64,
    /// Transitions into `Ready` so far.
    opened: AtomicU64,
}

impl OnboardingGate {
    pub fn new(client: ApiClient) -> Arc<Self> {
        let (tx, _rx) = watch::channel(GateState::Unknown);
        let holder = Arc::clone(client.holder());
        Arc::new(Self {
            client,
            holder,
            tx,
            fired_epoch: AtomicU64::new(0),
            opened: AtomicU64::new(0),
        })
    }

    pub fn state(&self) -> GateState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<GateState> {
        self.tx.subscribe()
    }

    pub fn is_ready(&self) -> bool {
        self.tx.borrow().is_ready()
    }

    /// How many times the gate has opened. Unlike the state itself, this
    /// never misses a `Ready` that was left again before a subscriber looked.
    pub fn times_opened(&self) -> u64 {
        self.opened.load(Ordering::SeqCst)
    }

    /// React to an auth transition.
    ///
    /// Logout sends the gate to `Unauthenticated`. A newly established
    /// session triggers exactly one check; later transitions within the
    /// same epoch (token refreshes) leave the gate alone.
    pub async fn on_auth_change(&self, auth: &AuthState) -> GateState {
        if auth.user().is_none() {
            self.mark_unauthenticated();
            return self.state();
        }
        if self.fired_epoch.swap(auth.epoch, Ordering::SeqCst) == auth.epoch {
            return self.state();
        }
        self.evaluate().await
    }

    /// Re-run the check, e.g. after the onboarding form was submitted.
    /// Never assumes `Ready`.
    pub async fn reevaluate(&self) -> GateState {
        self.evaluate().await
    }

    pub fn mark_unauthenticated(&self) {
        self.transition(GateState::Unauthenticated);
    }

    async fn evaluate(&self) -> GateState {
        let auth = self.holder.state();
        if auth.user().is_none() {
            self.mark_unauthenticated();
            return self.state();
        }
        let epoch = auth.epoch;
        self.transition(GateState::Checking);

        let result = tokio::select! {
            result = self.client.fetch_profile() => result,
            _ = self.holder.epoch_changed(epoch) => {
                info!(epoch, "Session changed during onboarding check, cancelling");
                if self.holder.current_session().is_none() {
                    self.mark_unauthenticated();
                }
                return self.state();
            }
        };

        if self.holder.epoch() != epoch {
            return self.state();
        }
        let next = GateState::from_profile_result(result);
        self.transition(next.clone());
        next
    }

    fn transition(&self, next: GateState) {
        let mut from = GateState::Unknown;
        let changed = self.tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            if !current.can_transition_to(&next) {
                warn!(from = %current, to = %next, "Ignoring invalid gate transition");
                return false;
            }
            from = std::mem::replace(current, next.clone());
            // Counted before subscribers are woken.
            if next.is_ready() {
                self.opened.fetch_add(1, Ordering::SeqCst);
            }
            true
        });
        if changed {
            info!(from = %from, to = %next, "Onboarding gate transition");
        }
    }
}
