//! Dashboard — wires the session components together and keeps them in
//! step with the token holder.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::api::ApiClient;
use crate::auth::{AuthState, IdentityProvider, Session, TokenHolder};
use crate::config::DashboardConfig;
use crate::error::AuthError;
use crate::mutations::{ConnectionController, JobController, ProfileController};
use crate::onboarding::{GateState, OnboardingGate};
use crate::resources::ResourceStore;
use crate::routing::{self, Route, RouteDecision};

/// One instance of every session component, all sharing one [`TokenHolder`].
pub struct Dashboard {
    pub holder: Arc<TokenHolder>,
    pub client: ApiClient,
    pub store: Arc<ResourceStore>,
    pub gate: Arc<OnboardingGate>,
    pub connections: ConnectionController,
    pub jobs: JobController,
    pub profile: ProfileController,
    /// Epoch whose gate check and initial refresh have completed.
    synced: watch::Sender<u64>,
}

impl Dashboard {
    pub fn new(config: &DashboardConfig) -> Arc<Self> {
        let holder = TokenHolder::new();
        Self::with_client(ApiClient::new(config.api_base_url.clone(), holder))
    }

    /// Build around an existing client; its holder becomes the shared one.
    pub fn with_client(client: ApiClient) -> Arc<Self> {
        let holder = Arc::clone(client.holder());
        let store = ResourceStore::new(client.clone());
        let gate = OnboardingGate::new(client.clone());
        let (synced, _rx) = watch::channel(0);

        Arc::new(Self {
            connections: ConnectionController::new(client.clone(), Arc::clone(&store)),
            jobs: JobController::new(client.clone(), Arc::clone(&store)),
            profile: ProfileController::new(client.clone(), Arc::clone(&gate)),
            holder,
            client,
            store,
            gate,
            synced,
        })
    }

    pub async fn sign_in(&self, provider: &dyn IdentityProvider) -> Result<Session, AuthError> {
        self.holder.sign_in(provider).await
    }

    pub async fn sign_out(&self, provider: &dyn IdentityProvider) -> Result<(), AuthError> {
        self.holder.sign_out(provider).await
    }

    /// What a navigation to `route` yields right now. A session that has
    /// expired counts as signed out even before the holder drops it.
    pub fn navigate(&self, route: Route) -> RouteDecision {
        if self.holder.current_session().is_none() {
            return routing::resolve(route, &GateState::Unauthenticated);
        }
        routing::resolve(route, &self.gate.state())
    }

    /// Wait until the session loop has finished syncing `epoch` (gate
    /// settled and, when ready, the store refreshed) or moved past it.
    pub async fn wait_synced(&self, epoch: u64) {
        let mut rx = self.synced.subscribe();
        let _ = rx.wait_for(|synced| *synced >= epoch).await;
    }

    /// Spawn the task that keeps the store and gate in step with the session.
    ///
    /// A new epoch with a live session runs the gate check; a new epoch
    /// without one resets the gate and clears the store. Every time the gate
    /// opens (after login or after onboarding) the store is refreshed.
    /// Token refreshes within an epoch are ignored. Work for a superseded
    /// epoch is aborted.
    pub fn spawn_session_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut auth_rx = this.holder.subscribe();
            let mut gate_rx = this.gate.subscribe();
            let mut seen_epoch = 0;
            let mut seen_opened = 0;
            let mut check_task: Option<JoinHandle<()>> = None;
            let mut refresh_task: Option<JoinHandle<()>> = None;

            loop {
                let auth = auth_rx.borrow_and_update().clone();
                if auth.epoch != seen_epoch {
                    seen_epoch = auth.epoch;
                    for task in [check_task.take(), refresh_task.take()].into_iter().flatten() {
                        task.abort();
                    }
                    check_task = this.on_new_epoch(&auth);
                }

                let _ = gate_rx.borrow_and_update();
                let opened = this.gate.times_opened();
                if opened != seen_opened {
                    seen_opened = opened;
                    if this.gate.is_ready() && auth.user().is_some() {
                        if let Some(task) = refresh_task.take() {
                            task.abort();
                        }
                        refresh_task = Some(this.spawn_initial_refresh(auth.epoch));
                    }
                }

                let open = tokio::select! {
                    changed = auth_rx.changed() => changed.is_ok(),
                    changed = gate_rx.changed() => changed.is_ok(),
                };
                if !open {
                    break;
                }
            }
            debug!("Session loop stopped");
        })
    }

    fn on_new_epoch(self: &Arc<Self>, auth: &AuthState) -> Option<JoinHandle<()>> {
        let epoch = auth.epoch;
        if auth.user().is_none() {
            info!(epoch, "Session ended, clearing dashboard state");
            self.gate.mark_unauthenticated();
            self.store.clear();
            self.mark_synced(epoch);
            return None;
        }

        let this = Arc::clone(self);
        let auth = auth.clone();
        Some(tokio::spawn(async move {
            let gate = this.gate.on_auth_change(&auth).await;
            info!(epoch, gate = %gate, "Onboarding check finished");
            // An open gate is synced once its refresh lands.
            if !gate.is_ready() {
                this.mark_synced(epoch);
            }
        }))
    }

    fn spawn_initial_refresh(self: &Arc<Self>, epoch: u64) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = this.store.refresh().await;
            info!(epoch, outcome = ?outcome, "Gate opened, store refreshed");
            this.mark_synced(epoch);
        })
    }

    fn mark_synced(&self, epoch: u64) {
        self.synced.send_if_modified(|synced| {
            let advance = *synced < epoch;
            if advance {
                *synced = epoch;
            }
            advance
        });
    }
}
