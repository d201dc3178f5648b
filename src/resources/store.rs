//! Session resource store — profile, connections and jobs kept in step by a
//! single coalesced refresh.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{ApiClient, Connection, Job, JobStatus, Profile, Role};
use crate::auth::TokenHolder;
use crate::error::ApiError;

/// Error text recorded when a refresh is attempted without a session.
pub const NOT_AUTHENTICATED: &str = "not authenticated";

/// Point-in-time view of the synchronized resources.
///
/// `profile`, `connections` and `jobs` always come from the same successful
/// refresh. While `loading` is true they still hold the previous one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub profile: Option<Profile>,
    pub connections: Vec<Connection>,
    pub jobs: Vec<Job>,
    pub loading: bool,
    pub error: Option<String>,
    /// Number of refreshes applied so far.
    pub generation: u64,
}

impl Snapshot {
    pub fn connection(&self, id: Uuid) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == id)
    }

    /// Figures for the dashboard home view.
    pub fn summary(&self) -> Summary {
        let jobs_by_status = JobStatus::ALL
            .into_iter()
            .map(|st| (st, self.jobs.iter().filter(|j| j.status == st).count()))
            .collect();
        Summary {
            display_name: self.profile.as_ref().map(|p| p.label().to_string()),
            role: self.profile.as_ref().map(|p| p.role),
            credits: self.profile.as_ref().map_or(0, |p| p.credits),
            connection_count: self.connections.len(),
            job_count: self.jobs.len(),
            jobs_by_status,
        }
    }
}

/// Dashboard home figures derived from a [`Snapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub display_name: Option<String>,
    pub role: Option<Role>,
    pub credits: i64,
    pub connection_count: usize,
    pub job_count: usize,
    pub jobs_by_status: Vec<(JobStatus, usize)>,
}

/// How a refresh ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// All three fetches succeeded and replaced the snapshot.
    Applied { generation: u64 },
    /// A fetch failed; the previous snapshot was kept.
    Failed(String),
    /// No session; resources were cleared.
    Unauthenticated,
    /// The session changed mid-flight; results were dropped.
    Discarded,
}

struct Ledger {
    /// Sequence number of the most recent run that ran to completion.
    finished_seq: u64,
    last_outcome: RefreshOutcome,
}

/// Holds the three backend-owned resources and refreshes them together.
pub struct ResourceStore {
    client: ApiClient,
    holder: Arc<TokenHolder>,
    tx: watch::Sender<Snapshot>,
    started_seq: AtomicU64,
    /// Serializes runs: at most one fetch triple in flight.
    ledger: Mutex<Ledger>,
}

impl ResourceStore {
    pub fn new(client: ApiClient) -> Arc<Self> {
        let (tx, _rx) = watch::channel(Snapshot::default());
        let holder = Arc::clone(client.holder());
        Arc::new(Self {
            client,
            holder,
            tx,
            started_seq: AtomicU64::new(0),
            ledger: Mutex::new(Ledger {
                finished_seq: 0,
                last_outcome: RefreshOutcome::Unauthenticated,
            }),
        })
    }

    pub fn snapshot(&self) -> Snapshot {
        self.tx.borrow().clone()
    }

    /// Subscribe to snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.tx.subscribe()
    }

    /// Drop all resources (logout/expiry).
    pub fn clear(&self) {
        self.tx.send_modify(|s| {
            let generation = s.generation;
            *s = Snapshot {
                generation,
                ..Snapshot::default()
            };
        });
        debug!("Resource store cleared");
    }

    /// Re-fetch profile, connections and jobs.
    ///
    /// Concurrent callers queue behind the running refresh. A queued caller
    /// whose request is already covered by a run that started after it
    /// called gets that run's outcome instead of fetching again.
    pub async fn refresh(&self) -> RefreshOutcome {
        let ticket = self.started_seq.load(Ordering::SeqCst);
        let mut ledger = self.ledger.lock().await;

        if ledger.finished_seq > ticket {
            debug!(ticket, finished = ledger.finished_seq, "Refresh coalesced");
            return ledger.last_outcome.clone();
        }

        let seq = self.started_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let outcome = self.run().await;
        ledger.finished_seq = seq;
        ledger.last_outcome = outcome.clone();
        outcome
    }

    async fn run(&self) -> RefreshOutcome {
        let auth = self.holder.state();
        if auth.user().is_none() {
            self.tx.send_modify(|s| {
                s.profile = None;
                s.connections.clear();
                s.jobs.clear();
                s.loading = false;
                s.error = Some(NOT_AUTHENTICATED.to_string());
            });
            return RefreshOutcome::Unauthenticated;
        }
        let epoch = auth.epoch;

        self.tx.send_modify(|s| s.loading = true);
        let _loading = LoadingGuard { tx: &self.tx };

        let fetch = futures::future::join3(
            self.client.fetch_profile(),
            self.client.list_connections(),
            self.client.list_jobs(),
        );
        let (profile, connections, jobs) = tokio::select! {
            results = fetch => results,
            _ = self.holder.epoch_changed(epoch) => {
                info!(epoch, "Session changed during refresh, discarding results");
                return RefreshOutcome::Discarded;
            }
        };

        let fetched = match (profile, connections, jobs) {
            (Ok(p), Ok(c), Ok(j)) => Ok((p, c, j)),
            (Err(e), _, _) => Err(("profile", e)),
            (_, Err(e), _) => Err(("connections", e)),
            (_, _, Err(e)) => Err(("jobs", e)),
        };

        match fetched {
            Ok((profile, connections, jobs)) => self.apply(epoch, profile, connections, jobs),
            Err((resource, e)) => self.record_failure(epoch, resource, &e),
        }
    }

    fn apply(
        &self,
        epoch: u64,
        profile: Profile,
        connections: Vec<Connection>,
        jobs: Vec<Job>,
    ) -> RefreshOutcome {
        let mut generation = 0;
        let applied = self.tx.send_if_modified(|s| {
            // Checked under the snapshot lock so a logout that already
            // cleared the store cannot be overwritten.
            if self.holder.epoch() != epoch {
                return false;
            }
            warn_on_status_regressions(&s.jobs, &jobs);
            s.profile = Some(profile);
            s.connections = connections;
            s.jobs = jobs;
            s.error = None;
            s.loading = false;
            s.generation += 1;
            generation = s.generation;
            true
        });

        if !applied {
            info!(epoch, "Session changed before refresh could apply, discarding");
            return RefreshOutcome::Discarded;
        }
        let snapshot = self.tx.borrow();
        info!(
            generation,
            connections = snapshot.connections.len(),
            jobs = snapshot.jobs.len(),
            "Resources refreshed"
        );
        RefreshOutcome::Applied { generation }
    }

    fn record_failure(&self, epoch: u64, resource: &str, err: &ApiError) -> RefreshOutcome {
        let message = format!("Failed to fetch {resource}: {}", err.user_message());
        warn!(resource, error = %err, "Refresh failed, keeping last good snapshot");
        let recorded = self.tx.send_if_modified(|s| {
            if self.holder.epoch() != epoch {
                return false;
            }
            s.error = Some(message.clone());
            s.loading = false;
            true
        });
        if recorded {
            RefreshOutcome::Failed(message)
        } else {
            RefreshOutcome::Discarded
        }
    }
}

/// Resets `loading` however a run ends, including when the caller drops
/// the refresh future mid-flight.
struct LoadingGuard<'a> {
    tx: &'a watch::Sender<Snapshot>,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.tx.send_if_modified(|s| std::mem::replace(&mut s.loading, false));
    }
}

fn warn_on_status_regressions(previous: &[Job], next: &[Job]) {
    let before: HashMap<Uuid, JobStatus> = previous.iter().map(|j| (j.id, j.status)).collect();
    for job in next {
        if let Some(old) = before.get(&job.id) {
            if !old.can_transition_to(job.status) {
                warn!(job_id = %job.id, from = %old, to = %job.status, "Job status moved backwards");
            }
        }
    }
}
