use super::remote::RemoteStore;
use crate::core::model::{Configuration, Profiles, SyncRecord};
use crate::error::WorkbenchError;
use crate::persistence::local::{LocalStore, LAST_SYNC_KEY};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

#[derive(Debug, Clone, PartialEq)]
pub enum SyncStatus {
    Idle,
    Pulling,
    Pushing,
    Synced(DateTime<Utc>),
    Failed(String),
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Idle => f.write_str("idle"),
            SyncStatus::Pulling => f.write_str("pulling…"),
            SyncStatus::Pushing => f.write_str("pushing…"),
            SyncStatus::Synced(at) => write!(f, "synced at {}", at.to_rfc3339()),
            SyncStatus::Failed(msg) => write!(f, "failed: {msg}"),
        }
    }
}

/// Debounced, best-effort mirror of local state to the remote row.
///
/// There is at most one pending push timer. Scheduling a new push aborts the
/// pending one, so a burst of edits ends in a single upsert of the last value.
/// Pushes already on the wire are left alone; the last response observed
/// decides the status.
pub struct SyncCoordinator {
    remote: RemoteStore,
    local: LocalStore,
    quiet_period: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
    status: Mutex<SyncStatus>,
}

impl SyncCoordinator {
    pub fn new(remote: RemoteStore, local: LocalStore, quiet_period: Duration) -> Self {
        Self {
            remote,
            local,
            quiet_period,
            pending: Mutex::new(None),
            status: Mutex::new(SyncStatus::Idle),
        }
    }

    pub fn status(&self) -> SyncStatus {
        lock(&self.status).clone()
    }

    fn set_status(&self, status: SyncStatus) {
        *lock(&self.status) = status;
    }

    pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        let marker: Option<String> = self.local.load_local(LAST_SYNC_KEY, None);
        marker.and_then(|s| DateTime::parse_from_rfc3339(&s).ok()).map(|t| t.with_timezone(&Utc))
    }

    fn record_marker(&self, at: DateTime<Utc>) {
        self.local.save_local(LAST_SYNC_KEY, &at.to_rfc3339());
    }

    /// Fetches the remote record and records its timestamp as the last sync.
    /// Applying it is up to the caller.
    pub async fn pull_latest(&self) -> Result<SyncRecord, WorkbenchError> {
        self.set_status(SyncStatus::Pulling);
        match self.remote.fetch().await {
            Ok(record) => {
                log::info!("Pulled remote configuration updated at {}", record.updated_at);
                self.record_marker(record.updated_at);
                self.set_status(SyncStatus::Synced(record.updated_at));
                Ok(record)
            }
            Err(e) => {
                self.set_status(SyncStatus::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Upserts the given state now, stamped with the current time.
    pub async fn push_latest(&self, config: &Configuration, profiles: &Profiles) -> Result<DateTime<Utc>, WorkbenchError> {
        let record = SyncRecord {
            id: self.remote.row_id().to_string(),
            prompt_config: config.clone(),
            test_profiles: profiles.clone(),
            updated_at: Utc::now(),
        };

        self.set_status(SyncStatus::Pushing);
        match self.remote.upsert(&record).await {
            Ok(()) => {
                log::info!("Pushed configuration to remote store");
                self.record_marker(record.updated_at);
                self.set_status(SyncStatus::Synced(record.updated_at));
                Ok(record.updated_at)
            }
            Err(e) => {
                log::warn!("Remote push failed: {e}");
                self.set_status(SyncStatus::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Restarts the quiet-period timer with the latest state.
    pub fn schedule_push(self: &Arc<Self>, config: Arc<Configuration>, profiles: Arc<Profiles>) {
        let this = Arc::clone(self);
        let task = tokio::spawn(async move {
            sleep(this.quiet_period).await;
            // Past the quiet period the push is detached: aborting this timer
            // no longer cancels it.
            let push = tokio::spawn(async move {
                // Errors are already reflected in the status.
                let _ = this.push_latest(&config, &profiles).await;
            });
            let _ = push.await;
        });

        if let Some(previous) = lock(&self.pending).replace(task) {
            previous.abort();
        }
    }

    pub fn has_pending_push(&self) -> bool {
        lock(&self.pending).as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Waits for a scheduled push, if any, to run to completion.
    pub async fn flush(&self) {
        let task = lock(&self.pending).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    log::warn!("Pending push task failed: {e}");
                }
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
