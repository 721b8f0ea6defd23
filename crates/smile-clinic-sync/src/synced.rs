//! Wiring between the domain store and the sync service.

use std::sync::Arc;

use smile_clinic_core::db::{DbResult, LAST_PULL_AT, LAST_PUSH_AT};
use smile_clinic_core::{Database, DomainStore, Snapshot, SnapshotObserver};

use crate::service::SyncService;

/// Schedules a debounced push of every snapshot the store reports.
pub struct SyncObserver {
    service: SyncService,
}

impl SyncObserver {
    pub fn new(service: SyncService) -> Self {
        Self { service }
    }
}

impl SnapshotObserver for SyncObserver {
    fn on_change(&self, snapshot: &Snapshot) {
        self.service.schedule_push(snapshot.clone());
    }
}

/// Make every mutation of `store` schedule a push on `service`.
pub fn attach(store: &mut DomainStore, service: &SyncService) {
    store.set_observer(Some(Arc::new(SyncObserver::new(service.clone()))));
}

/// Replace the whole local dataset with the remote copy.
///
/// On failure nothing local changes. On success the echo push the
/// replacement would trigger is cancelled, since the server already holds
/// this data.
pub async fn force_pull(store: &mut DomainStore, service: &SyncService) -> bool {
    let Some(snapshot) = service.pull().await else {
        return false;
    };

    let hash = snapshot.content_hash();
    store.replace_all(snapshot);
    service.cancel_pending_push();

    let storage = store.storage();
    if let Err(e) = storage.record_pull() {
        tracing::warn!(error = %e, "Failed to record pull");
    }
    match hash {
        Ok(hash) => {
            if let Err(e) = storage.record_push(&hash) {
                tracing::warn!(error = %e, "Failed to record pulled hash");
            }
        }
        Err(e) => tracing::warn!(error = %e, "Failed to hash pulled snapshot"),
    }
    true
}

/// Push the current dataset immediately, skipping the debounce.
///
/// If the push is dropped or fails, a debounced push that was waiting is
/// put back with the current dataset, so the next cycle still delivers it.
pub async fn force_push(store: &DomainStore, service: &SyncService) -> bool {
    let snapshot = store.snapshot();
    let had_pending = service.cancel_pending_push();
    if !service.push(&snapshot).await {
        if had_pending {
            tracing::debug!("Forced push not delivered, rescheduling");
            service.schedule_push(snapshot);
        }
        return false;
    }

    match snapshot.content_hash() {
        Ok(hash) => {
            if let Err(e) = store.storage().record_push(&hash) {
                tracing::warn!(error = %e, "Failed to record push");
            }
        }
        Err(e) => tracing::warn!(error = %e, "Failed to hash pushed snapshot"),
    }
    true
}

/// Local view of sync bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub patients: usize,
    pub appointments: usize,
    pub last_push_at: Option<String>,
    pub last_pull_at: Option<String>,
    /// Whether the dataset differs from what was last exchanged with the server.
    pub unsynced_changes: bool,
}

pub fn sync_report(store: &DomainStore) -> DbResult<SyncReport> {
    let db: &Database = store.storage();
    let hash = store.snapshot().content_hash()?;
    let non_empty = |value: Option<String>| value.filter(|v| !v.is_empty());

    Ok(SyncReport {
        patients: store.patients().len(),
        appointments: store.appointments().len(),
        last_push_at: non_empty(db.get_sync_state(LAST_PUSH_AT)?),
        last_pull_at: non_empty(db.get_sync_state(LAST_PULL_AT)?),
        unsynced_changes: db.has_unsynced_changes(&hash)?,
    })
}
