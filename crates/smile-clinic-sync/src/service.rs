//! Debounced push, on-demand pull, and status fan-out.
//!
//! A [`SyncService`] owns one pending-push slot and one timer. Scheduling a
//! push replaces whatever snapshot was waiting and restarts the quiet
//! period, so a burst of mutations goes out as a single request carrying the
//! last state. At most one push is on the wire at a time; a push requested
//! while another is in flight is dropped, not queued.
//!
//! Status moves `idle → syncing → success | error`. `success` falls back to
//! `idle` after [`SyncConfig::success_reset`]; `error` stays until the next
//! attempt.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use smile_clinic_core::Snapshot;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::config::SyncConfig;
use crate::transport::SyncTransport;

pub const PUSH_SUCCESS_MESSAGE: &str = "Dados sincronizados";
pub const PUSH_FAILURE_MESSAGE: &str = "Falha ao sincronizar";
pub const PULL_SUCCESS_MESSAGE: &str = "Dados baixados do servidor";
pub const PULL_FAILURE_MESSAGE: &str = "Falha ao baixar dados";

/// Sync status as shown to the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Success,
    Error,
}

/// A status transition delivered to listeners.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusEvent {
    pub status: SyncStatus,
    pub message: Option<String>,
}

impl StatusEvent {
    fn new(status: SyncStatus, message: Option<&str>) -> Self {
        Self {
            status,
            message: message.map(str::to_string),
        }
    }
}

type Listener = Arc<dyn Fn(&StatusEvent) + Send + Sync>;

#[derive(Default)]
struct State {
    current: StatusEvent,
    /// Bumped on every transition; a revert only applies to its own epoch.
    epoch: u64,
    revert: Option<JoinHandle<()>>,
    /// Latest snapshot waiting for the timer.
    pending: Option<Snapshot>,
    /// Bumped on every schedule; a timer only fires for its own generation.
    generation: u64,
    timer: Option<JoinHandle<()>>,
    listeners: Vec<(u64, Listener)>,
    next_listener_id: u64,
    disposed: bool,
}

struct Inner {
    transport: Arc<dyn SyncTransport>,
    config: SyncConfig,
    runtime: Handle,
    in_flight: AtomicBool,
    state: Mutex<State>,
}

/// Clears the in-flight flag when the push finishes or its future is dropped.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn schedule_push(self: &Arc<Self>, snapshot: Snapshot) {
        let mut state = self.state();
        if state.disposed {
            tracing::debug!("Sync service disposed, push not scheduled");
            return;
        }

        state.pending = Some(snapshot);
        state.generation += 1;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }

        let generation = state.generation;
        let delay = self.config.debounce();
        let weak = Arc::downgrade(self);
        state.timer = Some(self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let snapshot = {
                let mut state = inner.state();
                if state.generation != generation {
                    return;
                }
                state.timer = None;
                state.pending.take()
            };
            if let Some(snapshot) = snapshot {
                inner.push(&snapshot).await;
            }
        }));
    }

    async fn push(self: &Arc<Self>, snapshot: &Snapshot) -> bool {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Push already in flight, request dropped");
            return false;
        }
        let guard = InFlightGuard(&self.in_flight);

        self.transition(StatusEvent::new(SyncStatus::Syncing, None), None);
        tracing::debug!(
            patients = snapshot.patients.len(),
            appointments = snapshot.appointments.len(),
            "Pushing snapshot"
        );

        let result = self.transport.push(snapshot).await;
        drop(guard);

        match result {
            Ok(()) => {
                tracing::info!(patients = snapshot.patients.len(), "Snapshot pushed");
                self.transition(
                    StatusEvent::new(SyncStatus::Success, Some(PUSH_SUCCESS_MESSAGE)),
                    None,
                );
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Push failed");
                self.transition(
                    StatusEvent::new(SyncStatus::Error, Some(PUSH_FAILURE_MESSAGE)),
                    None,
                );
                false
            }
        }
    }

    /// Record a new status and notify listeners.
    ///
    /// With `expected_epoch` set, the transition is skipped if any other
    /// transition happened in between.
    fn transition(self: &Arc<Self>, event: StatusEvent, expected_epoch: Option<u64>) {
        let listeners: Vec<Listener> = {
            let mut state = self.state();
            if expected_epoch.is_some_and(|epoch| epoch != state.epoch) {
                return;
            }

            state.epoch += 1;
            let previous_revert = state.revert.take();
            if expected_epoch.is_none() {
                if let Some(revert) = previous_revert {
                    revert.abort();
                }
            }
            if event.status == SyncStatus::Success && !state.disposed {
                state.revert = Some(self.spawn_revert(state.epoch));
            }

            state.current = event.clone();
            state.listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
        };

        for listener in listeners {
            listener(&event);
        }
    }

    fn spawn_revert(self: &Arc<Self>, epoch: u64) -> JoinHandle<()> {
        let delay = self.config.success_reset();
        let weak = Arc::downgrade(self);
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.transition(StatusEvent::default(), Some(epoch));
            }
        })
    }
}

/// Handle to the sync service. Clones share the same state.
#[derive(Clone)]
pub struct SyncService {
    inner: Arc<Inner>,
}

impl SyncService {
    /// Create a service whose timers run on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new(transport: Arc<dyn SyncTransport>, config: SyncConfig) -> Self {
        Self::with_runtime(transport, config, Handle::current())
    }

    /// Create a service whose timers run on `runtime`.
    pub fn with_runtime(
        transport: Arc<dyn SyncTransport>,
        config: SyncConfig,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                config,
                runtime,
                in_flight: AtomicBool::new(false),
                state: Mutex::new(State::default()),
            }),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Push `snapshot` once the quiet period passes without another call.
    ///
    /// A newer call replaces the waiting snapshot entirely. A push already
    /// on the wire is never cancelled.
    pub fn schedule_push(&self, snapshot: Snapshot) {
        self.inner.schedule_push(snapshot);
    }

    /// Drop the waiting snapshot, if any. Returns whether one was waiting.
    pub fn cancel_pending_push(&self) -> bool {
        let mut state = self.inner.state();
        state.generation += 1;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.pending.take().is_some()
    }

    pub fn has_pending_push(&self) -> bool {
        self.inner.state().pending.is_some()
    }

    pub fn is_push_in_flight(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Send `snapshot` now.
    ///
    /// Returns `true` only if the server accepted it. Returns `false`
    /// without any request when another push is in flight.
    pub async fn push(&self, snapshot: &Snapshot) -> bool {
        self.inner.push(snapshot).await
    }

    /// Fetch the remote snapshot. `None` on any failure.
    pub async fn pull(&self) -> Option<Snapshot> {
        self.inner
            .transition(StatusEvent::new(SyncStatus::Syncing, None), None);

        match self.inner.transport.pull().await {
            Ok(snapshot) => {
                tracing::info!(
                    patients = snapshot.patients.len(),
                    appointments = snapshot.appointments.len(),
                    "Snapshot pulled"
                );
                self.inner.transition(
                    StatusEvent::new(SyncStatus::Success, Some(PULL_SUCCESS_MESSAGE)),
                    None,
                );
                Some(snapshot)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Pull failed");
                self.inner.transition(
                    StatusEvent::new(SyncStatus::Error, Some(PULL_FAILURE_MESSAGE)),
                    None,
                );
                None
            }
        }
    }

    /// Register a listener for status transitions.
    pub fn on_status_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&StatusEvent) + Send + Sync + 'static,
    {
        let mut state = self.inner.state();
        let id = state.next_listener_id;
        state.next_listener_id += 1;
        state.listeners.push((id, Arc::new(listener)));
        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Current status.
    pub fn status(&self) -> StatusEvent {
        self.inner.state().current.clone()
    }

    /// Cancel the pending push and status revert, and drop all listeners.
    ///
    /// Later `schedule_push` calls are ignored. A push already in flight
    /// runs to completion.
    pub fn dispose(&self) {
        let mut state = self.inner.state();
        state.disposed = true;
        state.generation += 1;
        state.pending = None;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        if let Some(revert) = state.revert.take() {
            revert.abort();
        }
        state.listeners.clear();
        tracing::debug!("Sync service disposed");
    }
}

/// Returned by [`SyncService::on_status_change`].
pub struct Subscription {
    id: u64,
    inner: Weak<Inner>,
}

impl Subscription {
    /// Stop receiving status events.
    pub fn unsubscribe(self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.state().listeners.retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{SyncError, SyncResult};
    use async_trait::async_trait;
    use smile_clinic_core::models::{NewPatient, Patient};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeTransport {
        pushed: Mutex<Vec<Snapshot>>,
        completed: AtomicUsize,
        delay: Duration,
        fail: AtomicBool,
        remote: Mutex<Snapshot>,
    }

    impl FakeTransport {
        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                delay,
                ..Default::default()
            })
        }

        fn pushed(&self) -> Vec<Snapshot> {
            self.pushed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SyncTransport for FakeTransport {
        async fn push(&self, snapshot: &Snapshot) -> SyncResult<()> {
            self.pushed.lock().unwrap().push(snapshot.clone());
            tokio::time::sleep(self.delay).await;
            self.completed.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(SyncError::Status(503));
            }
            Ok(())
        }

        async fn pull(&self) -> SyncResult<Snapshot> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(SyncError::Status(503));
            }
            Ok(self.remote.lock().unwrap().clone())
        }
    }

    fn snapshot_with(name: &str) -> Snapshot {
        Snapshot {
            patients: vec![Patient::new(NewPatient::new(name, "11999990000"))],
            ..Default::default()
        }
    }

    fn service(transport: &Arc<FakeTransport>) -> SyncService {
        SyncService::new(transport.clone(), SyncConfig::default())
    }

    fn record(service: &SyncService) -> Arc<Mutex<Vec<SyncStatus>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        service.on_status_change(move |event| sink.lock().unwrap().push(event.status));
        events
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_sends_last_snapshot() {
        let transport = Arc::new(FakeTransport::default());
        let service = service(&transport);

        service.schedule_push(snapshot_with("A"));
        tokio::time::sleep(ms(500)).await;
        service.schedule_push(snapshot_with("B"));
        tokio::time::sleep(ms(500)).await;
        let last = snapshot_with("C");
        service.schedule_push(last.clone());

        tokio::time::sleep(ms(1900)).await;
        assert!(transport.pushed().is_empty());
        assert!(service.has_pending_push());

        tokio::time::sleep(ms(200)).await;
        assert_eq!(transport.pushed(), vec![last]);
        assert!(!service.has_pending_push());
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_while_in_flight_is_dropped() {
        let transport = FakeTransport::slow(ms(1000));
        let service = service(&transport);
        let first = snapshot_with("A");
        let other = snapshot_with("B");

        let (started, second) = tokio::join!(service.push(&first), service.push(&other));

        assert!(started);
        assert!(!second);
        assert_eq!(transport.pushed(), vec![first]);
        assert!(!service.is_push_in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_during_push_keeps_in_flight_request() {
        let transport = FakeTransport::slow(ms(1000));
        let service = service(&transport);
        let a = snapshot_with("A");
        let b = snapshot_with("B");

        service.schedule_push(a.clone());
        tokio::time::sleep(ms(2100)).await;
        assert!(service.is_push_in_flight());

        service.schedule_push(b.clone());
        tokio::time::sleep(ms(3500)).await;

        assert_eq!(transport.pushed(), vec![a, b]);
        assert_eq!(transport.completed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_reverts_to_idle() {
        let transport = Arc::new(FakeTransport::default());
        let service = service(&transport);
        let events = record(&service);

        assert!(service.push(&snapshot_with("A")).await);
        let status = service.status();
        assert_eq!(status.status, SyncStatus::Success);
        assert_eq!(status.message.as_deref(), Some(PUSH_SUCCESS_MESSAGE));

        tokio::time::sleep(ms(2900)).await;
        assert_eq!(service.status().status, SyncStatus::Success);

        tokio::time::sleep(ms(200)).await;
        assert_eq!(service.status(), StatusEvent::default());
        assert_eq!(
            *events.lock().unwrap(),
            vec![SyncStatus::Syncing, SyncStatus::Success, SyncStatus::Idle]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_success_restarts_revert() {
        let transport = Arc::new(FakeTransport::default());
        let service = service(&transport);

        assert!(service.push(&snapshot_with("A")).await);
        tokio::time::sleep(ms(2000)).await;
        assert!(service.push(&snapshot_with("B")).await);

        tokio::time::sleep(ms(1500)).await;
        assert_eq!(service.status().status, SyncStatus::Success);

        tokio::time::sleep(ms(2000)).await;
        assert_eq!(service.status().status, SyncStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_persists_until_next_attempt() {
        let transport = Arc::new(FakeTransport::default());
        transport.fail.store(true, Ordering::SeqCst);
        let service = service(&transport);

        assert!(!service.push(&snapshot_with("A")).await);
        tokio::time::sleep(ms(10_000)).await;

        let status = service.status();
        assert_eq!(status.status, SyncStatus::Error);
        assert_eq!(status.message.as_deref(), Some(PUSH_FAILURE_MESSAGE));

        transport.fail.store(false, Ordering::SeqCst);
        assert!(service.push(&snapshot_with("A")).await);
        assert_eq!(service.status().status, SyncStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pull() {
        let transport = Arc::new(FakeTransport::default());
        let remote = snapshot_with("Remote");
        *transport.remote.lock().unwrap() = remote.clone();
        let service = service(&transport);

        assert_eq!(service.pull().await, Some(remote));
        assert_eq!(
            service.status().message.as_deref(),
            Some(PULL_SUCCESS_MESSAGE)
        );

        transport.fail.store(true, Ordering::SeqCst);
        assert_eq!(service.pull().await, None);
        let status = service.status();
        assert_eq!(status.status, SyncStatus::Error);
        assert_eq!(status.message.as_deref(), Some(PULL_FAILURE_MESSAGE));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe() {
        let transport = Arc::new(FakeTransport::default());
        let service = service(&transport);

        let removed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&removed);
        let subscription = service.on_status_change(move |e| sink.lock().unwrap().push(e.status));
        let kept = record(&service);

        subscription.unsubscribe();
        service.push(&snapshot_with("A")).await;

        assert!(removed.lock().unwrap().is_empty());
        assert_eq!(kept.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_pending_push() {
        let transport = Arc::new(FakeTransport::default());
        let service = service(&transport);

        assert!(!service.cancel_pending_push());
        service.schedule_push(snapshot_with("A"));
        assert!(service.cancel_pending_push());

        tokio::time::sleep(ms(5000)).await;
        assert!(transport.pushed().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose() {
        let transport = Arc::new(FakeTransport::default());
        let service = service(&transport);
        let events = record(&service);

        service.schedule_push(snapshot_with("A"));
        service.dispose();
        service.schedule_push(snapshot_with("B"));
        tokio::time::sleep(ms(5000)).await;

        assert!(transport.pushed().is_empty());
        assert!(!service.has_pending_push());

        // Listeners are gone, explicit pushes still work
        assert!(service.push(&snapshot_with("C")).await);
        assert!(events.lock().unwrap().is_empty());
        tokio::time::sleep(ms(5000)).await;
        assert_eq!(service.status().status, SyncStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_independent_instances() {
        let transport = FakeTransport::slow(ms(1000));
        let first = service(&transport);
        let second = service(&transport);

        let a_snapshot = snapshot_with("A");
        let b_snapshot = snapshot_with("B");

        let (a, b) = tokio::join!(first.push(&a_snapshot), second.push(&b_snapshot));
        assert!(a && b);
        assert_eq!(transport.pushed().len(), 2);
    }
}
