//! Polling controller
//!
//! Keeps each domain's snapshot fresh by re-running a fetch function on a
//! timer, and exposes out-of-band refreshes that coalesce with whatever
//! fetch is already running.
//!
//! # Per-domain lifecycle
//!
//! ```text
//! Stopped --start_polling--> Polling(Idle) --tick--> Polling(Fetching) --done--> Polling(Idle)
//!    ^                                                                              |
//!    +--------------------------------- stop_polling -------------------------------+
//! ```
//!
//! # Guarantees
//!
//! - At most one fetch per domain is in flight. A refresh requested while one
//!   is pending joins it and resolves with the same result.
//! - Fetches run in their own task. Stopping a poller or dropping a caller's
//!   future never aborts a dispatched fetch; it still lands in the store.
//! - Every fetch is bounded by the configured timeout, so the in-flight
//!   marker cannot outlive a remote that never answers.
//! - A failed fetch leaves the cached snapshot untouched and never stops the
//!   timer.

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use chrono::{DateTime, Utc};
use codetrack_core::records::{Announcement, Notification, PlatformStat, TeacherRecord, User};
use codetrack_core::{Domain, Snapshot, SyncError, SyncResult};

use crate::record::SyncRecord;
use crate::store::SyncStore;

/// Produces the full contents of one domain.
pub type FetchFn<T> = Arc<dyn Fn() -> BoxFuture<'static, SyncResult<Vec<T>>> + Send + Sync>;

/// Wrap an async closure as a [`FetchFn`].
pub fn fetch_fn<T, F, Fut>(fetch: F) -> FetchFn<T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = SyncResult<Vec<T>>> + Send + 'static,
{
    Arc::new(move || fetch().boxed())
}

type SharedFetch<T> = Shared<BoxFuture<'static, SyncResult<Snapshot<T>>>>;

/// Polling state of a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// No timer running
    Stopped,
    /// Timer running, no fetch outstanding
    Idle,
    /// Timer running and a fetch is outstanding
    Fetching,
}

/// Refresh bookkeeping for one domain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainStatus {
    /// Fetches started
    pub fetches: u64,
    /// Fetches that failed since the last success
    pub consecutive_failures: u32,
    /// Most recent failure, cleared by the next success
    pub last_error: Option<SyncError>,
    /// Completion time of the most recent successful fetch
    pub last_success: Option<DateTime<Utc>>,
}

struct SlotState<T> {
    pending: Option<SharedFetch<T>>,
    /// Another fetch must run once the pending one completes
    rerun: bool,
}

/// In-flight marker of one domain.
pub struct InFlightSlot<T> {
    state: Mutex<SlotState<T>>,
}

impl<T> InFlightSlot<T> {
    fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                pending: None,
                rerun: false,
            }),
        }
    }

    fn is_pending(&self) -> bool {
        self.state.lock().pending.is_some()
    }
}

/// In-flight slots of every domain.
#[doc(hidden)]
pub struct InFlightTable {
    pub(crate) users: InFlightSlot<User>,
    pub(crate) platform_stats: InFlightSlot<PlatformStat>,
    pub(crate) teacher_records: InFlightSlot<TeacherRecord>,
    pub(crate) notifications: InFlightSlot<Notification>,
    pub(crate) announcements: InFlightSlot<Announcement>,
}

impl InFlightTable {
    fn new() -> Self {
        Self {
            users: InFlightSlot::new(),
            platform_stats: InFlightSlot::new(),
            teacher_records: InFlightSlot::new(),
            notifications: InFlightSlot::new(),
            announcements: InFlightSlot::new(),
        }
    }

    fn is_pending(&self, domain: Domain) -> bool {
        match domain {
            Domain::Users => self.users.is_pending(),
            Domain::PlatformStats => self.platform_stats.is_pending(),
            Domain::TeacherRecords => self.teacher_records.is_pending(),
            Domain::Notifications => self.notifications.is_pending(),
            Domain::Announcements => self.announcements.is_pending(),
        }
    }
}

/// Clears the in-flight marker when a fetch task panics or is aborted, so
/// later refreshes start a new fetch instead of joining a dead one.
struct ReleaseOnUnwind<'a, T> {
    slot: &'a InFlightSlot<T>,
    armed: bool,
}

impl<T> Drop for ReleaseOnUnwind<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.slot.state.lock();
            state.pending = None;
            state.rerun = false;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Fetch core (shared with spawned fetch and poll tasks)
// ─────────────────────────────────────────────────────────────────────────────

struct FetchCore {
    store: SyncStore,
    in_flight: InFlightTable,
    status: Mutex<HashMap<Domain, DomainStatus>>,
    fetch_timeout: Duration,
}

impl FetchCore {
    /// Join the pending fetch of `T`'s domain or start a new one.
    ///
    /// With `rerun_if_busy`, joining also schedules one more fetch after the
    /// pending one so the caller observes data read after its request.
    fn join_or_start<T: SyncRecord>(
        self: &Arc<Self>,
        fetch: FetchFn<T>,
        rerun_if_busy: bool,
    ) -> SharedFetch<T> {
        let slot = T::in_flight(&self.in_flight);
        // Held while spawning so the task cannot clear the slot before the
        // pending future is recorded.
        let mut state = slot.state.lock();
        if let Some(pending) = state.pending.clone() {
            if rerun_if_busy {
                state.rerun = true;
            }
            tracing::debug!(domain = %T::DOMAIN, rerun = state.rerun, "Joining in-flight fetch");
            return pending;
        }

        let core = self.clone();
        let handle = tokio::spawn(async move { core.run_fetch::<T>(fetch).await });
        let shared = async move {
            handle.await.unwrap_or_else(|e| {
                Err(SyncError::internal(format!("fetch task failed: {e}")))
            })
        }
        .boxed()
        .shared();

        state.pending = Some(shared.clone());
        state.rerun = false;
        shared
    }

    async fn run_fetch<T: SyncRecord>(self: Arc<Self>, fetch: FetchFn<T>) -> SyncResult<Snapshot<T>> {
        let slot = T::in_flight(&self.in_flight);
        let mut release = ReleaseOnUnwind { slot, armed: true };
        loop {
            let result = self.fetch_once::<T>(&fetch).await;

            let mut state = slot.state.lock();
            if state.rerun {
                state.rerun = false;
                tracing::debug!(domain = %T::DOMAIN, "Running follow-up fetch");
                continue;
            }
            state.pending = None;
            release.armed = false;
            return result;
        }
    }

    async fn fetch_once<T: SyncRecord>(&self, fetch: &FetchFn<T>) -> SyncResult<Snapshot<T>> {
        let domain = T::DOMAIN;
        self.update_status(domain, |status| status.fetches += 1);

        let outcome = match tokio::time::timeout(self.fetch_timeout, fetch()).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout {
                domain,
                after_ms: u64::try_from(self.fetch_timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        };

        match outcome {
            Ok(items) => {
                let snapshot = self.store.set_snapshot::<T>(items);
                self.update_status(domain, |status| {
                    status.consecutive_failures = 0;
                    status.last_error = None;
                    status.last_success = snapshot.refreshed_at();
                });
                tracing::debug!(
                    domain = %domain,
                    version = snapshot.version(),
                    items = snapshot.len(),
                    "Refresh completed"
                );
                Ok(snapshot)
            }
            Err(error) => {
                self.update_status(domain, |status| {
                    status.consecutive_failures = status.consecutive_failures.saturating_add(1);
                    status.last_error = Some(error.clone());
                });
                Err(error)
            }
        }
    }

    fn update_status(&self, domain: Domain, update: impl FnOnce(&mut DomainStatus)) {
        update(self.status.lock().entry(domain).or_default());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Poll loop
// ─────────────────────────────────────────────────────────────────────────────

struct Poller {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
    interval: Duration,
}

impl Poller {
    fn stop(self) {
        self.shutdown_tx.send_replace(true);
        self.task.abort();
    }
}

async fn poll_loop<T: SyncRecord>(
    core: Arc<FetchCore>,
    interval: Duration,
    fetch: FetchFn<T>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let domain = T::DOMAIN;
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => break,
            _ = ticker.tick() => {}
        }

        if core.in_flight.is_pending(domain) {
            tracing::debug!(domain = %domain, "Tick skipped; fetch already in flight");
            continue;
        }

        let pending = core.join_or_start::<T>(fetch.clone(), false);
        tokio::select! {
            biased;
            // The fetch keeps running in its own task and still lands.
            _ = shutdown_rx.changed() => break,
            result = pending => match result {
                Ok(_) => {}
                Err(SyncError::NotAuthenticated) => {
                    tracing::debug!(domain = %domain, "Polling skipped; no signed-in identity");
                }
                Err(error) => {
                    tracing::warn!(domain = %domain, %error, "Polling refresh failed; keeping cached snapshot");
                }
            },
        }
    }
    tracing::debug!(domain = %domain, "Polling stopped");
}

// ─────────────────────────────────────────────────────────────────────────────
// Controller
// ─────────────────────────────────────────────────────────────────────────────

struct ControllerInner {
    core: Arc<FetchCore>,
    pollers: Mutex<HashMap<Domain, Poller>>,
}

impl Drop for ControllerInner {
    fn drop(&mut self) {
        for (_, poller) in self.pollers.get_mut().drain() {
            poller.stop();
        }
    }
}

/// Per-domain refresh timers with request coalescing.
///
/// Cloning shares the timers; the last clone dropped stops them.
#[derive(Clone)]
pub struct PollingController {
    inner: Arc<ControllerInner>,
}

impl PollingController {
    /// Create a controller writing into `store`, bounding each fetch by
    /// `fetch_timeout`.
    pub fn new(store: SyncStore, fetch_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                core: Arc::new(FetchCore {
                    store,
                    in_flight: InFlightTable::new(),
                    status: Mutex::new(HashMap::new()),
                    fetch_timeout,
                }),
                pollers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Store the controller writes into.
    pub fn store(&self) -> &SyncStore {
        &self.inner.core.store
    }

    /// Start refreshing `T`'s domain every `interval`, beginning immediately.
    ///
    /// A domain that is already polled has its timer replaced. A zero
    /// interval is rejected and leaves any running timer in place. Must be
    /// called from within a Tokio runtime.
    pub fn start_polling<T: SyncRecord>(&self, interval: Duration, fetch: FetchFn<T>) -> SyncResult<()> {
        let domain = T::DOMAIN;
        if interval.is_zero() {
            return Err(SyncError::config(format!(
                "polling interval for {domain} must be non-zero"
            )));
        }
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(poll_loop::<T>(
            self.inner.core.clone(),
            interval,
            fetch,
            shutdown_rx,
        ));
        let poller = Poller {
            shutdown_tx,
            task,
            interval,
        };

        let previous = self.inner.pollers.lock().insert(domain, poller);
        if let Some(previous) = previous {
            tracing::debug!(domain = %domain, "Replacing existing poller");
            previous.stop();
        }
        tracing::info!(
            domain = %domain,
            interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            "Polling started"
        );
        Ok(())
    }

    /// Stop the timer of `domain`.
    ///
    /// Safe to call repeatedly or for a domain never started. A fetch already
    /// dispatched still completes and updates the store, but no further tick
    /// is scheduled. Returns whether a timer was running.
    pub fn stop_polling(&self, domain: Domain) -> bool {
        let poller = self.inner.pollers.lock().remove(&domain);
        match poller {
            Some(poller) => {
                poller.stop();
                tracing::info!(domain = %domain, "Polling stopped");
                true
            }
            None => false,
        }
    }

    /// Stop every timer.
    pub fn shutdown(&self) {
        let pollers: Vec<(Domain, Poller)> = self.inner.pollers.lock().drain().collect();
        for (domain, poller) in pollers {
            poller.stop();
            tracing::debug!(domain = %domain, "Poller shut down");
        }
    }

    /// Fetch `T`'s domain now, or join the fetch already in flight.
    ///
    /// Callers that join resolve together with the same snapshot or error.
    pub async fn refresh_now<T: SyncRecord>(&self, fetch: FetchFn<T>) -> SyncResult<Snapshot<T>> {
        self.inner.core.join_or_start::<T>(fetch, false).await
    }

    /// Refresh after a write.
    ///
    /// Like [`refresh_now`](Self::refresh_now), except that when a fetch is
    /// already in flight (and may have read data from before the write) one
    /// follow-up fetch is queued behind it. Repeated requests while busy
    /// collapse into that single follow-up.
    pub async fn refresh_after_write<T: SyncRecord>(
        &self,
        fetch: FetchFn<T>,
    ) -> SyncResult<Snapshot<T>> {
        self.inner.core.join_or_start::<T>(fetch, true).await
    }

    /// Queue [`refresh_after_write`](Self::refresh_after_write) without waiting
    /// for it. Must be called from within a Tokio runtime.
    pub fn schedule_refresh<T: SyncRecord>(&self, fetch: FetchFn<T>) {
        let pending = self.inner.core.join_or_start::<T>(fetch, true);
        tokio::spawn(async move {
            if let Err(error) = pending.await {
                tracing::warn!(domain = %T::DOMAIN, %error, "Scheduled refresh failed");
            }
        });
    }

    /// Polling state of `domain`.
    pub fn state(&self, domain: Domain) -> PollState {
        if !self.inner.pollers.lock().contains_key(&domain) {
            PollState::Stopped
        } else if self.inner.core.in_flight.is_pending(domain) {
            PollState::Fetching
        } else {
            PollState::Idle
        }
    }

    /// Whether a fetch for `domain` is outstanding, polled or not.
    pub fn is_fetching(&self, domain: Domain) -> bool {
        self.inner.core.in_flight.is_pending(domain)
    }

    /// Interval of the running timer of `domain`.
    pub fn interval(&self, domain: Domain) -> Option<Duration> {
        self.inner.pollers.lock().get(&domain).map(|p| p.interval)
    }

    /// Refresh bookkeeping of `domain`.
    pub fn status(&self, domain: Domain) -> DomainStatus {
        self.inner
            .core
            .status
            .lock()
            .get(&domain)
            .cloned()
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for PollingController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let polled: Vec<Domain> = self.inner.pollers.lock().keys().copied().collect();
        f.debug_struct("PollingController")
            .field("polled", &polled)
            .field("fetch_timeout", &self.inner.core.fetch_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codetrack_core::records::Role;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_fetch(calls: Arc<AtomicUsize>) -> FetchFn<User> {
        fetch_fn(move || {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Ok((0..n)
                    .map(|i| User::new(format!("u{i}").as_str(), "User", Role::Student))
                    .collect())
            }
        })
    }

    #[tokio::test]
    async fn refresh_now_populates_store() {
        let store = SyncStore::new();
        let controller = PollingController::new(store.clone(), Duration::from_secs(5));
        let calls = Arc::new(AtomicUsize::new(0));

        let snapshot = controller
            .refresh_now(counting_fetch(calls.clone()))
            .await
            .unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.snapshot::<User>().version(), snapshot.version());
        assert!(!controller.is_fetching(Domain::Users));
        assert_eq!(controller.status(Domain::Users).fetches, 1);
    }

    #[tokio::test]
    async fn stop_polling_unknown_domain_is_noop() {
        let controller = PollingController::new(SyncStore::new(), Duration::from_secs(1));
        assert!(!controller.stop_polling(Domain::Announcements));
        assert!(!controller.stop_polling(Domain::Announcements));
        assert_eq!(controller.state(Domain::Announcements), PollState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_keeps_running_timer() {
        let controller = PollingController::new(SyncStore::new(), Duration::from_secs(1));
        let calls = Arc::new(AtomicUsize::new(0));
        controller
            .start_polling(Duration::from_secs(5), counting_fetch(calls.clone()))
            .unwrap();

        assert!(controller
            .start_polling(Duration::ZERO, counting_fetch(calls.clone()))
            .is_err());
        assert_eq!(controller.interval(Domain::Users), Some(Duration::from_secs(5)));
        controller.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_clears_in_flight_marker() {
        let store = SyncStore::new();
        let controller = PollingController::new(store.clone(), Duration::from_millis(50));
        let never: FetchFn<User> = fetch_fn(|| futures::future::pending());

        let result = controller.refresh_now(never).await;
        assert_eq!(
            result.err(),
            Some(SyncError::Timeout {
                domain: Domain::Users,
                after_ms: 50
            })
        );
        assert!(!controller.is_fetching(Domain::Users));
        assert_eq!(store.version(Domain::Users), 0);
        assert_eq!(controller.status(Domain::Users).consecutive_failures, 1);
    }
}
