//! # AppCore
//!
//! Owns one tab's engine: the store, bus, polling controller, session and a
//! view binding per domain. Nothing here is global; dropping the core stops
//! its timers and background tasks.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use codetrack_core::records::{Announcement, Notification, PlatformStat, TeacherRecord, User};
use codetrack_core::{Domain, EngineConfig, ExternalChangeSource, RemoteService, SyncResult};
use codetrack_sync::{
    spawn_external_bridge, BusSubscription, ChangeKind, LocalChangeBus, PollingController,
    SyncStore, TaskRegistry,
};

use crate::session::Session;
use crate::storage::{LocalStorageRemote, SharedStorage};
use crate::views::{
    AnnouncementsView, NotificationsView, PlatformStatsView, TeacherRecordsView, UsersView,
    ViewBinding,
};

/// The five domain bindings, dispatchable by [`Domain`].
#[derive(Clone, Debug)]
struct DomainViews {
    users: UsersView,
    platform_stats: PlatformStatsView,
    teacher_records: TeacherRecordsView,
    notifications: NotificationsView,
    announcements: AnnouncementsView,
}

impl DomainViews {
    fn schedule_refresh(&self, domain: Domain) {
        match domain {
            Domain::Users => self.users.schedule_refresh(),
            Domain::PlatformStats => self.platform_stats.schedule_refresh(),
            Domain::TeacherRecords => self.teacher_records.schedule_refresh(),
            Domain::Notifications => self.notifications.schedule_refresh(),
            Domain::Announcements => self.announcements.schedule_refresh(),
        }
    }

    fn start_polling(&self, config: &EngineConfig) -> SyncResult<()> {
        self.users.start_polling(config.interval(Domain::Users))?;
        self.platform_stats
            .start_polling(config.interval(Domain::PlatformStats))?;
        self.teacher_records
            .start_polling(config.interval(Domain::TeacherRecords))?;
        self.notifications
            .start_polling(config.interval(Domain::Notifications))?;
        self.announcements
            .start_polling(config.interval(Domain::Announcements))
    }
}

/// Drop every owner-scoped snapshot; they belonged to the previous identity.
fn clear_owner_scoped(store: &SyncStore) {
    store.set_snapshot::<PlatformStat>(Vec::new());
    store.set_snapshot::<TeacherRecord>(Vec::new());
    store.set_snapshot::<Notification>(Vec::new());
}

/// Clear owner-scoped snapshots synchronously whenever the signed-in
/// identity changes, sign-out and user switches alike.
fn watch_identity(bus: &LocalChangeBus, session: &Session, store: &SyncStore) -> BusSubscription {
    let last = Mutex::new(session.user_id());
    let session = session.clone();
    let store = store.clone();
    bus.subscribe(ChangeKind::Session, move |_: ChangeKind| {
        let current = session.user_id();
        let mut last = last.lock();
        if *last != current {
            tracing::debug!(from = ?*last, to = ?current, "Identity changed; clearing owner-scoped snapshots");
            *last = current;
            clear_owner_scoped(&store);
        }
    })
}

/// Turn bus events into coalesced refreshes.
async fn run_invalidations(
    mut events: mpsc::UnboundedReceiver<ChangeKind>,
    views: DomainViews,
    session: Session,
) {
    while let Some(first) = events.recv().await {
        let mut batch = vec![first];
        while let Ok(next) = events.try_recv() {
            if !batch.contains(&next) {
                batch.push(next);
            }
        }

        for kind in batch {
            match kind {
                ChangeKind::Data(domain) => {
                    tracing::debug!(domain = %domain, "Invalidated; scheduling refresh");
                    views.schedule_refresh(domain);
                }
                ChangeKind::Session if session.is_signed_in() => {
                    for domain in Domain::ALL.into_iter().filter(Domain::is_owner_scoped) {
                        views.schedule_refresh(domain);
                    }
                }
                ChangeKind::Session => {
                    tracing::debug!("Signed out; nothing to refresh");
                }
            }
        }
    }
}

/// Headless dashboard core for one tab.
pub struct AppCore {
    config: EngineConfig,
    store: SyncStore,
    bus: LocalChangeBus,
    polling: PollingController,
    session: Session,
    tasks: TaskRegistry,
    views: DomainViews,
    _identity_watch: BusSubscription,
    listeners: Mutex<Vec<BusSubscription>>,
    pending_source: Mutex<Option<Box<dyn ExternalChangeSource>>>,
    started: AtomicBool,
}

impl AppCore {
    /// Build a core talking to `remote`. Nothing runs until [`start`](Self::start).
    pub fn new(config: EngineConfig, remote: Arc<dyn RemoteService>) -> SyncResult<Self> {
        config.validate()?;

        let store = SyncStore::new();
        let bus = LocalChangeBus::new();
        let polling = PollingController::new(store.clone(), config.fetch_timeout());
        let session = Session::new(bus.clone());

        let views = DomainViews {
            users: ViewBinding::<User>::new(
                store.clone(),
                polling.clone(),
                bus.clone(),
                session.clone(),
                remote.clone(),
            ),
            platform_stats: ViewBinding::<PlatformStat>::new(
                store.clone(),
                polling.clone(),
                bus.clone(),
                session.clone(),
                remote.clone(),
            ),
            teacher_records: ViewBinding::<TeacherRecord>::new(
                store.clone(),
                polling.clone(),
                bus.clone(),
                session.clone(),
                remote.clone(),
            ),
            notifications: ViewBinding::<Notification>::new(
                store.clone(),
                polling.clone(),
                bus.clone(),
                session.clone(),
                remote.clone(),
            ),
            announcements: ViewBinding::<Announcement>::new(
                store.clone(),
                polling.clone(),
                bus.clone(),
                session.clone(),
                remote,
            ),
        };

        let identity_watch = watch_identity(&bus, &session, &store);

        Ok(Self {
            config,
            store,
            bus,
            polling,
            session,
            tasks: TaskRegistry::new(),
            views,
            _identity_watch: identity_watch,
            listeners: Mutex::new(Vec::new()),
            pending_source: Mutex::new(None),
            started: AtomicBool::new(false),
        })
    }

    /// Build a core for one tab over `storage`.
    ///
    /// Writes made by other tabs of the same storage are bridged onto this
    /// core's bus once it starts.
    pub fn with_local_storage(config: EngineConfig, storage: &SharedStorage) -> SyncResult<Self> {
        let remote = LocalStorageRemote::new(storage.clone());
        let source = remote.change_source();
        let core = Self::new(config, Arc::new(remote))?;
        *core.pending_source.lock() = Some(source);
        Ok(core)
    }

    /// Start the invalidation worker, every domain's poller, and any pending
    /// external change bridge. Must be called from within a Tokio runtime.
    ///
    /// Returns `false` if the core was already started.
    pub fn start(&self) -> bool {
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::debug!("AppCore already started");
            return false;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut listeners = self.listeners.lock();
            let kinds = Domain::ALL
                .into_iter()
                .map(ChangeKind::Data)
                .chain(std::iter::once(ChangeKind::Session));
            for kind in kinds {
                let tx = tx.clone();
                listeners.push(self.bus.subscribe(kind, move |kind| {
                    // Closed only after shutdown.
                    let _ = tx.send(kind);
                }));
            }
        }
        self.tasks.spawn_cancellable(
            "invalidation-worker",
            run_invalidations(rx, self.views.clone(), self.session.clone()),
        );

        if let Some(source) = self.pending_source.lock().take() {
            spawn_external_bridge(source, self.bus.clone(), &self.tasks);
        }

        // Intervals were validated in `new`.
        if let Err(error) = self.views.start_polling(&self.config) {
            tracing::error!(%error, "Polling not started");
        }
        tracing::info!(fetch_timeout_ms = self.config.fetch_timeout_ms, "AppCore started");
        true
    }

    /// Bridge changes from another execution context onto the bus.
    pub fn attach_external_changes(&self, source: Box<dyn ExternalChangeSource>) {
        spawn_external_bridge(source, self.bus.clone(), &self.tasks);
    }

    /// Stop every timer, background task and bus listener. Idempotent.
    pub fn shutdown(&self) {
        self.polling.shutdown();
        self.tasks.shutdown();
        self.listeners.lock().clear();
        tracing::debug!("AppCore shut down");
    }

    /// Users binding.
    pub fn users(&self) -> &UsersView {
        &self.views.users
    }

    /// Platform statistics binding.
    pub fn platform_stats(&self) -> &PlatformStatsView {
        &self.views.platform_stats
    }

    /// Teacher records binding.
    pub fn teacher_records(&self) -> &TeacherRecordsView {
        &self.views.teacher_records
    }

    /// Notifications binding.
    pub fn notifications(&self) -> &NotificationsView {
        &self.views.notifications
    }

    /// Announcements binding.
    pub fn announcements(&self) -> &AnnouncementsView {
        &self.views.announcements
    }

    /// Signed-in identity.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Snapshot store.
    pub fn store(&self) -> &SyncStore {
        &self.store
    }

    /// Change bus.
    pub fn bus(&self) -> &LocalChangeBus {
        &self.bus
    }

    /// Polling controller.
    pub fn polling(&self) -> &PollingController {
        &self.polling
    }

    /// Configuration the core was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl Drop for AppCore {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for AppCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppCore")
            .field("session", &self.session)
            .field("store", &self.store)
            .field("polling", &self.polling)
            .field("started", &self.started.load(Ordering::Relaxed))
            .finish()
    }
}
