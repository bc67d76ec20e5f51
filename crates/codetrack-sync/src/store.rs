//! Snapshot store
//!
//! [`SyncStore`] caches the latest [`Snapshot`] of every domain and fans new
//! snapshots out to registered subscribers.
//!
//! # Consistency
//!
//! - A snapshot is replaced in a single assignment, then subscribers are
//!   notified with it (replace-then-notify).
//! - Writers of one domain are serialized by a per-domain gate held across
//!   the fan-out, so notifications for two successive writes never
//!   interleave. The gate is re-entrant: a subscriber may write the same
//!   domain again from its callback on the same thread.
//! - Fan-out runs in registration order. A subscriber removed mid fan-out is
//!   not called afterwards; a panicking subscriber is logged and skipped.
//!
//! Locks are never held across an `.await`; every operation here is
//! synchronous.

use indexmap::IndexMap;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use codetrack_core::records::{Announcement, Notification, PlatformStat, TeacherRecord, User};
use codetrack_core::{Domain, Snapshot};

use crate::listener::call_contained;
use crate::record::SyncRecord;

/// Identifies one subscriber within a domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriberToken(String);

impl SubscriberToken {
    /// Fresh random token.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Token with a caller-chosen name, for components that re-register
    /// under a stable identity.
    pub fn named(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SubscriberToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

type Callback<T> = Arc<dyn Fn(&Snapshot<T>) + Send + Sync>;

/// Cached snapshot and subscribers of one domain.
pub struct DomainCell<T> {
    /// Serializes replace-then-notify per domain
    gate: ReentrantMutex<()>,
    current: RwLock<Snapshot<T>>,
    subscribers: Mutex<IndexMap<SubscriberToken, Callback<T>>>,
}

impl<T: SyncRecord> DomainCell<T> {
    fn new() -> Self {
        Self {
            gate: ReentrantMutex::new(()),
            current: RwLock::new(Snapshot::empty()),
            subscribers: Mutex::new(IndexMap::new()),
        }
    }

    fn snapshot(&self) -> Snapshot<T> {
        self.current.read().clone()
    }

    fn subscribe(&self, token: SubscriberToken, callback: Callback<T>) -> bool {
        // IndexMap::insert keeps the original position for a known key.
        self.subscribers.lock().insert(token, callback).is_some()
    }

    fn unsubscribe(&self, token: &SubscriberToken) -> bool {
        self.subscribers.lock().shift_remove(token).is_some()
    }

    fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    fn version(&self) -> u64 {
        self.current.read().version()
    }

    fn replace(&self, items: Vec<T>) -> (Snapshot<T>, usize) {
        let _gate = self.gate.lock();

        let snapshot = {
            let mut current = self.current.write();
            let next = Snapshot::new(current.version() + 1, items);
            *current = next.clone();
            next
        };

        let tokens: Vec<SubscriberToken> = self.subscribers.lock().keys().cloned().collect();
        let mut failures = 0;
        for token in tokens {
            if self.current.read().version() != snapshot.version() {
                // A subscriber wrote this domain again; that nested write
                // already notified everyone with the newer snapshot.
                break;
            }
            // Look the callback up again so a subscriber removed by an
            // earlier callback is not invoked.
            let callback = self.subscribers.lock().get(&token).cloned();
            let Some(callback) = callback else {
                continue;
            };
            if let Err(error) = call_contained(|| callback(&snapshot)) {
                failures += 1;
                tracing::warn!(
                    domain = %T::DOMAIN,
                    subscriber = %token,
                    %error,
                    "Subscriber failed during snapshot notification"
                );
            }
        }

        (snapshot, failures)
    }
}

#[doc(hidden)]
pub struct StoreCells {
    pub(crate) users: DomainCell<User>,
    pub(crate) platform_stats: DomainCell<PlatformStat>,
    pub(crate) teacher_records: DomainCell<TeacherRecord>,
    pub(crate) notifications: DomainCell<Notification>,
    pub(crate) announcements: DomainCell<Announcement>,
}

impl StoreCells {
    fn new() -> Self {
        Self {
            users: DomainCell::new(),
            platform_stats: DomainCell::new(),
            teacher_records: DomainCell::new(),
            notifications: DomainCell::new(),
            announcements: DomainCell::new(),
        }
    }
}

/// Dispatch an untyped domain to its typed cell.
macro_rules! with_cell {
    ($cells:expr, $domain:expr, |$cell:ident| $body:expr) => {
        match $domain {
            Domain::Users => {
                let $cell = &$cells.users;
                $body
            }
            Domain::PlatformStats => {
                let $cell = &$cells.platform_stats;
                $body
            }
            Domain::TeacherRecords => {
                let $cell = &$cells.teacher_records;
                $body
            }
            Domain::Notifications => {
                let $cell = &$cells.notifications;
                $body
            }
            Domain::Announcements => {
                let $cell = &$cells.announcements;
                $body
            }
        }
    };
}

struct StoreInner {
    cells: StoreCells,
    listener_failures: AtomicU64,
}

/// In-memory cache of the latest snapshot of each domain.
///
/// Explicitly constructed and shared by cloning; every clone sees the same
/// cells. The application root owns its lifetime.
#[derive(Clone)]
pub struct SyncStore {
    inner: Arc<StoreInner>,
}

impl SyncStore {
    /// Create a store with every domain empty.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                cells: StoreCells::new(),
                listener_failures: AtomicU64::new(0),
            }),
        }
    }

    /// Latest cached snapshot of `T`'s domain; empty before the first fetch.
    pub fn snapshot<T: SyncRecord>(&self) -> Snapshot<T> {
        T::cell(&self.inner.cells).snapshot()
    }

    /// Replace `T`'s snapshot with `items` and notify its subscribers.
    ///
    /// Returns the snapshot that was stored and delivered.
    pub fn set_snapshot<T: SyncRecord>(&self, items: Vec<T>) -> Snapshot<T> {
        let (snapshot, failures) = T::cell(&self.inner.cells).replace(items);
        if failures > 0 {
            self.inner
                .listener_failures
                .fetch_add(failures as u64, Ordering::Relaxed);
        }
        tracing::trace!(
            domain = %T::DOMAIN,
            version = snapshot.version(),
            items = snapshot.len(),
            "Snapshot replaced"
        );
        snapshot
    }

    /// Register `callback` for `T`'s domain under `token`.
    ///
    /// Registering a token that is already present replaces its callback and
    /// keeps its place in the notification order.
    pub fn subscribe<T, F>(&self, token: SubscriberToken, callback: F)
    where
        T: SyncRecord,
        F: Fn(&Snapshot<T>) + Send + Sync + 'static,
    {
        let replaced = T::cell(&self.inner.cells).subscribe(token.clone(), Arc::new(callback));
        tracing::trace!(domain = %T::DOMAIN, subscriber = %token, replaced, "Subscriber registered");
    }

    /// Remove `token` from `domain`. Unknown tokens are a no-op.
    ///
    /// Returns whether a subscriber was removed.
    pub fn unsubscribe(&self, domain: Domain, token: &SubscriberToken) -> bool {
        with_cell!(self.inner.cells, domain, |cell| cell.unsubscribe(token))
    }

    /// Number of subscribers registered for `domain`.
    pub fn subscriber_count(&self, domain: Domain) -> usize {
        with_cell!(self.inner.cells, domain, |cell| cell.subscriber_count())
    }

    /// Current snapshot version of `domain`; 0 before the first fetch.
    pub fn version(&self, domain: Domain) -> u64 {
        with_cell!(self.inner.cells, domain, |cell| cell.version())
    }

    /// Subscriber callbacks that panicked since the store was created.
    pub fn listener_failures(&self) -> u64 {
        self.inner.listener_failures.load(Ordering::Relaxed)
    }
}

impl Default for SyncStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SyncStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("SyncStore");
        for domain in Domain::ALL {
            debug.field(domain.as_str(), &self.version(domain));
        }
        debug.finish()
    }
}
