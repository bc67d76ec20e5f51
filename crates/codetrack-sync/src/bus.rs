//! Local change bus
//!
//! Process-wide publish/subscribe for "data changed" events. Same-context
//! writes and signals bridged from other contexts (see
//! [`external`](crate::external)) go through the same [`LocalChangeBus::publish`],
//! so listeners cannot tell where a change originated.

use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use codetrack_core::Domain;

use crate::listener::call_contained;

/// Kind of change announced on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// Backing data of a domain changed; its snapshot should be refreshed
    Data(Domain),
    /// The signed-in identity changed
    Session,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data(domain) => write!(f, "data:{domain}"),
            Self::Session => f.write_str("session"),
        }
    }
}

type Listener = Arc<dyn Fn(ChangeKind) + Send + Sync>;

#[derive(Default)]
struct BusInner {
    listeners: Mutex<HashMap<ChangeKind, IndexMap<u64, Listener>>>,
    next_id: AtomicU64,
}

impl BusInner {
    fn remove(&self, kind: ChangeKind, id: u64) -> bool {
        let mut listeners = self.listeners.lock();
        let Some(entries) = listeners.get_mut(&kind) else {
            return false;
        };
        let removed = entries.shift_remove(&id).is_some();
        if entries.is_empty() {
            listeners.remove(&kind);
        }
        removed
    }

    fn listener(&self, kind: ChangeKind, id: u64) -> Option<Listener> {
        self.listeners
            .lock()
            .get(&kind)
            .and_then(|entries| entries.get(&id).cloned())
    }
}

/// Synchronous publish/subscribe channel for [`ChangeKind`] events.
#[derive(Clone, Default)]
pub struct LocalChangeBus {
    inner: Arc<BusInner>,
}

impl LocalChangeBus {
    /// Create a bus with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `kind` to every listener registered for it, in registration
    /// order.
    ///
    /// A panicking listener is logged and skipped. Returns how many listeners
    /// completed.
    pub fn publish(&self, kind: ChangeKind) -> usize {
        let ids: Vec<u64> = self
            .inner
            .listeners
            .lock()
            .get(&kind)
            .map(|entries| entries.keys().copied().collect())
            .unwrap_or_default();

        let mut delivered = 0;
        for id in ids {
            let Some(listener) = self.inner.listener(kind, id) else {
                continue;
            };
            match call_contained(|| listener(kind)) {
                Ok(()) => delivered += 1,
                Err(error) => {
                    tracing::warn!(event = %kind, listener = id, %error, "Change listener failed");
                }
            }
        }
        tracing::trace!(event = %kind, delivered, "Change published");
        delivered
    }

    /// Register `listener` for `kind`.
    ///
    /// The returned [`BusSubscription`] removes exactly this listener when
    /// disposed or dropped.
    pub fn subscribe<F>(&self, kind: ChangeKind, listener: F) -> BusSubscription
    where
        F: Fn(ChangeKind) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .lock()
            .entry(kind)
            .or_default()
            .insert(id, Arc::new(listener));
        BusSubscription {
            bus: Arc::downgrade(&self.inner),
            kind,
            id,
            active: true,
        }
    }

    /// Number of listeners registered for `kind`.
    pub fn listener_count(&self, kind: ChangeKind) -> usize {
        self.inner
            .listeners
            .lock()
            .get(&kind)
            .map_or(0, IndexMap::len)
    }
}

impl fmt::Debug for LocalChangeBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds = self.inner.listeners.lock().len();
        f.debug_struct("LocalChangeBus")
            .field("kinds", &kinds)
            .finish()
    }
}

/// Disposer for one bus listener.
#[must_use = "dropping a BusSubscription removes the listener"]
pub struct BusSubscription {
    bus: Weak<BusInner>,
    kind: ChangeKind,
    id: u64,
    active: bool,
}

impl BusSubscription {
    /// Event kind the listener is registered for.
    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    /// Remove the listener now.
    pub fn dispose(mut self) {
        self.remove();
    }

    /// Keep the listener registered for the lifetime of the bus.
    pub fn detach(mut self) {
        self.active = false;
    }

    fn remove(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.kind, self.id);
        }
    }
}

impl Drop for BusSubscription {
    fn drop(&mut self) {
        self.remove();
    }
}

impl fmt::Debug for BusSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusSubscription")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> (Arc<AtomicU64>, impl Fn(ChangeKind) + Send + Sync + 'static) {
        let count = Arc::new(AtomicU64::new(0));
        let inner = count.clone();
        (count, move |_: ChangeKind| {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn delivers_only_matching_kind() {
        let bus = LocalChangeBus::new();
        let (users, on_users) = counter();
        let (session, on_session) = counter();
        let _a = bus.subscribe(ChangeKind::Data(Domain::Users), on_users);
        let _b = bus.subscribe(ChangeKind::Session, on_session);

        assert_eq!(bus.publish(ChangeKind::Data(Domain::Users)), 1);
        assert_eq!(bus.publish(ChangeKind::Data(Domain::Notifications)), 0);

        assert_eq!(users.load(Ordering::SeqCst), 1);
        assert_eq!(session.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dispose_removes_exactly_one_listener() {
        let bus = LocalChangeBus::new();
        let kind = ChangeKind::Data(Domain::Users);
        let (first, on_first) = counter();
        let (second, on_second) = counter();
        let first_sub = bus.subscribe(kind, on_first);
        let _second_sub = bus.subscribe(kind, on_second);

        first_sub.dispose();
        bus.publish(kind);

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count(kind), 1);
    }

    #[test]
    fn drop_removes_listener_and_detach_keeps_it() {
        let bus = LocalChangeBus::new();
        let (count, on_change) = counter();
        drop(bus.subscribe(ChangeKind::Session, on_change));
        assert_eq!(bus.publish(ChangeKind::Session), 0);

        let (kept, on_kept) = counter();
        bus.subscribe(ChangeKind::Session, on_kept).detach();
        assert_eq!(bus.publish(ChangeKind::Session), 1);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(kept.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failing_listener_is_contained() {
        let bus = LocalChangeBus::new();
        let kind = ChangeKind::Data(Domain::Announcements);
        let _bad = bus.subscribe(kind, |_| panic!("listener bug"));
        let (count, on_change) = counter();
        let _good = bus.subscribe(kind, on_change);

        assert_eq!(bus.publish(kind), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscription_outliving_bus_is_harmless() {
        let bus = LocalChangeBus::new();
        let sub = bus.subscribe(ChangeKind::Session, |_| {});
        drop(bus);
        sub.dispose();
    }
}
