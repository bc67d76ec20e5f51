//! # codetrack-app
//!
//! Headless core of the codetrack dashboard. An [`AppCore`] wires the
//! synchronization engine from `codetrack-sync` to a [`RemoteService`]
//! and exposes one view binding per domain:
//!
//! ```text
//! ViewBinding::current_snapshot ──> SyncStore (cached, maybe stale)
//! PollingController ──fetch──> RemoteService ──> SyncStore::set_snapshot ──> subscribers
//! ViewBinding::mutate ──> RemoteService ──> LocalChangeBus ──> invalidation worker ──> refresh
//! other tab ──> ExternalChangeSource ──> LocalChangeBus
//! ```
//!
//! [`storage`] provides the in-process data service used by the host binary
//! and the tests.
//!
//! [`RemoteService`]: codetrack_core::RemoteService

#![forbid(unsafe_code)]

mod core;
pub mod logging;
pub mod session;
pub mod storage;
pub mod views;

pub use crate::core::AppCore;
pub use session::Session;
pub use storage::{Dataset, LocalStorageRemote, SharedStorage, StorageChange};
pub use views::{
    AnnouncementsView, NotificationsView, PlatformStatsView, PracticeTotals, RoleCounts,
    TeacherRecordsView, UsersView, ViewBinding, ViewSubscription,
};
