//! # codetrack-sync
//!
//! Client-side synchronization engine for the codetrack dashboard.
//!
//! - [`SyncStore`]: latest [`Snapshot`](codetrack_core::Snapshot) per domain
//!   with subscriber fan-out
//! - [`LocalChangeBus`]: in-process "data changed" notifications
//! - [`PollingController`]: per-domain refresh timers with coalesced
//!   on-demand refreshes
//! - [`spawn_external_bridge`]: republishes changes from other execution
//!   contexts on the bus
//!
//! ## Example
//!
//! ```ignore
//! let store = SyncStore::new();
//! let polling = PollingController::new(store.clone(), Duration::from_secs(30));
//! store.subscribe::<User, _>(SubscriberToken::new(), |snapshot| {
//!     println!("{} users", snapshot.len());
//! });
//! polling.start_polling::<User>(Duration::from_secs(10), fetch_users)?;
//! ```

#![forbid(unsafe_code)]

pub mod bus;
pub mod external;
mod listener;
pub mod polling;
pub mod record;
pub mod store;
pub mod tasks;

pub use bus::{BusSubscription, ChangeKind, LocalChangeBus};
pub use external::{spawn_external_bridge, BroadcastChangeSource};
pub use polling::{fetch_fn, DomainStatus, FetchFn, PollState, PollingController};
pub use record::SyncRecord;
pub use store::{SubscriberToken, SyncStore};
pub use tasks::TaskRegistry;
