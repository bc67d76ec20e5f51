//! # Local Storage
//!
//! In-process stand-in for the dashboard's data service: one
//! [`SharedStorage`] per process and one [`LocalStorageRemote`] per tab.

mod remote;
mod shared;

pub use remote::LocalStorageRemote;
pub use shared::{Dataset, SharedStorage, StorageChange};
