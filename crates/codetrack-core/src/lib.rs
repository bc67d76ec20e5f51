//! # codetrack-core
//!
//! Foundation types for the codetrack synchronization engine:
//!
//! - [`Domain`]: the categories of synchronized data
//! - [`records`]: record types carried by each domain, tied to their domain
//!   by [`DomainRecord`]
//! - [`Snapshot`]: immutable, versioned view of one domain
//! - [`SyncError`]: the single error type every operation returns
//! - [`RemoteService`] / [`ExternalChangeSource`]: the collaborators the core
//!   consumes but does not implement
//! - [`EngineConfig`]: layered configuration
//!
//! This crate performs no I/O beyond reading configuration files.

#![forbid(unsafe_code)]

pub mod config;
pub mod domain;
pub mod errors;
pub mod records;
pub mod remote;
pub mod snapshot;

pub use config::{EngineConfig, PollingIntervals, StorageConfig};
pub use domain::{Domain, RecordId, UserId};
pub use errors::{SyncError, SyncResult};
pub use records::DomainRecord;
pub use remote::{DomainPayload, ExternalChangeSource, Mutation, MutationAck, RemoteService};
pub use snapshot::Snapshot;
