//! Per-tab remote over shared storage

use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

use codetrack_core::{
    Domain, DomainPayload, ExternalChangeSource, Mutation, MutationAck, RemoteService, SyncResult,
    UserId,
};
use codetrack_sync::BroadcastChangeSource;

use super::shared::{SharedStorage, StorageChange};

/// [`RemoteService`] for one tab, backed by a [`SharedStorage`].
///
/// Each remote has its own origin. Its [`change_source`](Self::change_source)
/// reports writes made through other remotes only, the way storage events
/// reach every tab except the writer.
#[derive(Debug, Clone)]
pub struct LocalStorageRemote {
    storage: SharedStorage,
    origin: Uuid,
    latency: Option<Duration>,
}

impl LocalStorageRemote {
    /// Remote with a fresh origin.
    pub fn new(storage: SharedStorage) -> Self {
        Self {
            storage,
            origin: Uuid::new_v4(),
            latency: None,
        }
    }

    /// Builder: delay every call by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency).filter(|d| !d.is_zero());
        self
    }

    /// Origin id stamped on this remote's writes.
    pub fn origin(&self) -> Uuid {
        self.origin
    }

    /// Storage this remote reads and writes.
    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    /// Changes made by every other origin.
    pub fn change_source(&self) -> Box<dyn ExternalChangeSource> {
        let origin = self.origin;
        Box::new(BroadcastChangeSource::new(
            self.storage.changes(),
            move |change: &StorageChange| (change.origin != origin).then_some(change.domain),
        ))
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl RemoteService for LocalStorageRemote {
    async fn fetch_all(&self, domain: Domain, owner: Option<&UserId>) -> SyncResult<DomainPayload> {
        self.simulate_latency().await;
        let payload = self.storage.read(domain, owner)?;
        tracing::trace!(domain = %domain, records = payload.len(), "Storage read");
        Ok(payload)
    }

    async fn mutate(&self, actor: &UserId, mutation: &Mutation) -> SyncResult<MutationAck> {
        self.simulate_latency().await;
        self.storage.apply(self.origin, actor, mutation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn change_source_skips_own_writes() {
        let storage = SharedStorage::demo();
        let tab_a = LocalStorageRemote::new(storage.clone());
        let tab_b = LocalStorageRemote::new(storage);
        let mut a_changes = tab_a.change_source();
        let mut b_changes = tab_b.change_source();

        tab_a
            .mutate(&UserId::new("s1"), &Mutation::MarkAllNotificationsRead)
            .await
            .unwrap();
        tab_b
            .mutate(
                &UserId::new("a1"),
                &Mutation::ApproveUser {
                    user_id: UserId::new("s3"),
                },
            )
            .await
            .unwrap();

        assert_eq!(b_changes.next_change().await, Some(Domain::Notifications));
        assert_eq!(a_changes.next_change().await, Some(Domain::Users));
        assert_eq!(a_changes.next_change().await, Some(Domain::Notifications));
    }
}
