//! # Notifications View

use codetrack_core::records::Notification;
use codetrack_core::{Mutation, MutationAck, RecordId, SyncResult};

use super::binding::ViewBinding;

/// Binding of the notifications domain.
pub type NotificationsView = ViewBinding<Notification>;

impl ViewBinding<Notification> {
    /// Number of unread notifications.
    pub fn unread_count(&self) -> usize {
        self.current_snapshot().iter().filter(|n| !n.read).count()
    }

    /// Unread notifications, newest first.
    pub fn unread(&self) -> Vec<Notification> {
        let mut unread: Vec<Notification> = self
            .current_snapshot()
            .iter()
            .filter(|n| !n.read)
            .cloned()
            .collect();
        unread.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        unread
    }

    /// Mark one notification read.
    pub async fn mark_read(&self, id: RecordId) -> SyncResult<MutationAck> {
        self.mutate(Mutation::MarkNotificationRead { id }).await
    }

    /// Mark every notification read.
    pub async fn mark_all_read(&self) -> SyncResult<MutationAck> {
        self.mutate(Mutation::MarkAllNotificationsRead).await
    }
}
