//! # Announcements View

use codetrack_core::records::{Announcement, NewAnnouncement, Role};
use codetrack_core::{Mutation, MutationAck, RecordId, SyncResult};

use super::binding::ViewBinding;

/// Binding of the announcements domain.
pub type AnnouncementsView = ViewBinding<Announcement>;

impl ViewBinding<Announcement> {
    /// Announcements addressed to `role`, newest first.
    pub fn visible_for(&self, role: Role) -> Vec<Announcement> {
        let mut visible: Vec<Announcement> = self
            .current_snapshot()
            .iter()
            .filter(|a| a.audience.includes(role))
            .cloned()
            .collect();
        visible.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        visible
    }

    /// Announcements addressed to the signed-in user; empty when signed out.
    pub fn visible(&self) -> Vec<Announcement> {
        self.session()
            .role()
            .map(|role| self.visible_for(role))
            .unwrap_or_default()
    }

    /// Publish an announcement.
    pub async fn create(&self, announcement: NewAnnouncement) -> SyncResult<MutationAck> {
        self.mutate(Mutation::CreateAnnouncement(announcement)).await
    }

    /// Remove an announcement.
    pub async fn delete(&self, id: RecordId) -> SyncResult<MutationAck> {
        self.mutate(Mutation::DeleteAnnouncement { id }).await
    }
}
