//! Remote collaborator interfaces
//!
//! The synchronization core never talks to a network or storage backend
//! directly. It consumes two capabilities:
//!
//! - [`RemoteService`]: request/response access to every domain's data
//! - [`ExternalChangeSource`]: "another context changed domain X" signals,
//!   independent of how they are transported (browser storage events, a file
//!   watcher, a broadcast channel, ...)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{Domain, RecordId, UserId};
use crate::errors::SyncResult;
use crate::records::{
    Announcement, NewAnnouncement, NewAssignment, Notification, Platform, PlatformStat,
    TeacherRecord, User,
};

/// Full contents of one domain as returned by [`RemoteService::fetch_all`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "domain", content = "items", rename_all = "snake_case")]
pub enum DomainPayload {
    /// Users
    Users(Vec<User>),
    /// Platform statistics
    PlatformStats(Vec<PlatformStat>),
    /// Teacher assignments
    TeacherRecords(Vec<TeacherRecord>),
    /// Notifications
    Notifications(Vec<Notification>),
    /// Announcements
    Announcements(Vec<Announcement>),
}

impl DomainPayload {
    /// Domain the payload belongs to.
    pub fn domain(&self) -> Domain {
        match self {
            Self::Users(_) => Domain::Users,
            Self::PlatformStats(_) => Domain::PlatformStats,
            Self::TeacherRecords(_) => Domain::TeacherRecords,
            Self::Notifications(_) => Domain::Notifications,
            Self::Announcements(_) => Domain::Announcements,
        }
    }

    /// Number of records carried.
    pub fn len(&self) -> usize {
        match self {
            Self::Users(items) => items.len(),
            Self::PlatformStats(items) => items.len(),
            Self::TeacherRecords(items) => items.len(),
            Self::Notifications(items) => items.len(),
            Self::Announcements(items) => items.len(),
        }
    }

    /// Whether the payload carries no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A domain-specific write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    /// Approve a pending account
    ApproveUser {
        /// Account to approve
        user_id: UserId,
    },
    /// Reject a pending account
    RejectUser {
        /// Account to reject
        user_id: UserId,
    },
    /// Link a platform handle to the acting student
    LinkPlatform {
        /// Platform to link
        platform: Platform,
        /// Handle on that platform
        handle: String,
    },
    /// Remove the acting student's link to a platform
    UnlinkPlatform {
        /// Platform to unlink
        platform: Platform,
    },
    /// Issue an assignment as the acting teacher
    CreateAssignment(NewAssignment),
    /// Withdraw an assignment issued by the acting teacher
    DeleteAssignment {
        /// Assignment to delete
        id: RecordId,
    },
    /// Mark one of the acting user's notifications read
    MarkNotificationRead {
        /// Notification to mark
        id: RecordId,
    },
    /// Mark every notification of the acting user read
    MarkAllNotificationsRead,
    /// Publish an announcement as the acting user
    CreateAnnouncement(NewAnnouncement),
    /// Remove an announcement
    DeleteAnnouncement {
        /// Announcement to remove
        id: RecordId,
    },
}

impl Mutation {
    /// Domain whose snapshot the write changes.
    pub fn domain(&self) -> Domain {
        match self {
            Self::ApproveUser { .. } | Self::RejectUser { .. } => Domain::Users,
            Self::LinkPlatform { .. } | Self::UnlinkPlatform { .. } => Domain::PlatformStats,
            Self::CreateAssignment(_) | Self::DeleteAssignment { .. } => Domain::TeacherRecords,
            Self::MarkNotificationRead { .. } | Self::MarkAllNotificationsRead => {
                Domain::Notifications
            }
            Self::CreateAnnouncement(_) | Self::DeleteAnnouncement { .. } => Domain::Announcements,
        }
    }

    /// Short operation name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ApproveUser { .. } => "approve_user",
            Self::RejectUser { .. } => "reject_user",
            Self::LinkPlatform { .. } => "link_platform",
            Self::UnlinkPlatform { .. } => "unlink_platform",
            Self::CreateAssignment(_) => "create_assignment",
            Self::DeleteAssignment { .. } => "delete_assignment",
            Self::MarkNotificationRead { .. } => "mark_notification_read",
            Self::MarkAllNotificationsRead => "mark_all_notifications_read",
            Self::CreateAnnouncement(_) => "create_announcement",
            Self::DeleteAnnouncement { .. } => "delete_announcement",
        }
    }
}

/// Acknowledgment of a successful write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationAck {
    /// Domain the write changed
    pub domain: Domain,
    /// Record created or touched, when there is a single one
    pub record_id: Option<String>,
}

impl MutationAck {
    /// Acknowledge a write to `domain`.
    pub fn new(domain: Domain) -> Self {
        Self {
            domain,
            record_id: None,
        }
    }

    /// Builder: attach the affected record id.
    #[must_use]
    pub fn with_record(mut self, record_id: impl Into<String>) -> Self {
        self.record_id = Some(record_id.into());
        self
    }
}

/// Network/storage collaborator consumed by the synchronization core.
///
/// Implementations own their timeouts only loosely: the polling controller
/// bounds every fetch with its own configured timeout.
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Fetch the full current contents of `domain`.
    ///
    /// Owner-scoped domains receive the signed-in identity in `owner`.
    async fn fetch_all(&self, domain: Domain, owner: Option<&UserId>) -> SyncResult<DomainPayload>;

    /// Apply a write on behalf of `actor`.
    async fn mutate(&self, actor: &UserId, mutation: &Mutation) -> SyncResult<MutationAck>;
}

/// Signal that data backing a domain was changed outside this context.
#[async_trait]
pub trait ExternalChangeSource: Send {
    /// Wait for the next changed domain; `None` means the source is closed.
    async fn next_change(&mut self) -> Option<Domain>;
}
