//! # Notification Records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{RecordId, UserId};

/// What a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// General information
    Info,
    /// Account approval decision
    Approval,
    /// New or updated assignment
    Assignment,
    /// New announcement
    Announcement,
}

/// A notification addressed to one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Record identifier
    pub id: RecordId,
    /// Addressee
    pub recipient_id: UserId,
    /// Category
    pub kind: NotificationKind,
    /// Message text
    pub message: String,
    /// Whether the addressee has read it
    pub read: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Create an unread notification with a fresh id.
    pub fn new(
        recipient_id: impl Into<UserId>,
        kind: NotificationKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: RecordId::generate(),
            recipient_id: recipient_id.into(),
            kind,
            message: message.into(),
            read: false,
            created_at: Utc::now(),
        }
    }
}
