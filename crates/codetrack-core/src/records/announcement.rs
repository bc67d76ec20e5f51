//! # Announcement Records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{RecordId, UserId};
use crate::records::Role;

/// Who an announcement is shown to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    /// Every signed-in user
    #[default]
    Everyone,
    /// Students only
    Students,
    /// Teachers only
    Teachers,
}

impl Audience {
    /// Whether a user with `role` should see announcements for this audience.
    ///
    /// Administrators see everything.
    pub fn includes(&self, role: Role) -> bool {
        match (self, role) {
            (_, Role::Admin) | (Self::Everyone, _) => true,
            (Self::Students, Role::Student) | (Self::Teachers, Role::Teacher) => true,
            _ => false,
        }
    }
}

/// A published announcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    /// Record identifier
    pub id: RecordId,
    /// Publisher
    pub author_id: UserId,
    /// Headline
    pub title: String,
    /// Body text
    pub body: String,
    /// Target audience
    pub audience: Audience,
    /// Publication time
    pub created_at: DateTime<Utc>,
}

/// Fields for a new announcement; the remote assigns id, author and time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAnnouncement {
    /// Headline
    pub title: String,
    /// Body text
    pub body: String,
    /// Target audience
    #[serde(default)]
    pub audience: Audience,
}
