//! Data domains and identifiers
//!
//! A [`Domain`] is a named category of application data with its own
//! snapshot, subscriber set and refresh cadence.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Categories of synchronized application data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// Registered users of every role
    Users,
    /// Per-platform practice statistics of a student
    PlatformStats,
    /// Assignments issued by a teacher
    TeacherRecords,
    /// Notifications addressed to the signed-in user
    Notifications,
    /// Announcements published by teachers and administrators
    Announcements,
}

impl Domain {
    /// Every domain, in a stable order.
    pub const ALL: [Domain; 5] = [
        Domain::Users,
        Domain::PlatformStats,
        Domain::TeacherRecords,
        Domain::Notifications,
        Domain::Announcements,
    ];

    /// Stable snake_case name used in logs, config keys and storage files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::PlatformStats => "platform_stats",
            Self::TeacherRecords => "teacher_records",
            Self::Notifications => "notifications",
            Self::Announcements => "announcements",
        }
    }

    /// Whether fetches for this domain are scoped to the signed-in identity.
    pub fn is_owner_scoped(&self) -> bool {
        matches!(
            self,
            Self::PlatformStats | Self::TeacherRecords | Self::Notifications
        )
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a stored record (assignment, notification, announcement).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_scoped_domains() {
        let scoped: Vec<_> = Domain::ALL
            .iter()
            .filter(|d| d.is_owner_scoped())
            .collect();
        assert_eq!(
            scoped,
            vec![
                &Domain::PlatformStats,
                &Domain::TeacherRecords,
                &Domain::Notifications
            ]
        );
    }

    #[test]
    fn domain_serde_matches_display() {
        for domain in Domain::ALL {
            let json = serde_json::to_string(&domain).unwrap_or_default();
            assert_eq!(json, format!("\"{domain}\""));
        }
    }
}
