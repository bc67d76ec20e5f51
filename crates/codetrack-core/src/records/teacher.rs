//! # Teacher Records
//!
//! Assignments a teacher issues to their students.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{RecordId, UserId};
use crate::records::Platform;

/// An assignment issued by a teacher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeacherRecord {
    /// Record identifier
    pub id: RecordId,
    /// Issuing teacher
    pub teacher_id: UserId,
    /// Short title
    pub title: String,
    /// Free-form instructions
    #[serde(default)]
    pub description: String,
    /// Platform the problems are on, if restricted to one
    #[serde(default)]
    pub platform: Option<Platform>,
    /// Number of problems each student should solve
    pub target_problems: u32,
    /// Deadline
    pub due_at: DateTime<Utc>,
    /// Students the assignment applies to; empty means all of the teacher's students
    #[serde(default)]
    pub assigned_students: Vec<UserId>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl TeacherRecord {
    /// Whether the deadline has passed at `now`.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.due_at < now
    }

    /// Whether the assignment applies to `student`.
    pub fn applies_to(&self, student: &UserId) -> bool {
        self.assigned_students.is_empty() || self.assigned_students.contains(student)
    }
}

/// Fields for a new assignment; the remote assigns id and creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAssignment {
    /// Short title
    pub title: String,
    /// Free-form instructions
    #[serde(default)]
    pub description: String,
    /// Platform restriction
    #[serde(default)]
    pub platform: Option<Platform>,
    /// Problems to solve
    pub target_problems: u32,
    /// Deadline
    pub due_at: DateTime<Utc>,
    /// Targeted students; empty means all
    #[serde(default)]
    pub assigned_students: Vec<UserId>,
}
