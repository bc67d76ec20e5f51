//! # User Records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::UserId;

/// Role of a user on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Student tracking their own practice
    Student,
    /// Teacher supervising students and issuing assignments
    Teacher,
    /// Administrator approving accounts and publishing announcements
    Admin,
}

/// Account approval state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Awaiting an administrator decision
    #[default]
    Pending,
    /// Allowed to use the dashboard
    Approved,
    /// Registration refused
    Rejected,
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// User identifier
    pub id: UserId,
    /// Display name
    pub name: String,
    /// Contact email
    pub email: String,
    /// Dashboard role
    pub role: Role,
    /// Approval state
    pub status: ApprovalStatus,
    /// Department or class name
    #[serde(default)]
    pub department: Option<String>,
    /// Supervising teacher (students only)
    #[serde(default)]
    pub teacher_id: Option<UserId>,
    /// Registration time
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create an approved user with no department or teacher.
    pub fn new(id: impl Into<UserId>, name: impl Into<String>, role: Role) -> Self {
        let id = id.into();
        Self {
            email: format!("{id}@example.edu"),
            id,
            name: name.into(),
            role,
            status: ApprovalStatus::Approved,
            department: None,
            teacher_id: None,
            created_at: Utc::now(),
        }
    }

    /// Builder: set the approval state.
    #[must_use]
    pub fn with_status(mut self, status: ApprovalStatus) -> Self {
        self.status = status;
        self
    }

    /// Builder: assign a supervising teacher.
    #[must_use]
    pub fn with_teacher(mut self, teacher_id: impl Into<UserId>) -> Self {
        self.teacher_id = Some(teacher_id.into());
        self
    }

    /// Builder: set the department.
    #[must_use]
    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    /// Whether the account is awaiting approval.
    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }

    /// Whether the account has been approved.
    pub fn is_approved(&self) -> bool {
        self.status == ApprovalStatus::Approved
    }
}
