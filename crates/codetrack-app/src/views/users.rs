//! # Users View

use serde::{Deserialize, Serialize};

use codetrack_core::records::{Role, User};
use codetrack_core::{Mutation, MutationAck, SyncResult, UserId};

use super::binding::ViewBinding;

/// Binding of the users domain.
pub type UsersView = ViewBinding<User>;

/// Approved accounts per role, plus the pending queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCounts {
    /// Approved students
    pub students: usize,
    /// Approved teachers
    pub teachers: usize,
    /// Approved administrators
    pub admins: usize,
    /// Accounts awaiting a decision, any role
    pub pending: usize,
}

impl RoleCounts {
    /// Tally `users`.
    pub fn tally(users: &[User]) -> Self {
        users.iter().fold(Self::default(), |mut counts, user| {
            if user.is_pending() {
                counts.pending += 1;
            } else if user.is_approved() {
                match user.role {
                    Role::Student => counts.students += 1,
                    Role::Teacher => counts.teachers += 1,
                    Role::Admin => counts.admins += 1,
                }
            }
            counts
        })
    }
}

impl ViewBinding<User> {
    /// Accounts awaiting approval, oldest registration first.
    ///
    /// A teacher only sees their own students; administrators see everyone.
    pub fn pending_approvals(&self) -> Vec<User> {
        let viewer = self.session().current();
        let mut pending: Vec<User> = self
            .current_snapshot()
            .iter()
            .filter(|user| user.is_pending())
            .filter(|user| match &viewer {
                Some(v) if v.role == Role::Teacher => user.teacher_id.as_ref() == Some(&v.id),
                _ => true,
            })
            .cloned()
            .collect();
        pending.sort_by_key(|user| user.created_at);
        pending
    }

    /// Approved teachers.
    pub fn teachers(&self) -> Vec<User> {
        self.current_snapshot()
            .iter()
            .filter(|user| user.role == Role::Teacher && user.is_approved())
            .cloned()
            .collect()
    }

    /// Approved students supervised by `teacher`.
    pub fn students_of(&self, teacher: &UserId) -> Vec<User> {
        self.current_snapshot()
            .iter()
            .filter(|user| {
                user.role == Role::Student
                    && user.is_approved()
                    && user.teacher_id.as_ref() == Some(teacher)
            })
            .cloned()
            .collect()
    }

    /// Look up one user.
    pub fn find(&self, id: &UserId) -> Option<User> {
        self.current_snapshot().iter().find(|user| &user.id == id).cloned()
    }

    /// Per-role counts of the current snapshot.
    pub fn role_counts(&self) -> RoleCounts {
        RoleCounts::tally(self.current_snapshot().items())
    }

    /// Approve a pending account.
    pub async fn approve(&self, user_id: UserId) -> SyncResult<MutationAck> {
        self.mutate(Mutation::ApproveUser { user_id }).await
    }

    /// Reject a pending account.
    pub async fn reject(&self, user_id: UserId) -> SyncResult<MutationAck> {
        self.mutate(Mutation::RejectUser { user_id }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codetrack_core::records::ApprovalStatus;

    #[test]
    fn tally_splits_pending_from_roles() {
        let users = vec![
            User::new("a1", "Admin", Role::Admin),
            User::new("t1", "Teacher", Role::Teacher),
            User::new("s1", "One", Role::Student),
            User::new("s2", "Two", Role::Student).with_status(ApprovalStatus::Pending),
            User::new("s3", "Three", Role::Student).with_status(ApprovalStatus::Rejected),
        ];

        assert_eq!(
            RoleCounts::tally(&users),
            RoleCounts {
                students: 1,
                teachers: 1,
                admins: 1,
                pending: 1,
            }
        );
    }
}
