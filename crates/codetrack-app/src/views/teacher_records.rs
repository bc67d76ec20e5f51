//! # Teacher Records View

use chrono::{DateTime, Utc};

use codetrack_core::records::{NewAssignment, TeacherRecord};
use codetrack_core::{Mutation, MutationAck, RecordId, SyncResult, UserId};

use super::binding::ViewBinding;

/// Binding of the teacher records (assignments) domain.
pub type TeacherRecordsView = ViewBinding<TeacherRecord>;

fn by_due_date(mut records: Vec<TeacherRecord>) -> Vec<TeacherRecord> {
    records.sort_by_key(|record| record.due_at);
    records
}

impl ViewBinding<TeacherRecord> {
    /// Assignments not yet due at `now`, soonest first.
    pub fn active(&self, now: DateTime<Utc>) -> Vec<TeacherRecord> {
        by_due_date(
            self.current_snapshot()
                .iter()
                .filter(|record| !record.is_overdue(now))
                .cloned()
                .collect(),
        )
    }

    /// Assignments past due at `now`, oldest due date first.
    pub fn overdue(&self, now: DateTime<Utc>) -> Vec<TeacherRecord> {
        by_due_date(
            self.current_snapshot()
                .iter()
                .filter(|record| record.is_overdue(now))
                .cloned()
                .collect(),
        )
    }

    /// Assignments that apply to `student`, soonest due first.
    pub fn for_student(&self, student: &UserId) -> Vec<TeacherRecord> {
        by_due_date(
            self.current_snapshot()
                .iter()
                .filter(|record| record.applies_to(student))
                .cloned()
                .collect(),
        )
    }

    /// Issue an assignment as the signed-in teacher.
    pub async fn create(&self, assignment: NewAssignment) -> SyncResult<MutationAck> {
        self.mutate(Mutation::CreateAssignment(assignment)).await
    }

    /// Withdraw an assignment.
    pub async fn delete(&self, id: RecordId) -> SyncResult<MutationAck> {
        self.mutate(Mutation::DeleteAssignment { id }).await
    }
}
