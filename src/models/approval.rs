//! Approval ledger rows: the append-only history of stage decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state_machine::states::{DecisionStatus, Stage};

/// One decision recorded against a task.
///
/// Rows are append-only: every decision adds exactly one record, and no record
/// is ever mutated or deleted. `sort_key` is monotonically increasing per
/// task and orders the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub approval_uuid: Uuid,
    pub task_uuid: Uuid,
    /// Stage being decided
    pub stage: Stage,
    pub status: DecisionStatus,
    pub approver_id: String,
    pub note: Option<String>,
    pub approved_at: DateTime<Utc>,
    pub sort_key: i32,
}

impl ApprovalRecord {
    /// Build the next ledger row for a task. `sort_key` is assigned by the
    /// store at append time; callers pass 0.
    pub fn new(
        task_uuid: Uuid,
        stage: Stage,
        status: DecisionStatus,
        approver_id: impl Into<String>,
        note: Option<String>,
    ) -> Self {
        Self {
            approval_uuid: Uuid::new_v4(),
            task_uuid,
            stage,
            status,
            approver_id: approver_id.into(),
            note,
            approved_at: Utc::now(),
            sort_key: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_defaults() {
        let task_uuid = Uuid::new_v4();
        let record = ApprovalRecord::new(
            task_uuid,
            Stage::Diteliti,
            DecisionStatus::Approved,
            "op-3",
            None,
        );

        assert_eq!(record.task_uuid, task_uuid);
        assert_eq!(record.sort_key, 0);
        assert!(record.note.is_none());
        assert_eq!(record.status, DecisionStatus::Approved);
    }
}
