//! Pure stage-transition logic.
//!
//! `decide` is a function of data: it takes the task's current state and an
//! incoming decision and computes the resulting state plus the ledger row to
//! append, or a typed error. It performs no storage round trips and holds no
//! authorization knowledge; callers validate the approver's role against the
//! stage before constructing a [`Decision`].

use chrono::Utc;

use super::events::{Decision, DecisionAction};
use super::states::{DecisionStatus, OverallStatus, Stage, SubItemStatus};
use crate::error::{CoreError, Result};
use crate::models::approval::ApprovalRecord;
use crate::models::task::{RevisionInfo, SubItem, Task};

/// Result of applying a decision: the task's next state plus the ledger row.
///
/// The store applies all of it together or not at all.
#[derive(Debug, Clone)]
pub struct DecisionOutcome {
    pub stage: Stage,
    pub overall_status: OverallStatus,
    /// Sub-items after merging the decision's updates over stored state
    pub sub_items: Vec<SubItem>,
    pub revised_info: Option<RevisionInfo>,
    pub record: ApprovalRecord,
}

/// Result of resubmitting a revised task.
#[derive(Debug, Clone)]
pub struct ResubmitOutcome {
    pub overall_status: OverallStatus,
    pub revised_info: Option<RevisionInfo>,
}

/// Compute the legal transition for `decision` against `task`.
pub fn decide(task: &Task, decision: &Decision) -> Result<DecisionOutcome> {
    if task.overall_status.is_terminal() {
        return Err(CoreError::TerminalState {
            task_uuid: task.task_uuid,
            status: task.overall_status.to_string(),
        });
    }

    if decision.stage != task.current_stage {
        return Err(CoreError::StaleStage {
            task_uuid: task.task_uuid,
            expected: decision.stage,
            actual: task.current_stage,
        });
    }

    let sub_items = merge_sub_items(task, decision)?;

    match decision.action {
        DecisionAction::Approve => approve(task, decision, sub_items),
        DecisionAction::Reject => Ok(DecisionOutcome {
            stage: task.current_stage,
            overall_status: OverallStatus::Rejected,
            sub_items,
            revised_info: task.revised_info.clone(),
            record: ledger_row(task, decision, DecisionStatus::Rejected),
        }),
        DecisionAction::RequestRevision => Ok(DecisionOutcome {
            stage: task.current_stage,
            overall_status: OverallStatus::Revised,
            sub_items,
            revised_info: Some(RevisionInfo {
                stage: task.current_stage,
                note: decision.note.clone(),
                approver_id: decision.approver_id.clone(),
                requested_at: Utc::now(),
                is_resolved: false,
            }),
            record: ledger_row(task, decision, DecisionStatus::Revised),
        }),
    }
}

/// Resubmission after an edit while the task is in `revised` status: the
/// pending revision is marked resolved and the same stage re-evaluates the
/// corrected data.
pub fn resubmit(task: &Task) -> Result<ResubmitOutcome> {
    if task.overall_status != OverallStatus::Revised {
        return Err(CoreError::validation(format!(
            "task {} is not awaiting revision ({})",
            task.task_uuid, task.overall_status
        )));
    }

    let revised_info = task.revised_info.clone().map(|mut info| {
        info.is_resolved = true;
        info
    });

    Ok(ResubmitOutcome {
        overall_status: OverallStatus::InProgress,
        revised_info,
    })
}

fn approve(task: &Task, decision: &Decision, sub_items: Vec<SubItem>) -> Result<DecisionOutcome> {
    // Non-terminal approval: advance exactly one stage.
    if let Some(next) = task.current_stage.next() {
        return Ok(DecisionOutcome {
            stage: next,
            overall_status: OverallStatus::InProgress,
            sub_items,
            revised_info: task.revised_info.clone(),
            record: ledger_row(task, decision, DecisionStatus::Approved),
        });
    }

    // Terminal stage: every sub-item must be approved before finalization.
    let remaining = sub_items
        .iter()
        .filter(|item| item.add_status != SubItemStatus::Approved)
        .count();
    if remaining > 0 {
        return Err(CoreError::IncompleteSubItems {
            task_uuid: task.task_uuid,
            remaining,
        });
    }

    Ok(DecisionOutcome {
        stage: task.current_stage,
        overall_status: OverallStatus::Approved,
        sub_items,
        revised_info: task.revised_info.clone(),
        record: ledger_row(task, decision, DecisionStatus::Approved),
    })
}

fn ledger_row(task: &Task, decision: &Decision, status: DecisionStatus) -> ApprovalRecord {
    ApprovalRecord::new(
        task.task_uuid,
        task.current_stage,
        status,
        decision.approver_id.clone(),
        decision.note.clone(),
    )
}

fn merge_sub_items(task: &Task, decision: &Decision) -> Result<Vec<SubItem>> {
    let mut merged = task.additional_data.clone();
    for update in &decision.item_updates {
        let item = merged.get_mut(update.index).ok_or_else(|| {
            CoreError::validation(format!(
                "sub-item index {} out of range for task {} ({} item(s))",
                update.index,
                task.task_uuid,
                task.additional_data.len()
            ))
        })?;
        item.add_status = update.status;
    }
    Ok(merged)
}
