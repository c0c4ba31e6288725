use serde::{Deserialize, Serialize};

use super::states::{Stage, SubItemStatus};

/// Actions an operator can take on a task at its current stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    /// Approve the current stage; advances the task or finalizes it
    Approve,
    /// Terminally reject the task
    Reject,
    /// Return the task to its editor for correction; stage holds
    RequestRevision,
}

impl DecisionAction {
    /// String representation of the action for logging.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::RequestRevision => "request_revision",
        }
    }
}

/// Per-sub-item status update supplied alongside a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubItemUpdate {
    /// Index of the sub-item within the task's ordered list
    pub index: usize,
    pub status: SubItemStatus,
}

/// A pre-authorized decision against a task at a specific stage.
///
/// `stage` must match the task's current stage when the decision is applied;
/// the mismatch path is how concurrent deciders lose. Authorization (which
/// role may decide at which stage) is resolved by the caller before a
/// `Decision` is ever constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub stage: Stage,
    pub action: DecisionAction,
    pub approver_id: String,
    #[serde(default)]
    pub note: Option<String>,
    /// Sub-item status updates merged over stored state before the terminal gate
    #[serde(default)]
    pub item_updates: Vec<SubItemUpdate>,
}

impl Decision {
    /// Build an approval decision with no sub-item updates.
    pub fn approve(stage: Stage, approver_id: impl Into<String>) -> Self {
        Self {
            stage,
            action: DecisionAction::Approve,
            approver_id: approver_id.into(),
            note: None,
            item_updates: Vec::new(),
        }
    }

    /// Build a rejection with the given note.
    pub fn reject(stage: Stage, approver_id: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            stage,
            action: DecisionAction::Reject,
            approver_id: approver_id.into(),
            note: Some(note.into()),
            item_updates: Vec::new(),
        }
    }

    /// Build a revision request with the given note.
    pub fn request_revision(
        stage: Stage,
        approver_id: impl Into<String>,
        note: impl Into<String>,
    ) -> Self {
        Self {
            stage,
            action: DecisionAction::RequestRevision,
            approver_id: approver_id.into(),
            note: Some(note.into()),
            item_updates: Vec::new(),
        }
    }

    /// Attach sub-item status updates to this decision.
    pub fn with_item_updates(mut self, updates: Vec<SubItemUpdate>) -> Self {
        self.item_updates = updates;
        self
    }
}
