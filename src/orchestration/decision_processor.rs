//! Request-scoped application of decisions to stored tasks.
//!
//! Load, compute with the pure state machine, persist conditionally. The
//! processor never retries a lost race: `StaleStage` goes back to the caller,
//! who must refetch the authoritative stage before deciding again.

use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{ApprovalRecord, NewTask, Task};
use crate::sequence::SequenceAllocator;
use crate::state_machine::{self, Decision};
use crate::storage::Storage;

pub struct DecisionProcessor<S: Storage + ?Sized> {
    store: Arc<S>,
    allocator: SequenceAllocator<S>,
}

impl<S: Storage + ?Sized> DecisionProcessor<S> {
    pub fn new(store: Arc<S>, allocator: SequenceAllocator<S>) -> Self {
        Self { store, allocator }
    }

    /// Create a task at the first stage. Titles numbered at creation draw
    /// their export code from the allocator here, as an explicit call; the
    /// code is never a side effect of saving.
    pub async fn create_task(&self, new_task: NewTask, scope_key: &str) -> Result<Task> {
        let numbered = new_task.title.numbered_at_creation();
        let task = self.store.insert_task(new_task).await?;

        let task = if numbered {
            let allocation = self.allocator.allocate(scope_key).await?;
            self.store
                .assign_export_code(task.task_uuid, allocation.sequence, &allocation.code)
                .await?
        } else {
            task
        };

        tracing::info!(
            task_uuid = %task.task_uuid,
            title = %task.title,
            export_code = task.export_code.as_deref(),
            "task created"
        );
        Ok(task)
    }

    /// Apply a pre-authorized decision to the task's current stage.
    ///
    /// The conditional store update guarantees that of two racing deciders
    /// computed from the same state, exactly one commits; the other receives
    /// `StaleStage`.
    pub async fn decide(&self, task_uuid: Uuid, decision: &Decision) -> Result<Task> {
        let task = self.store.fetch_task(task_uuid).await?;
        let outcome = state_machine::decide(&task, decision)?;

        let updated = self
            .store
            .apply_decision(
                task_uuid,
                task.current_stage,
                task.overall_status,
                &outcome,
            )
            .await?;

        tracing::info!(
            task_uuid = %task_uuid,
            action = decision.action.event_type(),
            stage = %task.current_stage,
            new_stage = %updated.current_stage,
            status = %updated.overall_status,
            approver = %decision.approver_id,
            "decision applied"
        );
        Ok(updated)
    }

    /// Resubmit a revised task after its owner edited the payload. Status
    /// returns to `in_progress`, the revision snapshot is marked resolved,
    /// and the same stage re-evaluates the corrected data.
    pub async fn resubmit(&self, task_uuid: Uuid) -> Result<Task> {
        let task = self.store.fetch_task(task_uuid).await?;
        let outcome = state_machine::resubmit(&task)?;

        let updated = self.store.apply_resubmission(task_uuid, &outcome).await?;

        tracing::info!(
            task_uuid = %task_uuid,
            stage = %updated.current_stage,
            "revision resubmitted"
        );
        Ok(updated)
    }

    /// The task's approval ledger, oldest first.
    pub async fn approval_history(&self, task_uuid: Uuid) -> Result<Vec<ApprovalRecord>> {
        self.store.approvals(task_uuid).await
    }
}
