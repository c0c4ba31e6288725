//! Storage contracts for the approval core.
//!
//! The core does not mandate a persistence technology; it mandates a
//! consistency contract. Task updates are conditional on the state the
//! decision was computed from, counter mutation happens only through a
//! single atomic increment-and-return operation, and ledger rows together
//! with their task update land atomically.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{ApprovalRecord, Batch, NewTask, SequenceCounter, Task};
use crate::state_machine::{DecisionOutcome, OverallStatus, ResubmitOutcome, Stage};

/// Task record store with optimistic-conditional updates.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Persist a new task at the first stage with `in_progress` status.
    async fn insert_task(&self, new_task: NewTask) -> Result<Task>;

    /// Load one task; `NotFound` if the id is unknown.
    async fn fetch_task(&self, task_uuid: Uuid) -> Result<Task>;

    /// Load several tasks; `NotFound` names the first missing id.
    async fn fetch_tasks(&self, task_uuids: &[Uuid]) -> Result<Vec<Task>>;

    /// Apply a computed decision outcome, conditioned on the stage and status
    /// the decision was computed from. The task update and the ledger append
    /// happen together or not at all; a failed condition surfaces
    /// `StaleStage` so exactly one of two racing deciders wins.
    async fn apply_decision(
        &self,
        task_uuid: Uuid,
        expected_stage: Stage,
        expected_status: OverallStatus,
        outcome: &DecisionOutcome,
    ) -> Result<Task>;

    /// Apply a resubmission, conditioned on the task still being `revised`.
    async fn apply_resubmission(
        &self,
        task_uuid: Uuid,
        outcome: &ResubmitOutcome,
    ) -> Result<Task>;

    /// Stamp a task with its issued batch identity. No-op if the task already
    /// carries this exact stamp; refuses to overwrite a different one.
    async fn stamp_export(
        &self,
        task_uuid: Uuid,
        batch_uuid: Uuid,
        sequence: i64,
        export_code: &str,
    ) -> Result<()>;

    /// Assign a creation-time export code; only valid while the task has none.
    async fn assign_export_code(
        &self,
        task_uuid: Uuid,
        sequence: i64,
        export_code: &str,
    ) -> Result<Task>;

    /// The task's approval ledger ordered by `sort_key`.
    async fn approvals(&self, task_uuid: Uuid) -> Result<Vec<ApprovalRecord>>;
}

/// Counter store exposing only the atomic increment path.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Find-or-create the counter for `scope_key`, atomically increment it by
    /// one, and return the new value. Linearizable per scope.
    async fn increment_sequence(&self, scope_key: &str) -> Result<i64>;

    /// The counter row for a scope, a zero row if none exists yet.
    /// Read-only; never part of an issuance path.
    async fn current_sequence(&self, scope_key: &str) -> Result<SequenceCounter>;
}

/// Batch record store.
#[async_trait]
pub trait BatchStore: Send + Sync {
    async fn insert_batch(&self, batch: Batch) -> Result<Batch>;

    async fn fetch_batch(&self, batch_uuid: Uuid) -> Result<Batch>;

    /// Attach the renderer's durable link. Issuance is never undone by a
    /// failure to attach.
    async fn set_document_url(&self, batch_uuid: Uuid, url: &str) -> Result<()>;

    /// Promote a draft batch to `final` once every covered task is stamped.
    /// A no-op on an already-final batch; refuses a void one.
    async fn finalize_batch(&self, batch_uuid: Uuid) -> Result<()>;

    /// Mark a batch void; its code stays reserved and is never reissued.
    async fn void_batch(&self, batch_uuid: Uuid) -> Result<()>;
}

/// Umbrella trait for stores implementing all three contracts.
pub trait Storage: TaskStore + CounterStore + BatchStore {}

impl<T: TaskStore + CounterStore + BatchStore> Storage for T {}
