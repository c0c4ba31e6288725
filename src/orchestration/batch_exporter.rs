//! Batch export: group approved tasks under one issued number.
//!
//! Exactly one allocator call per fresh export attempt; reprints never touch
//! the allocator. The persisted batch record's task-id set is the source of
//! truth for what a code covers: a batch is inserted as `draft`, finalized
//! once every task is stamped, and a transient failure partway through
//! stamping is repaired by `reconcile`, never by issuing a new number.

use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::models::{Batch, BatchStatus, Task};
use crate::renderer::DocumentRenderer;
use crate::sequence::SequenceAllocator;
use crate::state_machine::OverallStatus;
use crate::storage::Storage;

/// Export outcome handed to the external document renderer.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub batch: Batch,
    pub tasks: Vec<Task>,
    /// True when an existing batch was reused instead of issuing a number
    pub reprint: bool,
}

pub struct BatchExporter<S: Storage + ?Sized> {
    store: Arc<S>,
    allocator: SequenceAllocator<S>,
}

impl<S: Storage + ?Sized> BatchExporter<S> {
    pub fn new(store: Arc<S>, allocator: SequenceAllocator<S>) -> Self {
        Self { store, allocator }
    }

    /// Export the selected tasks under one batch number, or reuse the batch
    /// they were already issued under.
    pub async fn export(&self, task_uuids: &[Uuid], scope_key: &str) -> Result<BatchResult> {
        if task_uuids.is_empty() {
            return Err(CoreError::validation("export selection is empty"));
        }

        let unique: BTreeSet<Uuid> = task_uuids.iter().copied().collect();
        if unique.len() != task_uuids.len() {
            return Err(CoreError::validation(
                "export selection contains duplicate task ids",
            ));
        }

        let tasks = self.store.fetch_tasks(task_uuids).await?;

        let batch_uuids: BTreeSet<Uuid> =
            tasks.iter().filter_map(|t| t.batch_uuid).collect();
        let batched = tasks.iter().filter(|t| t.is_batched()).count();

        if batched == 0 {
            return self.issue(tasks, scope_key).await;
        }
        if batched < tasks.len() {
            return Err(CoreError::mixed_batch(format!(
                "{batched} of {} selected task(s) already batched",
                tasks.len()
            )));
        }
        match batch_uuids.iter().copied().collect::<Vec<_>>().as_slice() {
            [batch_uuid] => self.reprint(*batch_uuid).await,
            _ => Err(CoreError::mixed_batch(format!(
                "selection spans {} distinct batches",
                batch_uuids.len()
            ))),
        }
    }

    /// Fresh issuance: one allocation for the whole set.
    async fn issue(&self, tasks: Vec<Task>, scope_key: &str) -> Result<BatchResult> {
        let first_title = tasks[0].title;
        if tasks.iter().any(|t| t.title != first_title) {
            return Err(CoreError::validation(
                "export selection mixes task titles",
            ));
        }
        if let Some(task) = tasks
            .iter()
            .find(|t| t.overall_status != OverallStatus::Approved)
        {
            return Err(CoreError::validation(format!(
                "task {} is not approved ({})",
                task.task_uuid, task.overall_status
            )));
        }

        let allocation = self.allocator.allocate(scope_key).await?;
        let task_uuids: Vec<Uuid> = tasks.iter().map(|t| t.task_uuid).collect();

        // The draft batch record goes first: once it exists, the issued code
        // and its coverage are durable even if stamping is interrupted.
        let mut batch = self
            .store
            .insert_batch(Batch::new(
                &allocation.code,
                scope_key,
                allocation.sequence,
                task_uuids.clone(),
            ))
            .await?;

        // Stamping is N independent writes. A transient partial failure
        // leaves the draft for `reconcile`; a permanent one voids the record
        // so only batches that can still complete stay draft.
        let stamped = futures::future::try_join_all(task_uuids.iter().map(|task_uuid| {
            self.store.stamp_export(
                *task_uuid,
                batch.batch_uuid,
                allocation.sequence,
                &allocation.code,
            )
        }))
        .await;

        if let Err(err) = stamped {
            if !err.is_retryable() {
                if let Err(void_err) = self.store.void_batch(batch.batch_uuid).await {
                    tracing::error!(
                        batch_uuid = %batch.batch_uuid,
                        error = %void_err,
                        "failed to void batch after stamping failure"
                    );
                } else {
                    tracing::warn!(
                        batch_uuid = %batch.batch_uuid,
                        batch_code = %batch.batch_code,
                        error = %err,
                        "batch voided after permanent stamping failure"
                    );
                }
            }
            return Err(err);
        }

        self.store.finalize_batch(batch.batch_uuid).await?;
        batch.status = BatchStatus::Final;

        let tasks = self.store.fetch_tasks(&task_uuids).await?;
        tracing::info!(
            batch_uuid = %batch.batch_uuid,
            batch_code = %batch.batch_code,
            task_count = tasks.len(),
            "batch issued"
        );

        Ok(BatchResult {
            batch,
            tasks,
            reprint: false,
        })
    }

    /// Reprint: reuse the existing batch, never call the allocator.
    async fn reprint(&self, batch_uuid: Uuid) -> Result<BatchResult> {
        let mut batch = self.store.fetch_batch(batch_uuid).await?;
        if batch.status == BatchStatus::Void {
            return Err(CoreError::validation(format!(
                "batch {} ({}) is void and cannot be reprinted",
                batch.batch_uuid, batch.batch_code
            )));
        }

        // The batch record, not the request, defines coverage. A draft batch
        // is an interrupted export; finish it before reprinting.
        let tasks = if batch.status == BatchStatus::Draft {
            let tasks = self.complete(&batch).await?;
            batch.status = BatchStatus::Final;
            tasks
        } else {
            self.store.fetch_tasks(&batch.task_uuids).await?
        };
        tracing::info!(
            batch_uuid = %batch.batch_uuid,
            batch_code = %batch.batch_code,
            "batch reprint"
        );

        Ok(BatchResult {
            batch,
            tasks,
            reprint: true,
        })
    }

    /// Repair an interrupted export: re-stamp every task the batch record
    /// covers, then finalize the batch. Idempotent; never allocates.
    pub async fn reconcile(&self, batch_uuid: Uuid) -> Result<Vec<Task>> {
        let batch = self.store.fetch_batch(batch_uuid).await?;
        if batch.status == BatchStatus::Void {
            return Err(CoreError::validation(format!(
                "batch {} ({}) is void and cannot be reconciled",
                batch.batch_uuid, batch.batch_code
            )));
        }

        self.complete(&batch).await
    }

    /// Re-stamp every covered task and promote the batch to `final`.
    async fn complete(&self, batch: &Batch) -> Result<Vec<Task>> {
        for task_uuid in &batch.task_uuids {
            self.store
                .stamp_export(*task_uuid, batch.batch_uuid, batch.sequence, &batch.batch_code)
                .await?;
        }
        self.store.finalize_batch(batch.batch_uuid).await?;

        self.store.fetch_tasks(&batch.task_uuids).await
    }

    /// Hand the batch to the external renderer and record the returned link.
    /// A renderer failure surfaces to the caller but never undoes issuance;
    /// the batch and its code remain intact for a later retry.
    pub async fn publish(
        &self,
        batch_uuid: Uuid,
        renderer: &dyn DocumentRenderer,
    ) -> Result<String> {
        let batch = self.store.fetch_batch(batch_uuid).await?;
        let tasks = self.store.fetch_tasks(&batch.task_uuids).await?;

        let url = renderer.render(&batch, &tasks).await?;
        self.store.set_document_url(batch.batch_uuid, &url).await?;

        tracing::info!(
            batch_uuid = %batch.batch_uuid,
            url = %url,
            "batch document published"
        );
        Ok(url)
    }
}
