//! In-memory store implementation.
//!
//! Backs the test suite and single-process deployments. Per-task entry locks
//! serialize decisions on the same task; counters are mutated under their own
//! entry lock so increments are linearizable per scope.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use uuid::Uuid;

use super::{BatchStore, CounterStore, TaskStore};
use crate::error::{CoreError, Result};
use crate::models::{ApprovalRecord, Batch, BatchStatus, NewTask, SequenceCounter, Task};
use crate::state_machine::{DecisionOutcome, OverallStatus, ResubmitOutcome, Stage};

#[derive(Default)]
pub struct InMemoryStore {
    tasks: DashMap<Uuid, Task>,
    ledgers: DashMap<Uuid, Mutex<Vec<ApprovalRecord>>>,
    counters: DashMap<String, i64>,
    batches: DashMap<Uuid, Batch>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a counter to a known value. Test setup only; issuance always goes
    /// through `increment_sequence`.
    pub fn seed_counter(&self, scope_key: impl Into<String>, sequence: i64) {
        self.counters.insert(scope_key.into(), sequence);
    }

    /// Snapshot of every batch record, in no particular order.
    pub fn batch_records(&self) -> Vec<Batch> {
        self.batches.iter().map(|entry| entry.clone()).collect()
    }
}

#[async_trait]
impl TaskStore for InMemoryStore {
    async fn insert_task(&self, new_task: NewTask) -> Result<Task> {
        let now = Utc::now();
        let task = Task {
            task_uuid: Uuid::new_v4(),
            title: new_task.title,
            main_data: new_task.main_data,
            additional_data: new_task.additional_data,
            current_stage: Stage::default(),
            overall_status: OverallStatus::default(),
            revised_info: None,
            sequence: None,
            export_code: None,
            batch_uuid: None,
            created_at: now,
            updated_at: now,
        };

        self.ledgers.insert(task.task_uuid, Mutex::new(Vec::new()));
        self.tasks.insert(task.task_uuid, task.clone());
        Ok(task)
    }

    async fn fetch_task(&self, task_uuid: Uuid) -> Result<Task> {
        self.tasks
            .get(&task_uuid)
            .map(|entry| entry.clone())
            .ok_or_else(|| CoreError::task_not_found(task_uuid))
    }

    async fn fetch_tasks(&self, task_uuids: &[Uuid]) -> Result<Vec<Task>> {
        let mut tasks = Vec::with_capacity(task_uuids.len());
        for uuid in task_uuids {
            tasks.push(self.fetch_task(*uuid).await?);
        }
        Ok(tasks)
    }

    async fn apply_decision(
        &self,
        task_uuid: Uuid,
        expected_stage: Stage,
        expected_status: OverallStatus,
        outcome: &DecisionOutcome,
    ) -> Result<Task> {
        let mut entry = self
            .tasks
            .get_mut(&task_uuid)
            .ok_or_else(|| CoreError::task_not_found(task_uuid))?;

        // Optimistic check: the state the decision was computed from must
        // still hold. Exactly one of two racing deciders passes.
        if entry.current_stage != expected_stage || entry.overall_status != expected_status {
            return Err(CoreError::StaleStage {
                task_uuid,
                expected: expected_stage,
                actual: entry.current_stage,
            });
        }

        entry.current_stage = outcome.stage;
        entry.overall_status = outcome.overall_status;
        entry.additional_data = outcome.sub_items.clone();
        entry.revised_info = outcome.revised_info.clone();
        entry.updated_at = Utc::now();

        // Ledger append happens while the task entry lock is held, so the
        // row and the task update are observed together.
        let ledger = self
            .ledgers
            .entry(task_uuid)
            .or_insert_with(|| Mutex::new(Vec::new()));
        let mut rows = ledger.lock();
        let mut record = outcome.record.clone();
        record.sort_key = rows.len() as i32 + 1;
        rows.push(record);

        Ok(entry.clone())
    }

    async fn apply_resubmission(
        &self,
        task_uuid: Uuid,
        outcome: &ResubmitOutcome,
    ) -> Result<Task> {
        let mut entry = self
            .tasks
            .get_mut(&task_uuid)
            .ok_or_else(|| CoreError::task_not_found(task_uuid))?;

        if entry.overall_status != OverallStatus::Revised {
            return Err(CoreError::StaleStage {
                task_uuid,
                expected: entry.current_stage,
                actual: entry.current_stage,
            });
        }

        entry.overall_status = outcome.overall_status;
        entry.revised_info = outcome.revised_info.clone();
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn stamp_export(
        &self,
        task_uuid: Uuid,
        batch_uuid: Uuid,
        sequence: i64,
        export_code: &str,
    ) -> Result<()> {
        let mut entry = self
            .tasks
            .get_mut(&task_uuid)
            .ok_or_else(|| CoreError::task_not_found(task_uuid))?;

        match entry.batch_uuid {
            Some(existing) if existing == batch_uuid => Ok(()), // already stamped
            Some(existing) => Err(CoreError::validation(format!(
                "task {task_uuid} already stamped under batch {existing}"
            ))),
            None => {
                entry.batch_uuid = Some(batch_uuid);
                entry.sequence = Some(sequence);
                entry.export_code = Some(export_code.to_string());
                entry.updated_at = Utc::now();
                Ok(())
            }
        }
    }

    async fn assign_export_code(
        &self,
        task_uuid: Uuid,
        sequence: i64,
        export_code: &str,
    ) -> Result<Task> {
        let mut entry = self
            .tasks
            .get_mut(&task_uuid)
            .ok_or_else(|| CoreError::task_not_found(task_uuid))?;

        if entry.export_code.is_some() {
            return Err(CoreError::validation(format!(
                "task {task_uuid} already carries an export code"
            )));
        }

        entry.sequence = Some(sequence);
        entry.export_code = Some(export_code.to_string());
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn approvals(&self, task_uuid: Uuid) -> Result<Vec<ApprovalRecord>> {
        if !self.tasks.contains_key(&task_uuid) {
            return Err(CoreError::task_not_found(task_uuid));
        }
        Ok(self
            .ledgers
            .get(&task_uuid)
            .map(|ledger| ledger.lock().clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl CounterStore for InMemoryStore {
    async fn increment_sequence(&self, scope_key: &str) -> Result<i64> {
        // The entry guard is the per-scope critical section; no caller ever
        // observes an intermediate value.
        let mut entry = self.counters.entry(scope_key.to_string()).or_insert(0);
        *entry += 1;
        Ok(*entry)
    }

    async fn current_sequence(&self, scope_key: &str) -> Result<SequenceCounter> {
        Ok(SequenceCounter {
            scope_key: scope_key.to_string(),
            sequence: self.counters.get(scope_key).map(|v| *v).unwrap_or(0),
        })
    }
}

#[async_trait]
impl BatchStore for InMemoryStore {
    async fn insert_batch(&self, batch: Batch) -> Result<Batch> {
        self.batches.insert(batch.batch_uuid, batch.clone());
        Ok(batch)
    }

    async fn fetch_batch(&self, batch_uuid: Uuid) -> Result<Batch> {
        self.batches
            .get(&batch_uuid)
            .map(|entry| entry.clone())
            .ok_or_else(|| CoreError::batch_not_found(batch_uuid))
    }

    async fn set_document_url(&self, batch_uuid: Uuid, url: &str) -> Result<()> {
        let mut entry = self
            .batches
            .get_mut(&batch_uuid)
            .ok_or_else(|| CoreError::batch_not_found(batch_uuid))?;
        entry.document_url = Some(url.to_string());
        Ok(())
    }

    async fn finalize_batch(&self, batch_uuid: Uuid) -> Result<()> {
        let mut entry = self
            .batches
            .get_mut(&batch_uuid)
            .ok_or_else(|| CoreError::batch_not_found(batch_uuid))?;
        match entry.status {
            BatchStatus::Draft => {
                entry.status = BatchStatus::Final;
                Ok(())
            }
            BatchStatus::Final => Ok(()),
            BatchStatus::Void => Err(CoreError::validation(format!(
                "batch {batch_uuid} is void and cannot be finalized"
            ))),
        }
    }

    async fn void_batch(&self, batch_uuid: Uuid) -> Result<()> {
        let mut entry = self
            .batches
            .get_mut(&batch_uuid)
            .ok_or_else(|| CoreError::batch_not_found(batch_uuid))?;
        entry.status = BatchStatus::Void;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::{MainData, TaskTitle};

    fn new_task() -> NewTask {
        NewTask {
            title: TaskTitle::MutasiSebagian,
            main_data: MainData {
                name: "Budi Santoso".to_string(),
                nik: "3515120101800003".to_string(),
                nop: "35.15.120.012.003-0200.0".to_string(),
                address: "Jl. Kenanga 5".to_string(),
                land_area: 250.0,
                building_area: 70.0,
            },
            additional_data: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_fetch() {
        let store = InMemoryStore::new();
        let task = store.insert_task(new_task()).await.unwrap();

        let fetched = store.fetch_task(task.task_uuid).await.unwrap();
        assert_eq!(fetched.current_stage, Stage::Diinput);
        assert_eq!(fetched.overall_status, OverallStatus::InProgress);

        let missing = store.fetch_task(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(missing, CoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_counter_increment_is_per_scope() {
        let store = InMemoryStore::new();
        assert_eq!(store.increment_sequence("2024").await.unwrap(), 1);
        assert_eq!(store.increment_sequence("2025").await.unwrap(), 1);
        assert_eq!(store.increment_sequence("2025").await.unwrap(), 2);
        let counter = store.current_sequence("2024").await.unwrap();
        assert_eq!(counter.scope_key, "2024");
        assert_eq!(counter.sequence, 1);
        // An untouched scope reads as a zero row.
        assert_eq!(store.current_sequence("2023").await.unwrap().sequence, 0);
    }

    #[tokio::test]
    async fn test_stamp_is_idempotent_per_batch() {
        let store = InMemoryStore::new();
        let task = store.insert_task(new_task()).await.unwrap();
        let batch_uuid = Uuid::new_v4();

        store
            .stamp_export(task.task_uuid, batch_uuid, 5, "973/5-UPT.PD.WIL.IV/2025")
            .await
            .unwrap();
        // Same stamp again is a no-op.
        store
            .stamp_export(task.task_uuid, batch_uuid, 5, "973/5-UPT.PD.WIL.IV/2025")
            .await
            .unwrap();

        // A different batch must not overwrite.
        let err = store
            .stamp_export(task.task_uuid, Uuid::new_v4(), 6, "973/6-UPT.PD.WIL.IV/2025")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let stamped = store.fetch_task(task.task_uuid).await.unwrap();
        assert_eq!(stamped.sequence, Some(5));
        assert_eq!(
            stamped.export_code.as_deref(),
            Some("973/5-UPT.PD.WIL.IV/2025")
        );
    }
}
