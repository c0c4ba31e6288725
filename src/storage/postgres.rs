//! Postgres store implementation.
//!
//! Queries are runtime-bound so the crate builds without a live database.
//! The consistency contract lives in SQL: decisions are conditional
//! `UPDATE ... WHERE current_stage = $n AND overall_status = $m`, and the
//! counter is incremented with a single
//! `INSERT ... ON CONFLICT ... DO UPDATE ... RETURNING` round trip.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{BatchStore, CounterStore, TaskStore};
use crate::error::{CoreError, Result};
use crate::models::task::{MainData, RevisionInfo, SubItem};
use crate::models::{ApprovalRecord, Batch, BatchStatus, NewTask, SequenceCounter, Task, TaskTitle};
use crate::state_machine::{
    DecisionOutcome, DecisionStatus, OverallStatus, ResubmitOutcome, Stage,
};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn parse_field<T: std::str::FromStr>(value: &str, field: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CoreError::Database(format!("invalid {field} in database: {value}")))
}

fn task_from_row(row: &PgRow) -> Result<Task> {
    let title: String = row.try_get("title")?;
    let current_stage: String = row.try_get("current_stage")?;
    let overall_status: String = row.try_get("overall_status")?;

    let main_data: serde_json::Value = row.try_get("main_data")?;
    let additional_data: serde_json::Value = row.try_get("additional_data")?;
    let revised_info: Option<serde_json::Value> = row.try_get("revised_info")?;

    let main_data: MainData = serde_json::from_value(main_data)?;
    let additional_data: Vec<SubItem> = serde_json::from_value(additional_data)?;
    let revised_info: Option<RevisionInfo> = revised_info
        .map(serde_json::from_value)
        .transpose()?;

    Ok(Task {
        task_uuid: row.try_get("task_uuid")?,
        title: parse_field::<TaskTitle>(&title, "title")?,
        main_data,
        additional_data,
        current_stage: parse_field::<Stage>(&current_stage, "current_stage")?,
        overall_status: parse_field::<OverallStatus>(&overall_status, "overall_status")?,
        revised_info,
        sequence: row.try_get("sequence")?,
        export_code: row.try_get("export_code")?,
        batch_uuid: row.try_get("batch_uuid")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn approval_from_row(row: &PgRow) -> Result<ApprovalRecord> {
    let stage: String = row.try_get("stage")?;
    let status: String = row.try_get("status")?;

    Ok(ApprovalRecord {
        approval_uuid: row.try_get("approval_uuid")?,
        task_uuid: row.try_get("task_uuid")?,
        stage: parse_field::<Stage>(&stage, "stage")?,
        status: parse_field::<DecisionStatus>(&status, "status")?,
        approver_id: row.try_get("approver_id")?,
        note: row.try_get("note")?,
        approved_at: row.try_get::<DateTime<Utc>, _>("approved_at")?,
        sort_key: row.try_get("sort_key")?,
    })
}

fn batch_from_row(row: &PgRow) -> Result<Batch> {
    let status: String = row.try_get("status")?;

    Ok(Batch {
        batch_uuid: row.try_get("batch_uuid")?,
        batch_code: row.try_get("batch_code")?,
        scope_key: row.try_get("scope_key")?,
        sequence: row.try_get("sequence")?,
        task_uuids: row.try_get("task_uuids")?,
        status: parse_field::<BatchStatus>(&status, "status")?,
        document_url: row.try_get("document_url")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

#[async_trait]
impl TaskStore for PgStore {
    async fn insert_task(&self, new_task: NewTask) -> Result<Task> {
        let row = sqlx::query(
            r#"
            INSERT INTO berkas_tasks
                (task_uuid, title, main_data, additional_data,
                 current_stage, overall_status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new_task.title.to_string())
        .bind(serde_json::to_value(&new_task.main_data)?)
        .bind(serde_json::to_value(&new_task.additional_data)?)
        .bind(Stage::default().to_string())
        .bind(OverallStatus::default().to_string())
        .fetch_one(&self.pool)
        .await?;

        task_from_row(&row)
    }

    async fn fetch_task(&self, task_uuid: Uuid) -> Result<Task> {
        let row = sqlx::query("SELECT * FROM berkas_tasks WHERE task_uuid = $1")
            .bind(task_uuid)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CoreError::task_not_found(task_uuid))?;

        task_from_row(&row)
    }

    async fn fetch_tasks(&self, task_uuids: &[Uuid]) -> Result<Vec<Task>> {
        let rows = sqlx::query("SELECT * FROM berkas_tasks WHERE task_uuid = ANY($1)")
            .bind(task_uuids.to_vec())
            .fetch_all(&self.pool)
            .await?;

        let tasks: Vec<Task> = rows
            .iter()
            .map(task_from_row)
            .collect::<Result<Vec<_>>>()?;

        for uuid in task_uuids {
            if !tasks.iter().any(|t| t.task_uuid == *uuid) {
                return Err(CoreError::task_not_found(*uuid));
            }
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
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE berkas_tasks
            SET current_stage = $1,
                overall_status = $2,
                additional_data = $3,
                revised_info = $4,
                updated_at = NOW()
            WHERE task_uuid = $5
              AND current_stage = $6
              AND overall_status = $7
            RETURNING *
            "#,
        )
        .bind(outcome.stage.to_string())
        .bind(outcome.overall_status.to_string())
        .bind(serde_json::to_value(&outcome.sub_items)?)
        .bind(
            outcome
                .revised_info
                .as_ref()
                .map(serde_json::to_value)
                .transpose()?,
        )
        .bind(task_uuid)
        .bind(expected_stage.to_string())
        .bind(expected_status.to_string())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = updated else {
            tx.rollback().await?;
            // Condition failed: distinguish a missing task from a lost race.
            let current = self.fetch_task(task_uuid).await?;
            return Err(CoreError::StaleStage {
                task_uuid,
                expected: expected_stage,
                actual: current.current_stage,
            });
        };

        sqlx::query(
            r#"
            INSERT INTO berkas_approvals
                (approval_uuid, task_uuid, stage, status, approver_id, note,
                 approved_at, sort_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7,
                    (SELECT COALESCE(MAX(sort_key), 0) + 1
                     FROM berkas_approvals WHERE task_uuid = $2))
            "#,
        )
        .bind(outcome.record.approval_uuid)
        .bind(task_uuid)
        .bind(outcome.record.stage.to_string())
        .bind(outcome.record.status.to_string())
        .bind(&outcome.record.approver_id)
        .bind(&outcome.record.note)
        .bind(outcome.record.approved_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        task_from_row(&row)
    }

    async fn apply_resubmission(
        &self,
        task_uuid: Uuid,
        outcome: &ResubmitOutcome,
    ) -> Result<Task> {
        let updated = sqlx::query(
            r#"
            UPDATE berkas_tasks
            SET overall_status = $1,
                revised_info = $2,
                updated_at = NOW()
            WHERE task_uuid = $3
              AND overall_status = $4
            RETURNING *
            "#,
        )
        .bind(outcome.overall_status.to_string())
        .bind(
            outcome
                .revised_info
                .as_ref()
                .map(serde_json::to_value)
                .transpose()?,
        )
        .bind(task_uuid)
        .bind(OverallStatus::Revised.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(row) => task_from_row(&row),
            None => {
                let current = self.fetch_task(task_uuid).await?;
                Err(CoreError::StaleStage {
                    task_uuid,
                    expected: current.current_stage,
                    actual: current.current_stage,
                })
            }
        }
    }

    async fn stamp_export(
        &self,
        task_uuid: Uuid,
        batch_uuid: Uuid,
        sequence: i64,
        export_code: &str,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE berkas_tasks
            SET batch_uuid = $1, sequence = $2, export_code = $3, updated_at = NOW()
            WHERE task_uuid = $4
              AND (batch_uuid IS NULL OR batch_uuid = $1)
            "#,
        )
        .bind(batch_uuid)
        .bind(sequence)
        .bind(export_code)
        .bind(task_uuid)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.fetch_task(task_uuid).await?;
            return Err(CoreError::validation(format!(
                "task {task_uuid} already stamped under batch {:?}",
                current.batch_uuid
            )));
        }
        Ok(())
    }

    async fn assign_export_code(
        &self,
        task_uuid: Uuid,
        sequence: i64,
        export_code: &str,
    ) -> Result<Task> {
        let updated = sqlx::query(
            r#"
            UPDATE berkas_tasks
            SET sequence = $1, export_code = $2, updated_at = NOW()
            WHERE task_uuid = $3
              AND export_code IS NULL
            RETURNING *
            "#,
        )
        .bind(sequence)
        .bind(export_code)
        .bind(task_uuid)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(row) => task_from_row(&row),
            None => {
                // Either the task is missing or the code was already assigned.
                self.fetch_task(task_uuid).await?;
                Err(CoreError::validation(format!(
                    "task {task_uuid} already carries an export code"
                )))
            }
        }
    }

    async fn approvals(&self, task_uuid: Uuid) -> Result<Vec<ApprovalRecord>> {
        self.fetch_task(task_uuid).await?;

        let rows = sqlx::query(
            "SELECT * FROM berkas_approvals WHERE task_uuid = $1 ORDER BY sort_key ASC",
        )
        .bind(task_uuid)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(approval_from_row).collect()
    }
}

#[async_trait]
impl CounterStore for PgStore {
    async fn increment_sequence(&self, scope_key: &str) -> Result<i64> {
        // Find-or-create and increment in one atomic statement; concurrent
        // callers serialize on the row lock and each sees a distinct value.
        let row = sqlx::query(
            r#"
            INSERT INTO berkas_sequence_counters (scope_key, sequence)
            VALUES ($1, 1)
            ON CONFLICT (scope_key)
            DO UPDATE SET sequence = berkas_sequence_counters.sequence + 1
            RETURNING sequence
            "#,
        )
        .bind(scope_key)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("sequence")?)
    }

    async fn current_sequence(&self, scope_key: &str) -> Result<SequenceCounter> {
        let row = sqlx::query(
            "SELECT sequence FROM berkas_sequence_counters WHERE scope_key = $1",
        )
        .bind(scope_key)
        .fetch_optional(&self.pool)
        .await?;

        let mut counter = SequenceCounter::new(scope_key);
        if let Some(row) = row {
            counter.sequence = row.try_get("sequence")?;
        }
        Ok(counter)
    }
}

#[async_trait]
impl BatchStore for PgStore {
    async fn insert_batch(&self, batch: Batch) -> Result<Batch> {
        let row = sqlx::query(
            r#"
            INSERT INTO berkas_batches
                (batch_uuid, batch_code, scope_key, sequence, task_uuids,
                 status, document_url, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(batch.batch_uuid)
        .bind(&batch.batch_code)
        .bind(&batch.scope_key)
        .bind(batch.sequence)
        .bind(&batch.task_uuids)
        .bind(batch.status.to_string())
        .bind(&batch.document_url)
        .bind(batch.created_at)
        .fetch_one(&self.pool)
        .await?;

        batch_from_row(&row)
    }

    async fn fetch_batch(&self, batch_uuid: Uuid) -> Result<Batch> {
        let row = sqlx::query("SELECT * FROM berkas_batches WHERE batch_uuid = $1")
            .bind(batch_uuid)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CoreError::batch_not_found(batch_uuid))?;

        batch_from_row(&row)
    }

    async fn set_document_url(&self, batch_uuid: Uuid, url: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE berkas_batches SET document_url = $1 WHERE batch_uuid = $2",
        )
        .bind(url)
        .bind(batch_uuid)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::batch_not_found(batch_uuid));
        }
        Ok(())
    }

    async fn finalize_batch(&self, batch_uuid: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE berkas_batches SET status = $1 WHERE batch_uuid = $2 AND status = $3",
        )
        .bind(BatchStatus::Final.to_string())
        .bind(batch_uuid)
        .bind(BatchStatus::Draft.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Not a draft: already final is fine, void is not, missing is 404.
            let batch = self.fetch_batch(batch_uuid).await?;
            if batch.status != BatchStatus::Final {
                return Err(CoreError::validation(format!(
                    "batch {batch_uuid} is void and cannot be finalized"
                )));
            }
        }
        Ok(())
    }

    async fn void_batch(&self, batch_uuid: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE berkas_batches SET status = $1 WHERE batch_uuid = $2",
        )
        .bind(BatchStatus::Void.to_string())
        .bind(batch_uuid)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::batch_not_found(batch_uuid));
        }
        Ok(())
    }
}
