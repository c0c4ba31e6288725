//! Batch records: groups of tasks issued together under one sequence number.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle of a batch record. A batch is `draft` from insertion until
/// every covered task carries its stamp, then `final`. A voided batch keeps
/// its code (codes are never reused) but is excluded from reprint resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Draft,
    Final,
    Void,
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Final => write!(f, "final"),
            Self::Void => write!(f, "void"),
        }
    }
}

impl std::str::FromStr for BatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "final" => Ok(Self::Final),
            "void" => Ok(Self::Void),
            _ => Err(format!("Invalid batch status: {s}")),
        }
    }
}

/// One issuance event: a set of tasks stamped under a single sequence number.
///
/// The `task_uuids` set is the source of truth for what the batch covers;
/// reconciliation compares it against the stamps actually present on tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub batch_uuid: Uuid,
    /// Human-readable issued code; byte-stable once created
    pub batch_code: String,
    pub scope_key: String,
    pub sequence: i64,
    pub task_uuids: Vec<Uuid>,
    pub status: BatchStatus,
    /// Durable link returned by the external renderer, once available
    #[serde(default)]
    pub document_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Batch {
    pub fn new(
        batch_code: impl Into<String>,
        scope_key: impl Into<String>,
        sequence: i64,
        task_uuids: Vec<Uuid>,
    ) -> Self {
        Self {
            batch_uuid: Uuid::new_v4(),
            batch_code: batch_code.into(),
            scope_key: scope_key.into(),
            sequence,
            task_uuids,
            status: BatchStatus::Draft,
            document_url: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_status_round_trip() {
        for status in [BatchStatus::Draft, BatchStatus::Final, BatchStatus::Void] {
            assert_eq!(status.to_string().parse::<BatchStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_new_batch_starts_as_draft() {
        let ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        let batch = Batch::new("973/5-UPT.PD.WIL.IV/2025", "2025", 5, ids.clone());
        assert_eq!(batch.status, BatchStatus::Draft);
        assert_eq!(batch.task_uuids, ids);
        assert!(batch.document_url.is_none());
    }
}
