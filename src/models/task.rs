//! Task entity: a single permit/service request moving through the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::state_machine::states::{OverallStatus, Stage, SubItemStatus};

/// Closed enumeration of request types.
///
/// The title determines whether the batch number is drawn at creation time or
/// deferred to batch export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskTitle {
    /// Activation of a dormant record
    Aktivasi,
    /// Partial transfer of the object
    MutasiSebagian,
    /// Full transfer of the object
    MutasiPenuh,
    /// Split into sub-parcels
    Pemecahan,
    /// Merge of parcels
    Penggabungan,
    /// Change of registered holder
    BalikNama,
}

impl TaskTitle {
    /// Titles that receive their export code at creation rather than at batch
    /// export. The allocation is still an explicit allocator call, never a
    /// save-side-effect.
    pub fn numbered_at_creation(&self) -> bool {
        matches!(self, Self::Aktivasi | Self::BalikNama)
    }
}

impl fmt::Display for TaskTitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aktivasi => write!(f, "aktivasi"),
            Self::MutasiSebagian => write!(f, "mutasi_sebagian"),
            Self::MutasiPenuh => write!(f, "mutasi_penuh"),
            Self::Pemecahan => write!(f, "pemecahan"),
            Self::Penggabungan => write!(f, "penggabungan"),
            Self::BalikNama => write!(f, "balik_nama"),
        }
    }
}

impl std::str::FromStr for TaskTitle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aktivasi" => Ok(Self::Aktivasi),
            "mutasi_sebagian" => Ok(Self::MutasiSebagian),
            "mutasi_penuh" => Ok(Self::MutasiPenuh),
            "pemecahan" => Ok(Self::Pemecahan),
            "penggabungan" => Ok(Self::Penggabungan),
            "balik_nama" => Ok(Self::BalikNama),
            _ => Err(format!("Invalid task title: {s}")),
        }
    }
}

/// Immutable business payload describing the primary subject.
///
/// Not part of the state machine; edits to it only matter as the trigger for
/// resubmission after a revision request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainData {
    /// Applicant name
    pub name: String,
    /// National identity number
    pub nik: String,
    /// Tax object number of the parcel
    pub nop: String,
    pub address: String,
    /// Prior land area in square meters
    pub land_area: f64,
    /// Prior building area in square meters
    pub building_area: f64,
}

/// One sub-division ("pecahan") of the original object, independently
/// markable as approved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubItem {
    pub name: String,
    pub land_area: f64,
    pub building_area: f64,
    #[serde(default)]
    pub add_status: SubItemStatus,
}

/// Snapshot of the last revision request raised against a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionInfo {
    /// Stage at which revision was requested; the task holds here
    pub stage: Stage,
    pub note: Option<String>,
    pub approver_id: String,
    pub requested_at: DateTime<Utc>,
    /// Set once the owner edits and resubmits
    pub is_resolved: bool,
}

/// A permit/service request tracked through the fixed stage pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_uuid: Uuid,
    pub title: TaskTitle,
    pub main_data: MainData,
    /// Ordered sub-items; all must be approved before terminal finalization
    #[serde(default)]
    pub additional_data: Vec<SubItem>,
    pub current_stage: Stage,
    pub overall_status: OverallStatus,
    #[serde(default)]
    pub revised_info: Option<RevisionInfo>,
    /// Issued sequence number, if any; assigned exactly once
    #[serde(default)]
    pub sequence: Option<i64>,
    /// Human-readable issued code; stable once set
    #[serde(default)]
    pub export_code: Option<String>,
    /// Batch this task was exported under, if any
    #[serde(default)]
    pub batch_uuid: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Whether this task has already been stamped into a batch.
    pub fn is_batched(&self) -> bool {
        self.batch_uuid.is_some()
    }

    /// Count of sub-items not yet approved.
    pub fn unapproved_sub_items(&self) -> usize {
        self.additional_data
            .iter()
            .filter(|item| item.add_status != SubItemStatus::Approved)
            .count()
    }
}

/// Request payload for creating a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub title: TaskTitle,
    pub main_data: MainData,
    #[serde(default)]
    pub additional_data: Vec<SubItem>,
}
