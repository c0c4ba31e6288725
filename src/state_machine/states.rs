use serde::{Deserialize, Serialize};
use std::fmt;

/// Processing stages in their fixed forward order.
///
/// The order is total and caller-agnostic: forward progression always moves to
/// the immediate next stage, never skips. `Stage::ORDER` is the single source
/// of truth; transition logic indexes into it rather than branching per stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Initial data entry
    Diinput,
    /// Arrangement of the dossier
    Ditata,
    /// Substantive review
    Diteliti,
    /// Archiving
    Diarsipkan,
    /// Dispatch to the issuing office
    Dikirim,
    /// Inspection
    Diperiksa,
    /// Done; terminal stage
    Selesai,
}

impl Stage {
    /// Fixed forward stage order. Configuration data, not control flow.
    pub const ORDER: [Stage; 7] = [
        Stage::Diinput,
        Stage::Ditata,
        Stage::Diteliti,
        Stage::Diarsipkan,
        Stage::Dikirim,
        Stage::Diperiksa,
        Stage::Selesai,
    ];

    /// Position of this stage within the fixed order.
    pub fn index(&self) -> usize {
        Self::ORDER
            .iter()
            .position(|s| s == self)
            .unwrap_or_default()
    }

    /// The immediate next stage, or `None` at the terminal stage.
    pub fn next(&self) -> Option<Stage> {
        Self::ORDER.get(self.index() + 1).copied()
    }

    /// Check if this is the terminal stage of the pipeline.
    pub fn is_final(&self) -> bool {
        self.next().is_none()
    }
}

impl Default for Stage {
    fn default() -> Self {
        Self::ORDER[0]
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Diinput => write!(f, "diinput"),
            Self::Ditata => write!(f, "ditata"),
            Self::Diteliti => write!(f, "diteliti"),
            Self::Diarsipkan => write!(f, "diarsipkan"),
            Self::Dikirim => write!(f, "dikirim"),
            Self::Diperiksa => write!(f, "diperiksa"),
            Self::Selesai => write!(f, "selesai"),
        }
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "diinput" => Ok(Self::Diinput),
            "ditata" => Ok(Self::Ditata),
            "diteliti" => Ok(Self::Diteliti),
            "diarsipkan" => Ok(Self::Diarsipkan),
            "dikirim" => Ok(Self::Dikirim),
            "diperiksa" => Ok(Self::Diperiksa),
            "selesai" => Ok(Self::Selesai),
            _ => Err(format!("Invalid stage: {s}")),
        }
    }
}

/// Derived overall status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    /// Task is moving through the pipeline
    InProgress,
    /// Terminal approval granted at the final stage
    Approved,
    /// Terminally rejected at some stage
    Rejected,
    /// Revision requested; recoverable via resubmission
    Revised,
}

impl OverallStatus {
    /// Check if this is a terminal status (no further decisions allowed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl Default for OverallStatus {
    fn default() -> Self {
        Self::InProgress
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress => write!(f, "in_progress"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
            Self::Revised => write!(f, "revised"),
        }
    }
}

impl std::str::FromStr for OverallStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(Self::InProgress),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "revised" => Ok(Self::Revised),
            _ => Err(format!("Invalid overall status: {s}")),
        }
    }
}

/// Status of a single sub-item ("pecahan").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubItemStatus {
    InProgress,
    Approved,
}

impl Default for SubItemStatus {
    fn default() -> Self {
        Self::InProgress
    }
}

impl fmt::Display for SubItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress => write!(f, "in_progress"),
            Self::Approved => write!(f, "approved"),
        }
    }
}

impl std::str::FromStr for SubItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(Self::InProgress),
            "approved" => Ok(Self::Approved),
            _ => Err(format!("Invalid sub-item status: {s}")),
        }
    }
}

/// Outcome recorded on an approval-ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Approved,
    Rejected,
    Revised,
}

impl fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
            Self::Revised => write!(f, "revised"),
        }
    }
}

impl std::str::FromStr for DecisionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "revised" => Ok(Self::Revised),
            _ => Err(format!("Invalid decision status: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_is_total() {
        for (i, stage) in Stage::ORDER.iter().enumerate() {
            assert_eq!(stage.index(), i);
        }
        assert_eq!(Stage::ORDER.len(), 7);
    }

    #[test]
    fn test_stage_forward_progression() {
        assert_eq!(Stage::Diinput.next(), Some(Stage::Ditata));
        assert_eq!(Stage::Ditata.next(), Some(Stage::Diteliti));
        assert_eq!(Stage::Diteliti.next(), Some(Stage::Diarsipkan));
        assert_eq!(Stage::Diarsipkan.next(), Some(Stage::Dikirim));
        assert_eq!(Stage::Dikirim.next(), Some(Stage::Diperiksa));
        assert_eq!(Stage::Diperiksa.next(), Some(Stage::Selesai));
        assert_eq!(Stage::Selesai.next(), None);
    }

    #[test]
    fn test_terminal_stage_check() {
        assert!(Stage::Selesai.is_final());
        for stage in &Stage::ORDER[..Stage::ORDER.len() - 1] {
            assert!(!stage.is_final());
        }
    }

    #[test]
    fn test_overall_status_terminal_check() {
        assert!(OverallStatus::Approved.is_terminal());
        assert!(OverallStatus::Rejected.is_terminal());
        assert!(!OverallStatus::InProgress.is_terminal());
        assert!(!OverallStatus::Revised.is_terminal());
    }

    #[test]
    fn test_state_string_conversion() {
        assert_eq!(Stage::Diperiksa.to_string(), "diperiksa");
        assert_eq!("selesai".parse::<Stage>().unwrap(), Stage::Selesai);
        assert!("done".parse::<Stage>().is_err());

        assert_eq!(OverallStatus::Revised.to_string(), "revised");
        assert_eq!(
            "in_progress".parse::<OverallStatus>().unwrap(),
            OverallStatus::InProgress
        );
    }

    #[test]
    fn test_state_serde() {
        let stage = Stage::Diarsipkan;
        let json = serde_json::to_string(&stage).unwrap();
        assert_eq!(json, "\"diarsipkan\"");

        let parsed: Stage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, stage);

        let status: SubItemStatus = serde_json::from_str("\"approved\"").unwrap();
        assert_eq!(status, SubItemStatus::Approved);
    }
}
