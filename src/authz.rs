//! Stage-to-role authorization lookup.
//!
//! A single table consulted by the API boundary before a [`Decision`] is
//! constructed. The state machine itself stays role-agnostic; it accepts a
//! pre-validated decision and never re-derives authorization.
//!
//! [`Decision`]: crate::state_machine::Decision

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::state_machine::Stage;

/// Operator roles. `Admin` may decide at every stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Operator,
    Koordinator,
    Peneliti,
    Arsiparis,
    Kurir,
    Pemeriksa,
    Kepala,
}

/// The stage → allowed-roles table.
pub struct StageRoleMatrix {
    allowed: HashMap<Stage, Vec<Role>>,
}

impl Default for StageRoleMatrix {
    fn default() -> Self {
        let allowed = HashMap::from([
            (Stage::Diinput, vec![Role::Operator]),
            (Stage::Ditata, vec![Role::Koordinator]),
            (Stage::Diteliti, vec![Role::Peneliti]),
            (Stage::Diarsipkan, vec![Role::Arsiparis]),
            (Stage::Dikirim, vec![Role::Kurir]),
            (Stage::Diperiksa, vec![Role::Pemeriksa]),
            (Stage::Selesai, vec![Role::Kepala]),
        ]);
        Self { allowed }
    }
}

impl StageRoleMatrix {
    /// Build a custom matrix, e.g. from configuration.
    pub fn new(allowed: HashMap<Stage, Vec<Role>>) -> Self {
        Self { allowed }
    }

    /// Whether `role` may decide at `stage`.
    pub fn can_decide(&self, role: Role, stage: Stage) -> bool {
        if role == Role::Admin {
            return true;
        }
        self.allowed
            .get(&stage)
            .is_some_and(|roles| roles.contains(&role))
    }

    /// Roles allowed to decide at `stage`.
    pub fn required_roles(&self, stage: Stage) -> &[Role] {
        self.allowed.get(&stage).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matrix_covers_all_stages() {
        let matrix = StageRoleMatrix::default();
        for stage in Stage::ORDER {
            assert!(
                !matrix.required_roles(stage).is_empty(),
                "stage {stage} has no roles"
            );
        }
    }

    #[test]
    fn test_role_stage_lookup() {
        let matrix = StageRoleMatrix::default();
        assert!(matrix.can_decide(Role::Peneliti, Stage::Diteliti));
        assert!(!matrix.can_decide(Role::Peneliti, Stage::Dikirim));
        assert!(!matrix.can_decide(Role::Operator, Stage::Selesai));
    }

    #[test]
    fn test_admin_decides_everywhere() {
        let matrix = StageRoleMatrix::default();
        for stage in Stage::ORDER {
            assert!(matrix.can_decide(Role::Admin, stage));
        }
    }
}
