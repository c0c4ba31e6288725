//! Property-based checks of the stage-ordering invariant.

use berkas_core::models::task::{MainData, Task};
use berkas_core::state_machine::{decide, resubmit, Decision, DecisionAction, Stage};
use berkas_core::{CoreError, OverallStatus, TaskTitle};
use chrono::Utc;
use proptest::prelude::*;
use uuid::Uuid;

fn base_task() -> Task {
    Task {
        task_uuid: Uuid::new_v4(),
        title: TaskTitle::MutasiPenuh,
        main_data: MainData {
            name: "Rina Kartika".to_string(),
            nik: "3515125205910005".to_string(),
            nop: "35.15.120.012.005-0412.0".to_string(),
            address: "Jl. Anggrek 3".to_string(),
            land_area: 300.0,
            building_area: 80.0,
        },
        additional_data: Vec::new(),
        current_stage: Stage::Diinput,
        overall_status: OverallStatus::InProgress,
        revised_info: None,
        sequence: None,
        export_code: None,
        batch_uuid: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn arb_action() -> impl Strategy<Value = DecisionAction> {
    prop_oneof![
        // Approvals dominate so walks regularly reach the terminal stage.
        4 => Just(DecisionAction::Approve),
        1 => Just(DecisionAction::Reject),
        2 => Just(DecisionAction::RequestRevision),
    ]
}

proptest! {
    /// Whatever sequence of decisions is applied, the stage is always a
    /// member of the fixed order and only ever moves to the immediate next
    /// stage; rejection and revision hold the stage in place.
    #[test]
    fn stage_never_skips_or_regresses(actions in prop::collection::vec(arb_action(), 1..40)) {
        let mut task = base_task();

        for action in actions {
            let before = task.current_stage;
            let decision = Decision {
                stage: before,
                action,
                approver_id: "prop-op".to_string(),
                note: Some("property walk".to_string()),
                item_updates: Vec::new(),
            };

            match decide(&task, &decision) {
                Ok(outcome) => {
                    let delta = outcome.stage.index() as i64 - before.index() as i64;
                    match action {
                        DecisionAction::Approve => prop_assert!(delta == 0 || delta == 1),
                        _ => prop_assert_eq!(delta, 0),
                    }
                    prop_assert!(Stage::ORDER.contains(&outcome.stage));

                    task.current_stage = outcome.stage;
                    task.overall_status = outcome.overall_status;
                    task.revised_info = outcome.revised_info;

                    // Recover from revision so the walk can continue.
                    if task.overall_status == OverallStatus::Revised {
                        let resubmitted = resubmit(&task).unwrap();
                        task.overall_status = resubmitted.overall_status;
                        task.revised_info = resubmitted.revised_info;
                        prop_assert_eq!(task.current_stage, before);
                    }

                    if task.overall_status.is_terminal() {
                        break;
                    }
                }
                Err(CoreError::TerminalState { .. }) => break,
                // No sub-items on this task, so the gate cannot fire and no
                // decision here is stale.
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }
        }

        prop_assert!(Stage::ORDER.contains(&task.current_stage));
    }
}
