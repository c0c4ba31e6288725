//! End-to-end approval flows against the in-memory store.

mod common;

use berkas_core::state_machine::{decide, Decision, Stage, SubItemStatus, SubItemUpdate};
use berkas_core::storage::TaskStore;
use berkas_core::{CoreError, DecisionStatus, OverallStatus, TaskTitle};
use common::{harness, new_task};

#[tokio::test]
async fn end_to_end_scenario() {
    let h = harness();
    let task = h
        .processor
        .create_task(new_task(TaskTitle::Pemecahan, 2), "2025")
        .await
        .unwrap();
    assert_eq!(task.current_stage, Stage::Diinput);
    assert_eq!(task.overall_status, OverallStatus::InProgress);
    // Pemecahan is numbered at export, not at creation.
    assert!(task.export_code.is_none());

    // Five approvals walk diinput -> ditata -> diteliti -> diarsipkan ->
    // dikirim -> diperiksa, one stage at a time.
    let mut current = Stage::Diinput;
    for expected_next in [
        Stage::Ditata,
        Stage::Diteliti,
        Stage::Diarsipkan,
        Stage::Dikirim,
        Stage::Diperiksa,
    ] {
        let updated = h
            .processor
            .decide(task.task_uuid, &Decision::approve(current, "admin-1"))
            .await
            .unwrap();
        assert_eq!(updated.current_stage, expected_next);
        assert_eq!(updated.overall_status, OverallStatus::InProgress);
        current = updated.current_stage;
    }

    // Sixth approval moves into the terminal stage; the gate does not fire
    // on the way in.
    let updated = h
        .processor
        .decide(task.task_uuid, &Decision::approve(Stage::Diperiksa, "admin-1"))
        .await
        .unwrap();
    assert_eq!(updated.current_stage, Stage::Selesai);
    assert_eq!(updated.overall_status, OverallStatus::InProgress);

    // Terminal approval with one of two sub-items still in progress fails.
    let partial = Decision::approve(Stage::Selesai, "kepala-1").with_item_updates(vec![
        SubItemUpdate {
            index: 0,
            status: SubItemStatus::Approved,
        },
    ]);
    let err = h.processor.decide(task.task_uuid, &partial).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::IncompleteSubItems { remaining: 1, .. }
    ));

    // With both approved the task finalizes; stage stays at selesai.
    let full = Decision::approve(Stage::Selesai, "kepala-1").with_item_updates(vec![
        SubItemUpdate {
            index: 0,
            status: SubItemStatus::Approved,
        },
        SubItemUpdate {
            index: 1,
            status: SubItemStatus::Approved,
        },
    ]);
    let finalized = h.processor.decide(task.task_uuid, &full).await.unwrap();
    assert_eq!(finalized.overall_status, OverallStatus::Approved);
    assert_eq!(finalized.current_stage, Stage::Selesai);

    // Ledger: one append-only row per decision, ordered by sort_key.
    let history = h.processor.approval_history(task.task_uuid).await.unwrap();
    assert_eq!(history.len(), 7);
    for (i, record) in history.iter().enumerate() {
        assert_eq!(record.sort_key, i as i32 + 1);
        assert_eq!(record.status, DecisionStatus::Approved);
    }
    assert_eq!(history[0].stage, Stage::Diinput);
    assert_eq!(history[6].stage, Stage::Selesai);

    // Terminal task accepts no further decisions.
    let err = h
        .processor
        .decide(
            task.task_uuid,
            &Decision::reject(Stage::Selesai, "kepala-1", "too late"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::TerminalState { .. }));
}

#[tokio::test]
async fn rejection_is_terminal_at_any_stage() {
    let h = harness();
    let task = h
        .processor
        .create_task(new_task(TaskTitle::MutasiPenuh, 0), "2025")
        .await
        .unwrap();

    h.processor
        .decide(task.task_uuid, &Decision::approve(Stage::Diinput, "op-1"))
        .await
        .unwrap();

    let rejected = h
        .processor
        .decide(
            task.task_uuid,
            &Decision::reject(Stage::Ditata, "koordinator-1", "duplicate request"),
        )
        .await
        .unwrap();
    assert_eq!(rejected.overall_status, OverallStatus::Rejected);
    assert_eq!(rejected.current_stage, Stage::Ditata);

    let err = h
        .processor
        .decide(task.task_uuid, &Decision::approve(Stage::Ditata, "op-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::TerminalState { .. }));
}

#[tokio::test]
async fn revision_round_trip_holds_stage() {
    let h = harness();
    let task = h
        .processor
        .create_task(new_task(TaskTitle::Penggabungan, 0), "2025")
        .await
        .unwrap();

    h.processor
        .decide(task.task_uuid, &Decision::approve(Stage::Diinput, "op-1"))
        .await
        .unwrap();
    h.processor
        .decide(task.task_uuid, &Decision::approve(Stage::Ditata, "koordinator-1"))
        .await
        .unwrap();

    let revised = h
        .processor
        .decide(
            task.task_uuid,
            &Decision::request_revision(Stage::Diteliti, "peneliti-1", "area figures disagree"),
        )
        .await
        .unwrap();
    assert_eq!(revised.overall_status, OverallStatus::Revised);
    assert_eq!(revised.current_stage, Stage::Diteliti);
    let info = revised.revised_info.as_ref().unwrap();
    assert!(!info.is_resolved);
    assert_eq!(info.stage, Stage::Diteliti);

    // Resubmission returns to in_progress at the same stage with the
    // snapshot marked resolved.
    let resubmitted = h.processor.resubmit(task.task_uuid).await.unwrap();
    assert_eq!(resubmitted.overall_status, OverallStatus::InProgress);
    assert_eq!(resubmitted.current_stage, Stage::Diteliti);
    assert!(resubmitted.revised_info.unwrap().is_resolved);

    // The same stage re-evaluates the corrected data.
    let advanced = h
        .processor
        .decide(task.task_uuid, &Decision::approve(Stage::Diteliti, "peneliti-1"))
        .await
        .unwrap();
    assert_eq!(advanced.current_stage, Stage::Diarsipkan);

    // Ledger recorded the revision too.
    let history = h.processor.approval_history(task.task_uuid).await.unwrap();
    let statuses: Vec<_> = history.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            DecisionStatus::Approved,
            DecisionStatus::Approved,
            DecisionStatus::Revised,
            DecisionStatus::Approved,
        ]
    );
}

#[tokio::test]
async fn concurrent_decides_from_stale_state_have_one_winner() {
    let h = harness();
    let task = h
        .processor
        .create_task(new_task(TaskTitle::MutasiSebagian, 0), "2025")
        .await
        .unwrap();

    // Both decisions are computed from the same snapshot, then raced against
    // the store's conditional update.
    let snapshot = h.store.fetch_task(task.task_uuid).await.unwrap();
    let d1 = Decision::approve(Stage::Diinput, "op-1");
    let d2 = Decision::approve(Stage::Diinput, "op-2");
    let o1 = decide(&snapshot, &d1).unwrap();
    let o2 = decide(&snapshot, &d2).unwrap();

    let (r1, r2) = tokio::join!(
        h.store.apply_decision(
            task.task_uuid,
            snapshot.current_stage,
            snapshot.overall_status,
            &o1,
        ),
        h.store.apply_decision(
            task.task_uuid,
            snapshot.current_stage,
            snapshot.overall_status,
            &o2,
        ),
    );

    let successes = [&r1, &r2].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one racing decider must win");

    let loser = if r1.is_err() { r1 } else { r2 };
    assert!(matches!(loser.unwrap_err(), CoreError::StaleStage { .. }));

    // The winner advanced exactly one stage and appended exactly one row.
    let current = h.store.fetch_task(task.task_uuid).await.unwrap();
    assert_eq!(current.current_stage, Stage::Ditata);
    let history = h.processor.approval_history(task.task_uuid).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn stale_decision_rejected_after_stage_moved() {
    let h = harness();
    let task = h
        .processor
        .create_task(new_task(TaskTitle::Aktivasi, 0), "2025")
        .await
        .unwrap();

    h.processor
        .decide(task.task_uuid, &Decision::approve(Stage::Diinput, "op-1"))
        .await
        .unwrap();

    // A decision built against the old stage fails with StaleStage.
    let err = h
        .processor
        .decide(task.task_uuid, &Decision::approve(Stage::Diinput, "op-2"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::StaleStage { .. }));
    assert_eq!(err.http_status(), 409);
}

#[tokio::test]
async fn creation_time_numbering_for_eligible_titles() {
    let h = harness();
    h.store.seed_counter("2025", 10);

    // Aktivasi draws its code at creation.
    let aktivasi = h
        .processor
        .create_task(new_task(TaskTitle::Aktivasi, 0), "2025")
        .await
        .unwrap();
    assert_eq!(aktivasi.sequence, Some(11));
    assert_eq!(
        aktivasi.export_code.as_deref(),
        Some("973/11-UPT.PD.WIL.IV/2025")
    );
    // No batch yet: creation numbering is not an export.
    assert!(aktivasi.batch_uuid.is_none());

    // Pemecahan does not.
    let pemecahan = h
        .processor
        .create_task(new_task(TaskTitle::Pemecahan, 2), "2025")
        .await
        .unwrap();
    assert!(pemecahan.export_code.is_none());
    assert!(pemecahan.sequence.is_none());
}
