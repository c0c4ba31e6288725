//! Shared fixtures for the integration suite. Everything runs against the
//! in-memory store, so no database is required.
#![allow(dead_code)]

use std::sync::Arc;

use berkas_core::config::AllocatorConfig;
use berkas_core::models::task::{MainData, SubItem};
use berkas_core::models::NewTask;
use berkas_core::orchestration::{BatchExporter, DecisionProcessor};
use berkas_core::sequence::SequenceAllocator;
use berkas_core::state_machine::{Decision, Stage, SubItemStatus, SubItemUpdate};
use berkas_core::storage::memory::InMemoryStore;
use berkas_core::storage::Storage;
use berkas_core::{OverallStatus, Task, TaskTitle};
use uuid::Uuid;

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub processor: DecisionProcessor<InMemoryStore>,
    pub exporter: BatchExporter<InMemoryStore>,
}

pub fn harness() -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let config = AllocatorConfig::default();
    let processor = DecisionProcessor::new(
        store.clone(),
        SequenceAllocator::new(store.clone(), config.clone()),
    );
    let exporter = BatchExporter::new(
        store.clone(),
        SequenceAllocator::new(store.clone(), config),
    );
    Harness {
        store,
        processor,
        exporter,
    }
}

pub fn new_task(title: TaskTitle, sub_items: usize) -> NewTask {
    NewTask {
        title,
        main_data: MainData {
            name: "Dewi Lestari".to_string(),
            nik: "3515124504880004".to_string(),
            nop: "35.15.120.012.004-0310.0".to_string(),
            address: "Jl. Mawar 17".to_string(),
            land_area: 500.0,
            building_area: 110.0,
        },
        additional_data: (0..sub_items)
            .map(|i| SubItem {
                name: format!("Pecahan {}", i + 1),
                land_area: 500.0 / sub_items.max(1) as f64,
                building_area: 110.0 / sub_items.max(1) as f64,
                add_status: SubItemStatus::InProgress,
            })
            .collect(),
    }
}

/// Drive a task through every stage to terminal approval, approving all
/// sub-items alongside the final decision.
pub async fn approve_to_completion<S: Storage + ?Sized>(
    processor: &DecisionProcessor<S>,
    task_uuid: Uuid,
    sub_items: usize,
) -> Task {
    let mut current = Stage::Diinput;
    loop {
        let mut decision = Decision::approve(current, "admin-1");
        if current == Stage::Selesai {
            decision = decision.with_item_updates(
                (0..sub_items)
                    .map(|index| SubItemUpdate {
                        index,
                        status: SubItemStatus::Approved,
                    })
                    .collect(),
            );
        }

        let updated = processor.decide(task_uuid, &decision).await.unwrap();
        if updated.overall_status == OverallStatus::Approved {
            return updated;
        }
        current = updated.current_stage;
    }
}
