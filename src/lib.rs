#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Berkas Core
//!
//! Core engine for tracking permit/service requests ("berkas") through a
//! fixed sequence of approval stages, and for issuing the numbered batches
//! ("surat pengantar") those requests are exported under.
//!
//! ## Overview
//!
//! Two pieces carry the real invariants:
//!
//! - the **sequential approval state machine**: every stage requires an
//!   explicit operator decision; approvals advance exactly one stage,
//!   rejections are terminal, revision requests hold the stage until the
//!   owner resubmits, and the terminal approval is gated on every sub-item
//!   ("pecahan") being approved;
//! - the **atomic batch-numbering allocator**: per-year sequence numbers that
//!   are unique and strictly increasing even when many operators race, backed
//!   by a single counter row per scope mutated only through an atomic
//!   increment.
//!
//! Everything around them (rendering, file hosting, authentication, UI) is an
//! external collaborator behind a narrow trait.
//!
//! ## Module Organization
//!
//! - [`models`] - task records, approval ledger, batches, counters
//! - [`state_machine`] - pure stage-transition logic over closed enums
//! - [`sequence`] - the batch-number allocator
//! - [`orchestration`] - decision application and batch export
//! - [`storage`] - store contracts plus in-memory and Postgres backends
//! - [`authz`] - stage → allowed-roles lookup
//! - [`renderer`] - external document renderer boundary
//! - [`config`] - YAML configuration with environment overrides
//! - [`error`] - structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use berkas_core::config::CoreConfig;
//! use berkas_core::orchestration::DecisionProcessor;
//! use berkas_core::sequence::SequenceAllocator;
//! use berkas_core::state_machine::{Decision, Stage};
//! use berkas_core::storage::memory::InMemoryStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CoreConfig::default();
//! let store = Arc::new(InMemoryStore::new());
//! let allocator = SequenceAllocator::new(store.clone(), config.allocator.clone());
//! let processor = DecisionProcessor::new(store, allocator);
//!
//! # let task_uuid = uuid::Uuid::new_v4();
//! let task = processor
//!     .decide(task_uuid, &Decision::approve(Stage::Diinput, "op-1"))
//!     .await?;
//! println!("task advanced to {}", task.current_stage);
//! # Ok(())
//! # }
//! ```

pub mod authz;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod renderer;
pub mod sequence;
pub mod state_machine;
pub mod storage;

pub use config::{AllocatorConfig, CoreConfig, DatabaseConfig};
pub use error::{CoreError, Result};
pub use models::{ApprovalRecord, Batch, BatchStatus, NewTask, Task, TaskTitle};
pub use orchestration::{BatchExporter, BatchResult, DecisionProcessor};
pub use sequence::{Allocation, SequenceAllocator};
pub use state_machine::{
    Decision, DecisionAction, DecisionStatus, OverallStatus, Stage, SubItemStatus,
};
