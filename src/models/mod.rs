//! Data layer: task records, the approval ledger, batches, and counters.

pub mod approval;
pub mod batch;
pub mod sequence_counter;
pub mod task;

pub use approval::ApprovalRecord;
pub use batch::{Batch, BatchStatus};
pub use sequence_counter::SequenceCounter;
pub use task::{MainData, NewTask, RevisionInfo, SubItem, Task, TaskTitle};
