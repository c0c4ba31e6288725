// Sequential approval state machine.
//
// Pure transition logic over closed state enumerations; storage and
// authorization live elsewhere.

pub mod decide;
pub mod events;
pub mod states;

pub use decide::{decide, resubmit, DecisionOutcome, ResubmitOutcome};
pub use events::{Decision, DecisionAction, SubItemUpdate};
pub use states::{DecisionStatus, OverallStatus, Stage, SubItemStatus};
