//! Per-scope sequence counters.

use serde::{Deserialize, Serialize};

/// One durable counter row per scope key (calendar year).
///
/// `sequence` is the last-issued value and starts at 0. The row is mutated
/// only through the store's atomic increment path; ordinary application code
/// never read-modify-writes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceCounter {
    pub scope_key: String,
    pub sequence: i64,
}

impl SequenceCounter {
    pub fn new(scope_key: impl Into<String>) -> Self {
        Self {
            scope_key: scope_key.into(),
            sequence: 0,
        }
    }
}
