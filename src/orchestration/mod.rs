// Request-scoped orchestration over the pure core: decision application and
// batch export.

pub mod batch_exporter;
pub mod decision_processor;

pub use batch_exporter::{BatchExporter, BatchResult};
pub use decision_processor::DecisionProcessor;
