//! External document renderer boundary.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Batch, Task};

/// Renders a batch's official document and hosts it, returning a durable
/// link. Implementations live outside the core (PDF generation, cloud file
/// hosting); the core only stores the returned link.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render(&self, batch: &Batch, tasks: &[Task]) -> Result<String>;
}

/// Renderer that produces a deterministic placeholder link. Useful in tests
/// and environments without the real document pipeline.
pub struct NoopRenderer;

#[async_trait]
impl DocumentRenderer for NoopRenderer {
    async fn render(&self, batch: &Batch, _tasks: &[Task]) -> Result<String> {
        Ok(format!("memory://batches/{}", batch.batch_uuid))
    }
}
