pub mod order_processor;
pub mod queue;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Enqueue contract for one order-processing job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderJob {
    pub order_id: Uuid,
    pub order_number: String,
}

impl OrderJob {
    /// Deduplication key: enqueueing the same order while a job with this
    /// key is pending or active is a no-op for the caller.
    pub fn dedup_key(&self) -> String {
        format!("order-{}", self.order_id)
    }
}
