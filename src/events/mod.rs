use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::entities::production_order::ProductionOrderStatus;

/// Events emitted by the fulfillment core. Consumers (projections, audit log,
/// downstream notifications) subscribe out-of-process; emission is
/// fire-and-forget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderProcessingStarted(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    ProductionOrderCreated {
        production_order_id: Uuid,
        order_id: Uuid,
        supplier_id: Uuid,
    },
    ProductionOrderStatusChanged {
        production_order_id: Uuid,
        old_status: ProductionOrderStatus,
        new_status: ProductionOrderStatus,
    },
    QcCheckRecorded {
        production_order_id: Uuid,
        passed: bool,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Creates a connected sender/receiver pair with a bounded channel.
pub fn event_channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}
