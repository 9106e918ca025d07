//! Domain events emitted after state transitions commit.
//!
//! Delivery is best-effort: a full or closed channel is logged by the
//! emitting service and never fails the originating transition.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::ShipmentStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Order sheet events
    OrderSheetIssued(Uuid),
    OrderSheetSubmitted(Uuid),
    RevisionRequested(Uuid),
    OrderSheetConfirmed {
        sheet_id: Uuid,
        sales_order_id: Uuid,
    },
    OrderSheetDeleted(Uuid),

    // Fulfillment events
    SalesOrderCreated(Uuid),
    PurchaseOrderCreated(Uuid),
    PurchaseOrderIssued(Uuid),
    PurchaseOrderConfirmed(Uuid),

    // Dispatch events
    ShipmentCreated {
        shipment_id: Uuid,
        sales_order_id: Uuid,
    },
    ShipmentStatusChanged {
        shipment_id: Uuid,
        old_status: ShipmentStatus,
        new_status: ShipmentStatus,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Builds a sender together with the receiving half of its channel.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Event>) {
        let (sender, receiver) = mpsc::channel(buffer);
        (Self::new(sender), receiver)
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}
