//! Outbound push contract (KakaoTalk / email gateways behind it).
//!
//! Notification is fire-and-forget and explicitly decoupled from
//! transactional correctness: services send through
//! [`send_best_effort`], which logs failures and never propagates
//! them into the originating state transition.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum NotifyChannel {
    KakaoTalk,
    Email,
}

/// Addressing for a notification recipient. Resolution to an actual
/// phone number or mailbox happens in the delivery layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RecipientRef {
    /// A customer / carrier / supplier organization.
    Org(Uuid),
    /// Free-form contact for guest counterparties.
    Direct(String),
    /// The operator back office.
    OpsDesk,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NotifyPayload {
    OrderSheetIssued {
        sheet_id: Uuid,
        access_token: String,
    },
    OrderSheetSubmitted {
        sheet_id: Uuid,
        customer_name: String,
    },
    RevisionRequested {
        sheet_id: Uuid,
        comment: String,
    },
    OrderSheetConfirmed {
        sheet_id: Uuid,
        total_amount: Decimal,
    },
    PurchaseOrderIssued {
        purchase_order_id: Uuid,
        access_token: String,
    },
    DispatchRequested {
        shipment_id: Uuid,
        dispatcher_token: String,
    },
    ShipmentDelivered {
        shipment_id: Uuid,
    },
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        channel: NotifyChannel,
        recipient: RecipientRef,
        payload: NotifyPayload,
    ) -> Result<(), NotifyError>;
}

/// Default notifier that records deliveries in the log stream only.
#[derive(Debug, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(
        &self,
        channel: NotifyChannel,
        recipient: RecipientRef,
        payload: NotifyPayload,
    ) -> Result<(), NotifyError> {
        info!(%channel, ?recipient, ?payload, "notification dispatched");
        Ok(())
    }
}

/// Sends without letting delivery failures reach the caller.
pub(crate) async fn send_best_effort(
    notifier: &dyn Notifier,
    channel: NotifyChannel,
    recipient: RecipientRef,
    payload: NotifyPayload,
) {
    if let Err(e) = notifier.notify(channel, recipient, payload).await {
        warn!(error = %e, "notification delivery failed");
    }
}
