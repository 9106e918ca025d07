use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentStatus {
    Preparing,
    InTransit,
    Delivered,
}

impl ShipmentStatus {
    /// One-way advancement; no state may be skipped.
    pub fn can_transition_to(self, next: ShipmentStatus) -> bool {
        use ShipmentStatus::*;
        matches!((self, next), (Preparing, InTransit) | (InTransit, Delivered))
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ShipmentStatus::Delivered)
    }
}

/// Dispatch and delivery record for one sales order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shipment {
    pub id: Uuid,
    pub source_sales_order_id: Uuid,
    /// Carrier organization for 3PL dispatch; `None` when the operator
    /// assigned a vehicle directly.
    pub carrier_org_id: Option<Uuid>,
    pub status: ShipmentStatus,
    pub vehicle_number: Option<String>,
    pub driver_name: Option<String>,
    pub driver_phone: Option<String>,
    pub eta_at: Option<DateTime<Utc>>,
    /// Issued only for 3PL dispatch so the carrier can fill in vehicle
    /// and driver details without an account.
    pub dispatcher_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}
