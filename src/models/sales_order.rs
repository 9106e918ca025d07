use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
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
pub enum SalesOrderStatus {
    Created,
    PoGenerated,
    Shipped,
    Completed,
    Cancelled,
}

/// The binding, post-confirmation order. Totals are immutable once
/// created; any change requires a new document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesOrder {
    pub id: Uuid,
    pub source_order_sheet_id: Uuid,
    pub customer_org_id: Option<Uuid>,
    pub customer_name: String,
    pub total_kg: Decimal,
    pub total_amount: Decimal,
    pub status: SalesOrderStatus,
    /// The one non-terminal shipment attached to this order, if any.
    /// Dispatch exclusivity is enforced by CAS on this field.
    pub active_shipment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: DateTime<Utc>,
    pub version: i32,
}

impl SalesOrder {
    /// Deterministic id for the sales order converted from a sheet.
    ///
    /// Confirmation is exactly-once because a second conversion attempt
    /// collides on this id instead of minting a sibling document.
    pub fn id_for_sheet(sheet_id: Uuid) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, sheet_id.as_bytes())
    }
}
