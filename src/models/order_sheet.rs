use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::line_item::{self, LineItem};

/// Lifecycle states of a customer-facing order sheet.
///
/// CONFIRMED is terminal; DRAFT and SENT are the two entry states,
/// depending on whether the sheet is issued immediately.
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
pub enum OrderSheetStatus {
    Draft,
    Sent,
    Revision,
    Submitted,
    Confirmed,
}

impl OrderSheetStatus {
    /// Whether a sheet may move from `self` to `next`.
    pub fn can_transition_to(self, next: OrderSheetStatus) -> bool {
        use OrderSheetStatus::*;
        matches!(
            (self, next),
            (Draft, Sent)
                | (Sent, Submitted)
                | (Revision, Submitted)
                | (Submitted, Revision)
                | (Submitted, Confirmed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderSheetStatus::Confirmed)
    }
}

/// One issued order document, exchanged with a customer or guest
/// through its access token. Line items are embedded so an item-set
/// replacement plus the status write land in a single document write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSheet {
    pub id: Uuid,
    /// Owning customer organization; `None` for guest orders.
    pub customer_org_id: Option<Uuid>,
    pub customer_name: String,
    pub status: OrderSheetStatus,
    /// Opaque single-use token; unique and never reassigned.
    pub access_token: String,
    pub ship_date: Option<NaiveDate>,
    /// Deadline instant. Enforced by callers rendering the sheet, not
    /// by token validity.
    pub cut_off_at: Option<DateTime<Utc>>,
    pub discount_amount: Decimal,
    pub admin_comment: Option<String>,
    pub customer_comment: Option<String>,
    /// Operator's reason for confirming with items that differ from
    /// the customer's submission.
    pub change_reason: Option<String>,
    pub is_guest: bool,
    pub items: Vec<LineItem>,
    /// Snapshot of the item set at the last submit, diffed against
    /// `items` when the operator confirms.
    pub submitted_items: Vec<LineItem>,
    pub total_kg: Decimal,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

impl OrderSheet {
    /// Recomputes the denormalized totals from the current item set,
    /// flooring the discounted total at zero.
    pub fn recompute_totals(&mut self) {
        self.total_kg = line_item::total_estimated_kg(&self.items);
        self.total_amount = line_item::net_amount(&self.items, self.discount_amount);
    }
}
