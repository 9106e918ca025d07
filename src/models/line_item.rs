use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Measurement unit a line is ordered in.
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
pub enum OrderUnit {
    Kg,
    Box,
}

/// One line of an order document as entered by the counterparty.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LineItemInput {
    pub product_id: Uuid,

    #[validate(length(min = 1, max = 200, message = "Product name is required"))]
    pub product_name: String,

    pub unit: OrderUnit,

    pub qty_requested: Decimal,

    /// Kilograms per box; only consulted for BOX lines.
    #[serde(default = "default_box_factor")]
    pub box_to_kg_factor: Decimal,

    pub unit_price: Decimal,
}

fn default_box_factor() -> Decimal {
    dec!(1)
}

impl LineItemInput {
    /// Range checks `validator` does not cover for `Decimal` fields.
    pub fn check_ranges(&self) -> Result<(), String> {
        if self.qty_requested < Decimal::ZERO {
            return Err(format!("{}: quantity must not be negative", self.product_name));
        }
        if self.unit_price < Decimal::ZERO {
            return Err(format!("{}: unit price must not be negative", self.product_name));
        }
        if self.unit == OrderUnit::Box && self.box_to_kg_factor <= Decimal::ZERO {
            return Err(format!(
                "{}: box-to-kg factor must be positive for BOX lines",
                self.product_name
            ));
        }
        Ok(())
    }
}

/// A computed line of an order sheet or purchase order.
///
/// `estimated_kg` and `amount` are derived at write time and stored
/// denormalized with the parent document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: Uuid,
    pub product_name: String,
    pub unit: OrderUnit,
    pub qty_requested: Decimal,
    pub box_to_kg_factor: Decimal,
    pub unit_price: Decimal,
    pub estimated_kg: Decimal,
    pub amount: Decimal,
}

impl From<LineItemInput> for LineItem {
    fn from(input: LineItemInput) -> Self {
        let estimated_kg = match input.unit {
            OrderUnit::Kg => input.qty_requested,
            OrderUnit::Box => input.qty_requested * input.box_to_kg_factor,
        };
        let amount = estimated_kg * input.unit_price;
        Self {
            product_id: input.product_id,
            product_name: input.product_name,
            unit: input.unit,
            qty_requested: input.qty_requested,
            box_to_kg_factor: input.box_to_kg_factor,
            unit_price: input.unit_price,
            estimated_kg,
            amount,
        }
    }
}

pub fn total_estimated_kg(items: &[LineItem]) -> Decimal {
    items.iter().map(|item| item.estimated_kg).sum()
}

pub fn gross_amount(items: &[LineItem]) -> Decimal {
    items.iter().map(|item| item.amount).sum()
}

/// Sum of line amounts minus the discount, floored at zero.
pub fn net_amount(items: &[LineItem], discount: Decimal) -> Decimal {
    (gross_amount(items) - discount).max(Decimal::ZERO)
}
