//! Persisted domain documents and their status machines.

pub mod actor;
pub mod line_item;
pub mod order_sheet;
pub mod purchase_order;
pub mod sales_order;
pub mod shipment;

pub use actor::{Actor, ActorRole, ActorStatus};
pub use line_item::{LineItem, LineItemInput, OrderUnit};
pub use order_sheet::{OrderSheet, OrderSheetStatus};
pub use purchase_order::{PurchaseOrder, PurchaseOrderStatus};
pub use sales_order::{SalesOrder, SalesOrderStatus};
pub use shipment::{Shipment, ShipmentStatus};
