//! Service layer: one struct per component of the order workflow.

pub mod activation;
pub mod dispatch;
pub mod fulfillment;
pub mod order_sheets;
pub mod tokens;

pub use activation::ActivationGate;
pub use dispatch::DispatchService;
pub use fulfillment::FulfillmentService;
pub use order_sheets::OrderSheetService;
pub use tokens::TokenAccessResolver;
