//! Conversion of confirmed order sheets into sales orders, and the
//! supplier-facing purchase-order side of fulfillment.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{
    line_item, LineItem, LineItemInput, OrderSheet, OrderSheetStatus, PurchaseOrder,
    PurchaseOrderStatus, SalesOrder, SalesOrderStatus,
};
use crate::notifier::{self, Notifier, NotifyChannel, NotifyPayload, RecipientRef};
use crate::services::tokens::mint_token;
use crate::store::{Collection, EntityStore, EntityStoreExt, StoreError};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreatePurchaseOrderRequest {
    pub supplier_id: Uuid,

    #[validate(length(min = 1, max = 100, message = "Supplier name is required"))]
    pub supplier_name: String,

    pub items: Vec<LineItemInput>,

    pub expected_arrival_date: Option<NaiveDate>,

    pub memo: Option<String>,
}

/// Service converting confirmed sheets into fulfillment documents.
#[derive(Clone)]
pub struct FulfillmentService {
    store: Arc<dyn EntityStore>,
    notifier: Arc<dyn Notifier>,
    event_sender: Option<Arc<EventSender>>,
    token_length: usize,
}

impl FulfillmentService {
    pub fn new(
        store: Arc<dyn EntityStore>,
        notifier: Arc<dyn Notifier>,
        event_sender: Option<Arc<EventSender>>,
        token_length: usize,
    ) -> Self {
        Self {
            store,
            notifier,
            event_sender,
            token_length,
        }
    }

    /// Creates the sales order for a confirmed sheet.
    ///
    /// Idempotent: the sales-order id is a pure function of the sheet
    /// id, so a retried or raced conversion finds (or collides with)
    /// the already-created document and returns it unchanged.
    #[instrument(skip(self, sheet), fields(sheet_id = %sheet.id))]
    pub async fn create_sales_order_from_sheet(
        &self,
        sheet: &OrderSheet,
    ) -> Result<SalesOrder, ServiceError> {
        if sheet.status != OrderSheetStatus::Confirmed {
            return Err(ServiceError::ValidationError(
                "only a confirmed order sheet can be converted to a sales order".to_string(),
            ));
        }

        let id = SalesOrder::id_for_sheet(sheet.id);
        if let Some(existing) = self
            .store
            .get_as::<SalesOrder>(Collection::SalesOrders, id)
            .await?
        {
            return Ok(existing);
        }

        let now = Utc::now();
        let order = SalesOrder {
            id,
            source_order_sheet_id: sheet.id,
            customer_org_id: sheet.customer_org_id,
            customer_name: sheet.customer_name.clone(),
            total_kg: line_item::total_estimated_kg(&sheet.items),
            total_amount: line_item::net_amount(&sheet.items, sheet.discount_amount),
            status: SalesOrderStatus::Created,
            active_shipment_id: None,
            created_at: now,
            confirmed_at: now,
            version: 1,
        };

        match self.store.insert_doc(Collection::SalesOrders, &order).await {
            Ok(()) => {
                info!(sales_order_id = %order.id, total_amount = %order.total_amount, "sales order created");
                self.emit(Event::SalesOrderCreated(order.id)).await;
                Ok(order)
            }
            Err(StoreError::DuplicateKey { .. }) => {
                // Lost a creation race; the first writer's document stands.
                self.store
                    .get_as::<SalesOrder>(Collection::SalesOrders, id)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("sales_orders {id} not found"))
                    })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Creates a supplier purchase order. Independent of any sales
    /// order; driven by supplier-side replenishment.
    #[instrument(skip(self, request), fields(supplier_id = %request.supplier_id))]
    pub async fn create_purchase_order(
        &self,
        request: CreatePurchaseOrderRequest,
    ) -> Result<PurchaseOrder, ServiceError> {
        request.validate()?;
        if request.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "a purchase order needs at least one line".to_string(),
            ));
        }
        for item in &request.items {
            item.validate()?;
            item.check_ranges().map_err(ServiceError::ValidationError)?;
        }

        let items: Vec<LineItem> = request.items.into_iter().map(LineItem::from).collect();
        let now = Utc::now();
        let order = PurchaseOrder {
            id: Uuid::new_v4(),
            supplier_id: request.supplier_id,
            supplier_name: request.supplier_name,
            status: PurchaseOrderStatus::Draft,
            total_kg: line_item::total_estimated_kg(&items),
            total_amount: line_item::gross_amount(&items),
            items,
            access_token: mint_token(self.token_length),
            expected_arrival_date: request.expected_arrival_date,
            memo: request.memo,
            created_at: now,
            updated_at: None,
            version: 1,
        };

        self.store
            .insert_doc(Collection::PurchaseOrders, &order)
            .await?;
        info!(purchase_order_id = %order.id, "purchase order created");
        self.emit(Event::PurchaseOrderCreated(order.id)).await;
        Ok(order)
    }

    /// Sends a draft purchase order to its supplier.
    #[instrument(skip(self), fields(purchase_order_id = %id))]
    pub async fn issue_purchase_order(&self, id: Uuid) -> Result<PurchaseOrder, ServiceError> {
        let order = self.fetch(id).await?;
        if !order.status.can_transition_to(PurchaseOrderStatus::Sent) {
            return Err(ServiceError::invalid_transition(
                "purchase_order",
                order.status,
                PurchaseOrderStatus::Sent,
            ));
        }

        let mut updated = order.clone();
        updated.status = PurchaseOrderStatus::Sent;
        updated.updated_at = Some(Utc::now());
        updated.version += 1;
        self.store
            .update_doc(Collection::PurchaseOrders, order.id, order.version, &updated)
            .await?;

        notifier::send_best_effort(
            self.notifier.as_ref(),
            NotifyChannel::KakaoTalk,
            RecipientRef::Org(order.supplier_id),
            NotifyPayload::PurchaseOrderIssued {
                purchase_order_id: order.id,
                access_token: order.access_token.clone(),
            },
        )
        .await;
        self.emit(Event::PurchaseOrderIssued(order.id)).await;
        Ok(updated)
    }

    /// Supplier confirmation, reached through the purchase order's
    /// access token.
    #[instrument(skip(self), fields(purchase_order_id = %id))]
    pub async fn confirm_purchase_order(
        &self,
        id: Uuid,
        expected_arrival_date: Option<NaiveDate>,
        memo: Option<String>,
    ) -> Result<PurchaseOrder, ServiceError> {
        let order = self.fetch(id).await?;
        if !order.status.can_transition_to(PurchaseOrderStatus::Confirmed) {
            return Err(ServiceError::invalid_transition(
                "purchase_order",
                order.status,
                PurchaseOrderStatus::Confirmed,
            ));
        }

        let mut updated = order.clone();
        updated.status = PurchaseOrderStatus::Confirmed;
        if expected_arrival_date.is_some() {
            updated.expected_arrival_date = expected_arrival_date;
        }
        if memo.is_some() {
            updated.memo = memo;
        }
        updated.updated_at = Some(Utc::now());
        updated.version += 1;
        self.store
            .update_doc(Collection::PurchaseOrders, order.id, order.version, &updated)
            .await?;

        info!(purchase_order_id = %id, "purchase order confirmed");
        self.emit(Event::PurchaseOrderConfirmed(id)).await;
        Ok(updated)
    }

    async fn fetch(&self, id: Uuid) -> Result<PurchaseOrder, ServiceError> {
        self.store
            .get_as::<PurchaseOrder>(Collection::PurchaseOrders, id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("purchase_orders {id} not found")))
    }

    async fn emit(&self, event: Event) {
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, "failed to send fulfillment event");
            }
        }
    }
}
