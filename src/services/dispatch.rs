//! Dispatch coordination: attaching shipments to sales orders and
//! tracking them to delivery.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{SalesOrder, SalesOrderStatus, Shipment, ShipmentStatus};
use crate::notifier::{self, Notifier, NotifyChannel, NotifyPayload, RecipientRef};
use crate::services::tokens::mint_token;
use crate::store::{Collection, EntityStore, EntityStoreExt, Filter, StoreError};

/// Operator-entered vehicle assignment for direct dispatch.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct DirectDispatchRequest {
    pub sales_order_id: Uuid,

    #[validate(length(min = 1, max = 20, message = "Vehicle number is required"))]
    pub vehicle_number: String,

    #[validate(length(min = 1, max = 100, message = "Driver name is required"))]
    pub driver_name: String,

    #[validate(length(min = 1, max = 30, message = "Driver phone is required"))]
    pub driver_phone: String,

    pub eta_at: Option<DateTime<Utc>>,
}

/// Delegation to a third-party carrier; vehicle and driver are filled
/// in later by the carrier through the dispatcher token.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ThirdPartyDispatchRequest {
    pub sales_order_id: Uuid,

    pub carrier_org_id: Uuid,

    /// ETA the operator asks the carrier to meet.
    pub eta_requested_at: Option<DateTime<Utc>>,
}

/// Carrier-entered details completing a 3PL dispatch.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct DispatchDetailsRequest {
    #[validate(length(min = 1, max = 20, message = "Vehicle number is required"))]
    pub vehicle_number: String,

    #[validate(length(min = 1, max = 100, message = "Driver name is required"))]
    pub driver_name: String,

    #[validate(length(min = 1, max = 30, message = "Driver phone is required"))]
    pub driver_phone: String,

    pub eta_at: Option<DateTime<Utc>>,
}

/// Service for creating and advancing shipments.
#[derive(Clone)]
pub struct DispatchService {
    store: Arc<dyn EntityStore>,
    notifier: Arc<dyn Notifier>,
    event_sender: Option<Arc<EventSender>>,
    token_length: usize,
}

impl DispatchService {
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

    /// Creates a PREPARING shipment with the vehicle assigned by the
    /// operator.
    #[instrument(skip(self, request), fields(sales_order_id = %request.sales_order_id))]
    pub async fn dispatch_direct(
        &self,
        request: DirectDispatchRequest,
    ) -> Result<Shipment, ServiceError> {
        request.validate()?;

        let now = Utc::now();
        let shipment = Shipment {
            id: Uuid::new_v4(),
            source_sales_order_id: request.sales_order_id,
            carrier_org_id: None,
            status: ShipmentStatus::Preparing,
            vehicle_number: Some(request.vehicle_number),
            driver_name: Some(request.driver_name),
            driver_phone: Some(request.driver_phone),
            eta_at: request.eta_at,
            dispatcher_token: None,
            created_at: now,
            updated_at: None,
            version: 1,
        };

        let shipment = self.attach(shipment).await?;
        info!(shipment_id = %shipment.id, "direct dispatch created");
        self.emit(Event::ShipmentCreated {
            shipment_id: shipment.id,
            sales_order_id: shipment.source_sales_order_id,
        })
        .await;
        Ok(shipment)
    }

    /// Creates a PREPARING shipment delegated to a carrier and mints
    /// the dispatcher token the carrier completes it with.
    #[instrument(skip(self, request), fields(sales_order_id = %request.sales_order_id, carrier_org_id = %request.carrier_org_id))]
    pub async fn dispatch_via_3pl(
        &self,
        request: ThirdPartyDispatchRequest,
    ) -> Result<Shipment, ServiceError> {
        request.validate()?;

        let token = mint_token(self.token_length);
        let now = Utc::now();
        let shipment = Shipment {
            id: Uuid::new_v4(),
            source_sales_order_id: request.sales_order_id,
            carrier_org_id: Some(request.carrier_org_id),
            status: ShipmentStatus::Preparing,
            vehicle_number: None,
            driver_name: None,
            driver_phone: None,
            eta_at: request.eta_requested_at,
            dispatcher_token: Some(token.clone()),
            created_at: now,
            updated_at: None,
            version: 1,
        };

        let shipment = self.attach(shipment).await?;
        info!(shipment_id = %shipment.id, "3PL dispatch requested");
        notifier::send_best_effort(
            self.notifier.as_ref(),
            NotifyChannel::KakaoTalk,
            RecipientRef::Org(request.carrier_org_id),
            NotifyPayload::DispatchRequested {
                shipment_id: shipment.id,
                dispatcher_token: token,
            },
        )
        .await;
        self.emit(Event::ShipmentCreated {
            shipment_id: shipment.id,
            sales_order_id: shipment.source_sales_order_id,
        })
        .await;
        Ok(shipment)
    }

    /// Carrier fills in vehicle and driver details through the
    /// dispatcher token. Only possible while the shipment is still
    /// PREPARING.
    #[instrument(skip(self, token, request))]
    pub async fn complete_dispatch_via_token(
        &self,
        token: &str,
        request: DispatchDetailsRequest,
    ) -> Result<Shipment, ServiceError> {
        request.validate()?;

        let mut hits = self
            .store
            .query_as::<Shipment>(Collection::Shipments, Filter::ByToken(token.to_string()))
            .await?;
        let shipment = hits.pop().ok_or_else(|| {
            ServiceError::NotFound("no shipment for the presented dispatcher token".to_string())
        })?;

        if shipment.status != ShipmentStatus::Preparing {
            return Err(ServiceError::ValidationError(format!(
                "dispatch details can only be completed while the shipment is PREPARING (currently {})",
                shipment.status
            )));
        }

        let mut updated = shipment.clone();
        updated.vehicle_number = Some(request.vehicle_number);
        updated.driver_name = Some(request.driver_name);
        updated.driver_phone = Some(request.driver_phone);
        if request.eta_at.is_some() {
            updated.eta_at = request.eta_at;
        }
        updated.updated_at = Some(Utc::now());
        updated.version += 1;
        self.store
            .update_doc(Collection::Shipments, shipment.id, shipment.version, &updated)
            .await?;

        info!(shipment_id = %shipment.id, "dispatch details completed by carrier");
        Ok(updated)
    }

    /// Advances a shipment one step along PREPARING → IN_TRANSIT →
    /// DELIVERED.
    #[instrument(skip(self), fields(shipment_id = %shipment_id, new_status = %new_status))]
    pub async fn advance_shipment_status(
        &self,
        shipment_id: Uuid,
        new_status: ShipmentStatus,
    ) -> Result<Shipment, ServiceError> {
        let shipment = self
            .store
            .get_as::<Shipment>(Collection::Shipments, shipment_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("shipments {shipment_id} not found")))?;

        if !shipment.status.can_transition_to(new_status) {
            return Err(ServiceError::invalid_transition(
                "shipment",
                shipment.status,
                new_status,
            ));
        }

        let mut updated = shipment.clone();
        updated.status = new_status;
        updated.updated_at = Some(Utc::now());
        updated.version += 1;
        self.store
            .update_doc(Collection::Shipments, shipment_id, shipment.version, &updated)
            .await?;

        info!(old_status = %shipment.status, "shipment status advanced");
        self.emit(Event::ShipmentStatusChanged {
            shipment_id,
            old_status: shipment.status,
            new_status,
        })
        .await;

        self.mirror_sales_order(&updated).await;

        if new_status == ShipmentStatus::Delivered {
            notifier::send_best_effort(
                self.notifier.as_ref(),
                NotifyChannel::Email,
                RecipientRef::OpsDesk,
                NotifyPayload::ShipmentDelivered { shipment_id },
            )
            .await;
        }
        Ok(updated)
    }

    /// Inserts a shipment and points the sales order's active-shipment
    /// anchor at it. The anchor CAS is what makes dispatch exclusive:
    /// losing it means another dispatch got there first.
    async fn attach(&self, shipment: Shipment) -> Result<Shipment, ServiceError> {
        let sales_order = self
            .store
            .get_as::<SalesOrder>(Collection::SalesOrders, shipment.source_sales_order_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "sales_orders {} not found",
                    shipment.source_sales_order_id
                ))
            })?;

        if let Some(active_id) = sales_order.active_shipment_id {
            match self
                .store
                .get_as::<Shipment>(Collection::Shipments, active_id)
                .await?
            {
                Some(active) if !active.status.is_terminal() => {
                    return Err(ServiceError::DuplicateDispatch(sales_order.id));
                }
                // Stale anchor (delivered or deleted shipment); a new
                // dispatch may replace it.
                _ => {}
            }
        }

        self.store.insert_doc(Collection::Shipments, &shipment).await?;

        let mut updated = sales_order.clone();
        updated.active_shipment_id = Some(shipment.id);
        updated.version += 1;
        match self
            .store
            .update_doc(
                Collection::SalesOrders,
                sales_order.id,
                sales_order.version,
                &updated,
            )
            .await
        {
            Ok(()) => Ok(shipment),
            Err(StoreError::VersionConflict { .. }) => {
                // Lost the anchor race; roll the orphan shipment back.
                let _ = self.store.delete(Collection::Shipments, shipment.id).await;
                let fresh = self
                    .store
                    .get_as::<SalesOrder>(Collection::SalesOrders, sales_order.id)
                    .await?;
                match fresh {
                    Some(f) if f.active_shipment_id.is_some() => {
                        Err(ServiceError::DuplicateDispatch(sales_order.id))
                    }
                    _ => Err(ServiceError::ConcurrentModification(sales_order.id)),
                }
            }
            Err(e) => {
                let _ = self.store.delete(Collection::Shipments, shipment.id).await;
                Err(e.into())
            }
        }
    }

    /// Projects shipment progress onto the sales order: SHIPPED when
    /// in transit, COMPLETED (and anchor cleared) when delivered. The
    /// shipment write is the committing step; a lost projection write
    /// is logged and repaired by the next dispatch or delivery read.
    async fn mirror_sales_order(&self, shipment: &Shipment) {
        let target_status = match shipment.status {
            ShipmentStatus::InTransit => SalesOrderStatus::Shipped,
            ShipmentStatus::Delivered => SalesOrderStatus::Completed,
            ShipmentStatus::Preparing => return,
        };

        let sales_order = match self
            .store
            .get_as::<SalesOrder>(Collection::SalesOrders, shipment.source_sales_order_id)
            .await
        {
            Ok(Some(order)) => order,
            Ok(None) => {
                warn!(sales_order_id = %shipment.source_sales_order_id, "sales order missing for shipment projection");
                return;
            }
            Err(e) => {
                warn!(error = %e, "failed to read sales order for shipment projection");
                return;
            }
        };

        let mut updated = sales_order.clone();
        updated.status = target_status;
        if shipment.status.is_terminal() {
            updated.active_shipment_id = None;
        }
        updated.version += 1;
        if let Err(e) = self
            .store
            .update_doc(
                Collection::SalesOrders,
                sales_order.id,
                sales_order.version,
                &updated,
            )
            .await
        {
            warn!(error = %e, sales_order_id = %sales_order.id, "sales order status projection failed");
        }
    }

    async fn emit(&self, event: Event) {
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, "failed to send dispatch event");
            }
        }
    }
}
