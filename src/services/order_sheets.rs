//! Order-sheet lifecycle: the status state machine, item-set
//! replacement, totals recomputation, and the admin ↔ customer
//! confirmation/revision loop.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{
    line_item, Actor, LineItem, LineItemInput, OrderSheet, OrderSheetStatus, SalesOrder,
};
use crate::notifier::{self, Notifier, NotifyChannel, NotifyPayload, RecipientRef};
use crate::services::activation::ActivationGate;
use crate::services::fulfillment::FulfillmentService;
use crate::services::tokens::mint_token;
use crate::store::{Collection, EntityStore, EntityStoreExt, Filter, StoreError};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateOrderSheetRequest {
    pub customer_org_id: Option<Uuid>,

    #[validate(length(min = 1, max = 100, message = "Customer name is required"))]
    pub customer_name: String,

    pub ship_date: Option<NaiveDate>,

    pub cut_off_at: Option<DateTime<Utc>>,

    pub is_guest: bool,

    /// Issue straight into SENT instead of parking in DRAFT.
    pub issue_immediately: bool,

    pub items: Vec<LineItemInput>,

    pub admin_comment: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SubmitOrderSheetRequest {
    pub items: Vec<LineItemInput>,

    pub customer_comment: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ConfirmOrderSheetRequest {
    pub discount_amount: Decimal,

    /// Required when the confirmed items differ from the customer's
    /// submission.
    pub change_reason: Option<String>,
}

/// Result of a successful (or idempotently retried) confirmation.
#[derive(Debug, Clone)]
pub struct Confirmation {
    pub sheet: OrderSheet,
    pub sales_order: SalesOrder,
}

/// A discrete difference between the submitted snapshot and the
/// confirmed item set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ItemChange {
    Added {
        product_id: Uuid,
        product_name: String,
        qty: Decimal,
    },
    Removed {
        product_id: Uuid,
        product_name: String,
        qty: Decimal,
    },
    QuantityChanged {
        product_id: Uuid,
        product_name: String,
        from: Decimal,
        to: Decimal,
    },
    PriceChanged {
        product_id: Uuid,
        product_name: String,
        from: Decimal,
        to: Decimal,
    },
}

impl fmt::Display for ItemChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemChange::Added { product_name, qty, .. } => {
                write!(f, "{product_name}: added ({qty})")
            }
            ItemChange::Removed { product_name, qty, .. } => {
                write!(f, "{product_name}: removed ({qty})")
            }
            ItemChange::QuantityChanged { product_name, from, to, .. } => {
                write!(f, "{product_name}: quantity {from} -> {to}")
            }
            ItemChange::PriceChanged { product_name, from, to, .. } => {
                write!(f, "{product_name}: price {from} -> {to}")
            }
        }
    }
}

fn grouped(items: &[LineItem]) -> (Vec<Uuid>, HashMap<Uuid, VecDeque<&LineItem>>) {
    let mut order = Vec::new();
    let mut groups: HashMap<Uuid, VecDeque<&LineItem>> = HashMap::new();
    for item in items {
        let slot = groups.entry(item.product_id).or_default();
        if slot.is_empty() {
            order.push(item.product_id);
        }
        slot.push_back(item);
    }
    (order, groups)
}

/// Diffs two ordered item sets into tagged change records.
///
/// Occurrences of the same product id are paired in order, so a
/// product listed twice diffs position-for-position instead of
/// collapsing into one ambiguous record.
pub fn diff_items(before: &[LineItem], after: &[LineItem]) -> Vec<ItemChange> {
    let (before_order, mut before_groups) = grouped(before);
    let (after_order, mut after_groups) = grouped(after);

    let mut changes = Vec::new();

    for product_id in before_order {
        let mut olds = before_groups.remove(&product_id).unwrap_or_default();
        let mut news = after_groups.remove(&product_id).unwrap_or_default();
        while let Some(old) = olds.pop_front() {
            match news.pop_front() {
                Some(new) => {
                    if old.qty_requested != new.qty_requested || old.unit != new.unit {
                        changes.push(ItemChange::QuantityChanged {
                            product_id,
                            product_name: new.product_name.clone(),
                            from: old.qty_requested,
                            to: new.qty_requested,
                        });
                    }
                    if old.unit_price != new.unit_price {
                        changes.push(ItemChange::PriceChanged {
                            product_id,
                            product_name: new.product_name.clone(),
                            from: old.unit_price,
                            to: new.unit_price,
                        });
                    }
                }
                None => changes.push(ItemChange::Removed {
                    product_id,
                    product_name: old.product_name.clone(),
                    qty: old.qty_requested,
                }),
            }
        }
        for new in news {
            changes.push(ItemChange::Added {
                product_id,
                product_name: new.product_name.clone(),
                qty: new.qty_requested,
            });
        }
    }

    for product_id in after_order {
        if let Some(news) = after_groups.remove(&product_id) {
            for new in news {
                changes.push(ItemChange::Added {
                    product_id,
                    product_name: new.product_name.clone(),
                    qty: new.qty_requested,
                });
            }
        }
    }

    changes
}

/// Service owning the order-sheet state machine.
#[derive(Clone)]
pub struct OrderSheetService {
    store: Arc<dyn EntityStore>,
    notifier: Arc<dyn Notifier>,
    event_sender: Option<Arc<EventSender>>,
    fulfillment: FulfillmentService,
    gate: ActivationGate,
    token_length: usize,
}

impl OrderSheetService {
    pub fn new(
        store: Arc<dyn EntityStore>,
        notifier: Arc<dyn Notifier>,
        event_sender: Option<Arc<EventSender>>,
        fulfillment: FulfillmentService,
        token_length: usize,
    ) -> Self {
        Self {
            store,
            notifier,
            event_sender,
            fulfillment,
            gate: ActivationGate::new(),
            token_length,
        }
    }

    /// Creates a sheet in DRAFT, or directly in SENT when
    /// `issue_immediately` is set. The access token is minted here and
    /// never changes afterwards.
    #[instrument(skip(self, request), fields(customer_name = %request.customer_name))]
    pub async fn create_order_sheet(
        &self,
        request: CreateOrderSheetRequest,
    ) -> Result<OrderSheet, ServiceError> {
        request.validate()?;
        if request.is_guest && request.customer_org_id.is_some() {
            return Err(ServiceError::ValidationError(
                "a guest sheet cannot belong to a customer organization".to_string(),
            ));
        }
        check_items(&request.items)?;

        let now = Utc::now();
        let status = if request.issue_immediately {
            OrderSheetStatus::Sent
        } else {
            OrderSheetStatus::Draft
        };
        let mut sheet = OrderSheet {
            id: Uuid::new_v4(),
            customer_org_id: request.customer_org_id,
            customer_name: request.customer_name,
            status,
            access_token: mint_token(self.token_length),
            ship_date: request.ship_date,
            cut_off_at: request.cut_off_at,
            discount_amount: Decimal::ZERO,
            admin_comment: request.admin_comment,
            customer_comment: None,
            change_reason: None,
            is_guest: request.is_guest,
            items: request.items.into_iter().map(LineItem::from).collect(),
            submitted_items: Vec::new(),
            total_kg: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            created_at: now,
            updated_at: None,
            version: 1,
        };
        sheet.recompute_totals();

        self.store.insert_doc(Collection::OrderSheets, &sheet).await?;
        info!(sheet_id = %sheet.id, status = %sheet.status, "order sheet created");

        if status == OrderSheetStatus::Sent {
            self.notify_customer_issued(&sheet).await;
            self.emit(Event::OrderSheetIssued(sheet.id)).await;
        }
        Ok(sheet)
    }

    /// DRAFT → SENT. Allowed only with an access token present.
    #[instrument(skip(self), fields(sheet_id = %sheet_id))]
    pub async fn issue_order_sheet(&self, sheet_id: Uuid) -> Result<OrderSheet, ServiceError> {
        let sheet = self.fetch(sheet_id).await?;
        if sheet.access_token.is_empty() {
            return Err(ServiceError::ValidationError(
                "an access token is required before issuing".to_string(),
            ));
        }
        ensure_transition(&sheet, OrderSheetStatus::Sent)?;

        let mut updated = sheet.clone();
        updated.status = OrderSheetStatus::Sent;
        touch(&mut updated);
        self.store
            .update_doc(Collection::OrderSheets, sheet_id, sheet.version, &updated)
            .await?;

        info!("order sheet issued");
        self.notify_customer_issued(&updated).await;
        self.emit(Event::OrderSheetIssued(sheet_id)).await;
        Ok(updated)
    }

    /// {SENT, REVISION} → SUBMITTED. Replaces the full item set
    /// atomically and snapshots it for confirm-time diffing.
    #[instrument(skip(self, actor, request), fields(sheet_id = %sheet_id))]
    pub async fn submit_order_sheet(
        &self,
        sheet_id: Uuid,
        actor: Option<&Actor>,
        request: SubmitOrderSheetRequest,
    ) -> Result<OrderSheet, ServiceError> {
        request.validate()?;
        if request.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "an order needs at least one line".to_string(),
            ));
        }
        check_items(&request.items)?;

        let sheet = self.fetch(sheet_id).await?;
        self.gate.ensure_may_mutate(actor, &sheet)?;
        ensure_transition(&sheet, OrderSheetStatus::Submitted)?;

        let items: Vec<LineItem> = request.items.into_iter().map(LineItem::from).collect();
        if !items.iter().any(|item| item.estimated_kg > Decimal::ZERO) {
            return Err(ServiceError::ValidationError(
                "at least one line must carry a positive estimated weight".to_string(),
            ));
        }

        let mut updated = sheet.clone();
        updated.items = items.clone();
        updated.submitted_items = items;
        if request.customer_comment.is_some() {
            updated.customer_comment = request.customer_comment;
        }
        updated.status = OrderSheetStatus::Submitted;
        updated.recompute_totals();
        touch(&mut updated);
        self.store
            .update_doc(Collection::OrderSheets, sheet_id, sheet.version, &updated)
            .await?;

        info!(total_amount = %updated.total_amount, "order sheet submitted");
        notifier::send_best_effort(
            self.notifier.as_ref(),
            NotifyChannel::KakaoTalk,
            RecipientRef::OpsDesk,
            NotifyPayload::OrderSheetSubmitted {
                sheet_id,
                customer_name: updated.customer_name.clone(),
            },
        )
        .await;
        self.emit(Event::OrderSheetSubmitted(sheet_id)).await;
        Ok(updated)
    }

    /// Operator-side item edit in any non-CONFIRMED state. Does not
    /// change status; the submitted snapshot stays as-is so the
    /// confirm-time diff still describes operator adjustments.
    #[instrument(skip(self, items), fields(sheet_id = %sheet_id))]
    pub async fn update_items(
        &self,
        sheet_id: Uuid,
        items: Vec<LineItemInput>,
    ) -> Result<OrderSheet, ServiceError> {
        check_items(&items)?;

        let sheet = self.fetch(sheet_id).await?;
        if sheet.status.is_terminal() {
            return Err(ServiceError::ValidationError(
                "a confirmed sheet no longer accepts item edits".to_string(),
            ));
        }

        let mut updated = sheet.clone();
        updated.items = items.into_iter().map(LineItem::from).collect();
        updated.recompute_totals();
        touch(&mut updated);
        self.store
            .update_doc(Collection::OrderSheets, sheet_id, sheet.version, &updated)
            .await?;
        Ok(updated)
    }

    /// SUBMITTED → REVISION, with the comment surfaced to the token
    /// holder.
    #[instrument(skip(self, comment), fields(sheet_id = %sheet_id))]
    pub async fn request_revision(
        &self,
        sheet_id: Uuid,
        comment: &str,
    ) -> Result<OrderSheet, ServiceError> {
        let comment = comment.trim();
        if comment.is_empty() {
            return Err(ServiceError::ValidationError(
                "a revision comment is required".to_string(),
            ));
        }

        let sheet = self.fetch(sheet_id).await?;
        ensure_transition(&sheet, OrderSheetStatus::Revision)?;

        let mut updated = sheet.clone();
        updated.status = OrderSheetStatus::Revision;
        updated.admin_comment = Some(comment.to_string());
        touch(&mut updated);
        self.store
            .update_doc(Collection::OrderSheets, sheet_id, sheet.version, &updated)
            .await?;

        info!("revision requested");
        notifier::send_best_effort(
            self.notifier.as_ref(),
            NotifyChannel::KakaoTalk,
            self.customer_recipient(&updated),
            NotifyPayload::RevisionRequested {
                sheet_id,
                comment: comment.to_string(),
            },
        )
        .await;
        self.emit(Event::RevisionRequested(sheet_id)).await;
        Ok(updated)
    }

    /// SUBMITTED → CONFIRMED, then exactly one sales-order conversion.
    ///
    /// Safe to retry: confirming an already-CONFIRMED sheet is a
    /// no-op success that returns the existing sales order, and a lost
    /// confirm race degrades to that same path.
    #[instrument(skip(self, actor, request), fields(sheet_id = %sheet_id))]
    pub async fn confirm_order_sheet(
        &self,
        sheet_id: Uuid,
        actor: Option<&Actor>,
        request: ConfirmOrderSheetRequest,
    ) -> Result<Confirmation, ServiceError> {
        request.validate()?;
        if request.discount_amount < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "discount must not be negative".to_string(),
            ));
        }

        let sheet = self.fetch(sheet_id).await?;
        self.gate.ensure_may_mutate(actor, &sheet)?;

        if sheet.status == OrderSheetStatus::Confirmed {
            let sales_order = self.fulfillment.create_sales_order_from_sheet(&sheet).await?;
            return Ok(Confirmation { sheet, sales_order });
        }
        ensure_transition(&sheet, OrderSheetStatus::Confirmed)?;

        let changes = diff_items(&sheet.submitted_items, &sheet.items);
        let reason = request
            .change_reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty());
        if !changes.is_empty() && reason.is_none() {
            return Err(ServiceError::ValidationError(
                "a change reason is required when the confirmed items differ from the submission"
                    .to_string(),
            ));
        }

        let mut updated = sheet.clone();
        // Discount may never exceed the item total; clamp rather than
        // reject, and floor the resulting total at zero.
        updated.discount_amount = request
            .discount_amount
            .min(line_item::gross_amount(&updated.items));
        if let Some(reason) = reason {
            updated.change_reason = Some(reason.to_string());
        }
        updated.status = OrderSheetStatus::Confirmed;
        updated.recompute_totals();
        touch(&mut updated);

        match self
            .store
            .update_doc(Collection::OrderSheets, sheet_id, sheet.version, &updated)
            .await
        {
            Ok(()) => {}
            Err(StoreError::VersionConflict { .. }) => {
                // Lost the race. If the winner confirmed, this call
                // degrades to the idempotent path instead of failing.
                let fresh = self.fetch(sheet_id).await?;
                if fresh.status == OrderSheetStatus::Confirmed {
                    let sales_order =
                        self.fulfillment.create_sales_order_from_sheet(&fresh).await?;
                    return Ok(Confirmation { sheet: fresh, sales_order });
                }
                return Err(ServiceError::ConcurrentModification(sheet_id));
            }
            Err(e) => return Err(e.into()),
        }

        if !changes.is_empty() {
            let described: Vec<String> = changes.iter().map(ToString::to_string).collect();
            info!(changes = ?described, "confirmed with operator adjustments");
        }

        let sales_order = self.fulfillment.create_sales_order_from_sheet(&updated).await?;
        info!(sales_order_id = %sales_order.id, total_amount = %sales_order.total_amount, "order sheet confirmed");

        notifier::send_best_effort(
            self.notifier.as_ref(),
            NotifyChannel::KakaoTalk,
            self.customer_recipient(&updated),
            NotifyPayload::OrderSheetConfirmed {
                sheet_id,
                total_amount: updated.total_amount,
            },
        )
        .await;
        self.emit(Event::OrderSheetConfirmed {
            sheet_id,
            sales_order_id: sales_order.id,
        })
        .await;

        Ok(Confirmation { sheet: updated, sales_order })
    }

    /// Removes a sheet in any non-CONFIRMED state. Confirmed sheets
    /// stay for the audit trail.
    #[instrument(skip(self), fields(sheet_id = %sheet_id))]
    pub async fn delete_order_sheet(&self, sheet_id: Uuid) -> Result<(), ServiceError> {
        let sheet = self.fetch(sheet_id).await?;
        if sheet.status.is_terminal() {
            return Err(ServiceError::invalid_transition(
                "order_sheet",
                sheet.status,
                "DELETED",
            ));
        }

        self.store.delete(Collection::OrderSheets, sheet_id).await?;
        info!("order sheet deleted");
        self.emit(Event::OrderSheetDeleted(sheet_id)).await;
        Ok(())
    }

    #[instrument(skip(self), fields(sheet_id = %sheet_id))]
    pub async fn get_order_sheet(&self, sheet_id: Uuid) -> Result<OrderSheet, ServiceError> {
        self.fetch(sheet_id).await
    }

    /// Sheets issued to a customer organization.
    #[instrument(skip(self), fields(customer_org_id = %customer_org_id))]
    pub async fn list_for_customer(
        &self,
        customer_org_id: Uuid,
    ) -> Result<Vec<OrderSheet>, ServiceError> {
        Ok(self
            .store
            .query_as(Collection::OrderSheets, Filter::ByOrgId(customer_org_id))
            .await?)
    }

    /// Sheets sitting in one lifecycle state, e.g. the review queue of
    /// SUBMITTED sheets.
    #[instrument(skip(self), fields(status = %status))]
    pub async fn list_by_status(
        &self,
        status: OrderSheetStatus,
    ) -> Result<Vec<OrderSheet>, ServiceError> {
        Ok(self
            .store
            .query_as(
                Collection::OrderSheets,
                Filter::ByStatus(status.to_string()),
            )
            .await?)
    }

    async fn fetch(&self, sheet_id: Uuid) -> Result<OrderSheet, ServiceError> {
        self.store
            .get_as::<OrderSheet>(Collection::OrderSheets, sheet_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order_sheets {sheet_id} not found")))
    }

    fn customer_recipient(&self, sheet: &OrderSheet) -> RecipientRef {
        match sheet.customer_org_id {
            Some(org_id) => RecipientRef::Org(org_id),
            None => RecipientRef::Direct(sheet.customer_name.clone()),
        }
    }

    async fn notify_customer_issued(&self, sheet: &OrderSheet) {
        notifier::send_best_effort(
            self.notifier.as_ref(),
            NotifyChannel::KakaoTalk,
            self.customer_recipient(sheet),
            NotifyPayload::OrderSheetIssued {
                sheet_id: sheet.id,
                access_token: sheet.access_token.clone(),
            },
        )
        .await;
    }

    async fn emit(&self, event: Event) {
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, "failed to send order sheet event");
            }
        }
    }
}

fn ensure_transition(sheet: &OrderSheet, to: OrderSheetStatus) -> Result<(), ServiceError> {
    if !sheet.status.can_transition_to(to) {
        return Err(ServiceError::invalid_transition(
            "order_sheet",
            sheet.status,
            to,
        ));
    }
    Ok(())
}

fn check_items(items: &[LineItemInput]) -> Result<(), ServiceError> {
    for item in items {
        item.validate()?;
        item.check_ranges().map_err(ServiceError::ValidationError)?;
    }
    Ok(())
}

fn touch(sheet: &mut OrderSheet) {
    sheet.updated_at = Some(Utc::now());
    sheet.version += 1;
}
