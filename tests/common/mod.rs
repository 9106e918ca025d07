//! Shared harness for integration tests: services wired over the
//! in-memory store with a recording notifier and a drained event
//! channel.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use meatflow_api::config::AppConfig;
use meatflow_api::events::{Event, EventSender};
use meatflow_api::models::{
    Actor, ActorRole, ActorStatus, LineItemInput, OrderSheet, OrderUnit, SalesOrder,
};
use meatflow_api::notifier::{Notifier, NotifyChannel, NotifyError, NotifyPayload, RecipientRef};
use meatflow_api::services::order_sheets::{
    Confirmation, ConfirmOrderSheetRequest, CreateOrderSheetRequest, SubmitOrderSheetRequest,
};
use meatflow_api::store::InMemoryStore;
use meatflow_api::AppServices;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Notifier that records every delivery for assertions and can be
/// flipped into a failing gateway.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(NotifyChannel, RecipientRef, NotifyPayload)>>,
    pub fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn fail_deliveries(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn payloads(&self) -> Vec<NotifyPayload> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, _, payload)| payload.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        channel: NotifyChannel,
        recipient: RecipientRef,
        payload: NotifyPayload,
    ) -> Result<(), NotifyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Delivery("gateway unavailable".to_string()));
        }
        self.sent.lock().unwrap().push((channel, recipient, payload));
        Ok(())
    }
}

pub struct TestApp {
    pub services: AppServices,
    pub store: Arc<InMemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub events: Mutex<mpsc::Receiver<Event>>,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let config = AppConfig::default();
        let (event_sender, receiver) = EventSender::channel(config.event_buffer);
        let services = AppServices::new(
            store.clone(),
            notifier.clone(),
            Some(Arc::new(event_sender)),
            &config,
        );
        Self {
            services,
            store,
            notifier,
            events: Mutex::new(receiver),
        }
    }

    /// Drains events buffered so far.
    pub fn drain_events(&self) -> Vec<Event> {
        let mut receiver = self.events.lock().unwrap();
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    pub async fn sent_sheet(&self, items: Vec<LineItemInput>) -> OrderSheet {
        self.services
            .order_sheets
            .create_order_sheet(CreateOrderSheetRequest {
                customer_org_id: Some(Uuid::new_v4()),
                customer_name: "Daehan Meats".to_string(),
                ship_date: None,
                cut_off_at: None,
                is_guest: false,
                issue_immediately: true,
                items,
                admin_comment: None,
            })
            .await
            .expect("create sheet")
    }

    pub async fn draft_sheet(&self, items: Vec<LineItemInput>) -> OrderSheet {
        self.services
            .order_sheets
            .create_order_sheet(CreateOrderSheetRequest {
                customer_org_id: Some(Uuid::new_v4()),
                customer_name: "Daehan Meats".to_string(),
                ship_date: None,
                cut_off_at: None,
                is_guest: false,
                issue_immediately: false,
                items,
                admin_comment: None,
            })
            .await
            .expect("create draft sheet")
    }

    pub async fn guest_sheet(&self, items: Vec<LineItemInput>) -> OrderSheet {
        self.services
            .order_sheets
            .create_order_sheet(CreateOrderSheetRequest {
                customer_org_id: None,
                customer_name: "Walk-in Restaurant".to_string(),
                ship_date: None,
                cut_off_at: None,
                is_guest: true,
                issue_immediately: true,
                items,
                admin_comment: None,
            })
            .await
            .expect("create guest sheet")
    }

    pub async fn submitted_sheet(&self, items: Vec<LineItemInput>) -> OrderSheet {
        let sheet = self.sent_sheet(items.clone()).await;
        self.services
            .order_sheets
            .submit_order_sheet(
                sheet.id,
                Some(&active_actor(ActorRole::Customer)),
                SubmitOrderSheetRequest {
                    items,
                    customer_comment: None,
                },
            )
            .await
            .expect("submit sheet")
    }

    pub async fn confirmed(&self, items: Vec<LineItemInput>, discount: Decimal) -> Confirmation {
        let sheet = self.submitted_sheet(items).await;
        self.services
            .order_sheets
            .confirm_order_sheet(
                sheet.id,
                Some(&active_actor(ActorRole::Admin)),
                ConfirmOrderSheetRequest {
                    discount_amount: discount,
                    change_reason: None,
                },
            )
            .await
            .expect("confirm sheet")
    }

    pub async fn confirmed_sales_order(&self) -> SalesOrder {
        self.confirmed(vec![kg_item("pork belly", dec!(50), dec!(1000))], Decimal::ZERO)
            .await
            .sales_order
    }
}

pub fn kg_item(name: &str, qty: Decimal, price: Decimal) -> LineItemInput {
    LineItemInput {
        product_id: Uuid::new_v4(),
        product_name: name.to_string(),
        unit: OrderUnit::Kg,
        qty_requested: qty,
        box_to_kg_factor: dec!(1),
        unit_price: price,
    }
}

pub fn box_item(name: &str, qty: Decimal, factor: Decimal, price: Decimal) -> LineItemInput {
    LineItemInput {
        product_id: Uuid::new_v4(),
        product_name: name.to_string(),
        unit: OrderUnit::Box,
        qty_requested: qty,
        box_to_kg_factor: factor,
        unit_price: price,
    }
}

pub fn active_actor(role: ActorRole) -> Actor {
    Actor {
        id: Uuid::new_v4(),
        role,
        org_id: Some(Uuid::new_v4()),
        status: ActorStatus::Active,
        invite_token: None,
    }
}

pub fn pending_actor() -> Actor {
    Actor {
        id: Uuid::new_v4(),
        role: ActorRole::Customer,
        org_id: Some(Uuid::new_v4()),
        status: ActorStatus::Pending,
        invite_token: Some("invite-token-1".to_string()),
    }
}
