//! Meatflow order lifecycle core
//!
//! Storage- and transport-agnostic domain services for a wholesale
//! meat-distribution order workflow: order sheets exchanged over
//! access tokens, confirmation into sales orders, supplier purchase
//! orders, and dispatch tracking. Wrap [`AppServices`] in whatever
//! API layer runs on top.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod errors;
pub mod events;
pub mod logging;
pub mod models;
pub mod notifier;
pub mod services;
pub mod store;

use std::sync::Arc;

use crate::events::EventSender;
use crate::notifier::Notifier;
use crate::store::EntityStore;

/// Aggregated service handles wired over one store / notifier pair.
#[derive(Clone)]
pub struct AppServices {
    pub order_sheets: services::OrderSheetService,
    pub fulfillment: services::FulfillmentService,
    pub dispatch: services::DispatchService,
    pub tokens: services::TokenAccessResolver,
    pub activation: services::ActivationGate,
}

impl AppServices {
    pub fn new(
        store: Arc<dyn EntityStore>,
        notifier: Arc<dyn Notifier>,
        event_sender: Option<Arc<EventSender>>,
        config: &config::AppConfig,
    ) -> Self {
        let token_length = config.token_length as usize;
        let fulfillment = services::FulfillmentService::new(
            store.clone(),
            notifier.clone(),
            event_sender.clone(),
            token_length,
        );
        Self {
            order_sheets: services::OrderSheetService::new(
                store.clone(),
                notifier.clone(),
                event_sender.clone(),
                fulfillment.clone(),
                token_length,
            ),
            dispatch: services::DispatchService::new(
                store.clone(),
                notifier,
                event_sender,
                token_length,
            ),
            tokens: services::TokenAccessResolver::new(store),
            fulfillment,
            activation: services::ActivationGate::new(),
        }
    }
}
