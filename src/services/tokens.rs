//! Opaque access-token minting and resolution.
//!
//! Tokens are random alphanumeric strings generated at issuance time.
//! No expiry is encoded in the token itself; deadlines live on the
//! documents, so resolution never fails merely because a cut-off
//! passed; the caller receives the document with its current status
//! and renders the appropriate view.

use std::sync::Arc;

use rand::{distributions::Alphanumeric, Rng};
use serde::de::DeserializeOwned;
use tracing::instrument;

use crate::errors::ServiceError;
use crate::models::{OrderSheet, PurchaseOrder, Shipment};
use crate::store::{Collection, EntityStore, EntityStoreExt, Filter};

/// Mints an opaque access token.
pub fn mint_token(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Maps access tokens to the documents they grant access to. Lookups
/// are O(1) through the store's token index.
#[derive(Clone)]
pub struct TokenAccessResolver {
    store: Arc<dyn EntityStore>,
}

impl TokenAccessResolver {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, token))]
    pub async fn resolve_order_sheet(&self, token: &str) -> Result<OrderSheet, ServiceError> {
        self.resolve(Collection::OrderSheets, token).await
    }

    #[instrument(skip(self, token))]
    pub async fn resolve_purchase_order(
        &self,
        token: &str,
    ) -> Result<PurchaseOrder, ServiceError> {
        self.resolve(Collection::PurchaseOrders, token).await
    }

    /// Resolves a 3PL dispatcher token to its shipment.
    #[instrument(skip(self, token))]
    pub async fn resolve_shipment(&self, token: &str) -> Result<Shipment, ServiceError> {
        self.resolve(Collection::Shipments, token).await
    }

    async fn resolve<T>(&self, collection: Collection, token: &str) -> Result<T, ServiceError>
    where
        T: DeserializeOwned + Send,
    {
        let mut docs = self
            .store
            .query_as::<T>(collection, Filter::ByToken(token.to_string()))
            .await?;
        docs.pop().ok_or_else(|| {
            ServiceError::NotFound(format!("no {collection} document for the presented token"))
        })
    }
}
