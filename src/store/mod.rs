//! Document-store contract the core persists through.
//!
//! The core never talks to a concrete database; it reads and writes
//! JSON documents through [`EntityStore`] and relies on version-checked
//! updates for optimistic concurrency. [`InMemoryStore`] is the
//! implementation used by tests and local wiring.

use std::fmt;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

pub mod memory;

pub use memory::InMemoryStore;

/// Collections of persisted documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    OrderSheets,
    SalesOrders,
    PurchaseOrders,
    Shipments,
}

impl Collection {
    pub fn name(self) -> &'static str {
        match self {
            Collection::OrderSheets => "order_sheets",
            Collection::SalesOrders => "sales_orders",
            Collection::PurchaseOrders => "purchase_orders",
            Collection::Shipments => "shipments",
        }
    }

    /// Document field holding the opaque access token, for collections
    /// reachable by token. Token lookups are indexed, not scanned.
    pub(crate) fn token_field(self) -> Option<&'static str> {
        match self {
            Collection::OrderSheets | Collection::PurchaseOrders => Some("access_token"),
            Collection::Shipments => Some("dispatcher_token"),
            Collection::SalesOrders => None,
        }
    }

    /// Document field holding the owning organization id.
    pub(crate) fn org_field(self) -> Option<&'static str> {
        match self {
            Collection::OrderSheets | Collection::SalesOrders => Some("customer_org_id"),
            Collection::Shipments => Some("carrier_org_id"),
            Collection::PurchaseOrders => None,
        }
    }

    /// Document field linking back to the source document, for
    /// collections derived from another one.
    pub(crate) fn source_field(self) -> Option<&'static str> {
        match self {
            Collection::SalesOrders => Some("source_order_sheet_id"),
            Collection::Shipments => Some("source_sales_order_id"),
            Collection::OrderSheets | Collection::PurchaseOrders => None,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Secondary-field filters supported by [`EntityStore::query`].
#[derive(Debug, Clone)]
pub enum Filter {
    ByOrgId(Uuid),
    ByToken(String),
    ByStatus(String),
    BySourceId(Uuid),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{collection} {id} not found")]
    NotFound { collection: Collection, id: Uuid },

    #[error("duplicate key in {collection}: {key}")]
    DuplicateKey { collection: Collection, key: String },

    #[error("version conflict on {id}")]
    VersionConflict { id: Uuid },

    #[error("malformed document: {0}")]
    Malformed(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Narrow CRUD + query contract over a remote document store.
///
/// Every document carries a string `id` and an integer `version`.
/// `update` replaces a document only while its stored version still
/// equals `expected_version`; the caller writes the bumped version into
/// the replacement document. A failed operation leaves the stored
/// document untouched.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn get(&self, collection: Collection, id: Uuid) -> Result<Option<Value>, StoreError>;

    async fn query(&self, collection: Collection, filter: Filter)
        -> Result<Vec<Value>, StoreError>;

    async fn insert(&self, collection: Collection, doc: Value) -> Result<(), StoreError>;

    async fn update(
        &self,
        collection: Collection,
        id: Uuid,
        expected_version: i32,
        doc: Value,
    ) -> Result<(), StoreError>;

    async fn delete(&self, collection: Collection, id: Uuid) -> Result<(), StoreError>;
}

/// Serde-typed convenience layer over the raw document contract.
#[async_trait]
pub trait EntityStoreExt: EntityStore {
    async fn get_as<T>(&self, collection: Collection, id: Uuid) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(collection, id).await? {
            Some(value) => Ok(Some(decode(value)?)),
            None => Ok(None),
        }
    }

    async fn query_as<T>(&self, collection: Collection, filter: Filter)
        -> Result<Vec<T>, StoreError>
    where
        T: DeserializeOwned + Send,
    {
        self.query(collection, filter)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    async fn insert_doc<T>(&self, collection: Collection, entity: &T) -> Result<(), StoreError>
    where
        T: Serialize + Sync,
    {
        let doc = encode(entity)?;
        self.insert(collection, doc).await
    }

    async fn update_doc<T>(
        &self,
        collection: Collection,
        id: Uuid,
        expected_version: i32,
        entity: &T,
    ) -> Result<(), StoreError>
    where
        T: Serialize + Sync,
    {
        let doc = encode(entity)?;
        self.update(collection, id, expected_version, doc).await
    }
}

impl<S: EntityStore + ?Sized> EntityStoreExt for S {}

fn encode<T: Serialize>(entity: &T) -> Result<Value, StoreError> {
    serde_json::to_value(entity).map_err(|e| StoreError::Malformed(e.to_string()))
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|e| StoreError::Malformed(e.to_string()))
}
