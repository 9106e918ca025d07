//! In-memory [`EntityStore`] backed by `DashMap`.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use uuid::Uuid;

use super::{Collection, EntityStore, Filter, StoreError};

/// In-memory document store used by tests and local wiring.
///
/// The token index keeps token resolution O(1); org/status/source
/// queries scan the collection, which is acceptable for this backend.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    docs: DashMap<(Collection, Uuid), Value>,
    tokens: DashMap<String, (Collection, Uuid)>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn doc_id(doc: &Value) -> Result<Uuid, StoreError> {
    doc.get("id")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| StoreError::Malformed("document is missing a string `id`".to_string()))
}

fn doc_version(doc: &Value) -> Result<i32, StoreError> {
    doc.get("version")
        .and_then(Value::as_i64)
        .map(|v| v as i32)
        .ok_or_else(|| {
            StoreError::Malformed("document is missing an integer `version`".to_string())
        })
}

fn str_field<'a>(doc: &'a Value, field: &str) -> Option<&'a str> {
    doc.get(field).and_then(Value::as_str)
}

#[async_trait]
impl EntityStore for InMemoryStore {
    async fn get(&self, collection: Collection, id: Uuid) -> Result<Option<Value>, StoreError> {
        Ok(self.docs.get(&(collection, id)).map(|e| e.value().clone()))
    }

    async fn query(
        &self,
        collection: Collection,
        filter: Filter,
    ) -> Result<Vec<Value>, StoreError> {
        match filter {
            Filter::ByToken(token) => {
                let hit = self.tokens.get(&token).map(|e| *e.value());
                match hit {
                    Some((c, id)) if c == collection => {
                        Ok(self.get(collection, id).await?.into_iter().collect())
                    }
                    _ => Ok(Vec::new()),
                }
            }
            Filter::ByOrgId(org_id) => {
                let needle = org_id.to_string();
                Ok(match collection.org_field() {
                    Some(field) => self.scan(collection, |doc| {
                        str_field(doc, field) == Some(needle.as_str())
                    }),
                    None => Vec::new(),
                })
            }
            Filter::ByStatus(status) => Ok(self.scan(collection, |doc| {
                str_field(doc, "status") == Some(status.as_str())
            })),
            Filter::BySourceId(source_id) => {
                let needle = source_id.to_string();
                Ok(match collection.source_field() {
                    Some(field) => self.scan(collection, |doc| {
                        str_field(doc, field) == Some(needle.as_str())
                    }),
                    None => Vec::new(),
                })
            }
        }
    }

    async fn insert(&self, collection: Collection, doc: Value) -> Result<(), StoreError> {
        let id = doc_id(&doc)?;
        doc_version(&doc)?;

        // Reserve the token first so an issued token can never be
        // reassigned to a different document.
        let token = collection
            .token_field()
            .and_then(|f| str_field(&doc, f).map(str::to_owned));
        let mut reserved = false;
        if let Some(token) = &token {
            match self.tokens.entry(token.clone()) {
                Entry::Occupied(existing) => {
                    if *existing.get() != (collection, id) {
                        return Err(StoreError::DuplicateKey {
                            collection,
                            key: token.clone(),
                        });
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert((collection, id));
                    reserved = true;
                }
            }
        }

        match self.docs.entry((collection, id)) {
            Entry::Occupied(_) => {
                if reserved {
                    if let Some(token) = &token {
                        self.tokens.remove(token);
                    }
                }
                Err(StoreError::DuplicateKey {
                    collection,
                    key: id.to_string(),
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(doc);
                Ok(())
            }
        }
    }

    async fn update(
        &self,
        collection: Collection,
        id: Uuid,
        expected_version: i32,
        doc: Value,
    ) -> Result<(), StoreError> {
        if doc_id(&doc)? != id {
            return Err(StoreError::Malformed(
                "document id does not match the update target".to_string(),
            ));
        }
        doc_version(&doc)?;

        let mut entry = self
            .docs
            .get_mut(&(collection, id))
            .ok_or(StoreError::NotFound { collection, id })?;

        if doc_version(entry.value())? != expected_version {
            return Err(StoreError::VersionConflict { id });
        }

        // Tokens are immutable once issued.
        if let Some(field) = collection.token_field() {
            if str_field(entry.value(), field).is_some()
                && str_field(entry.value(), field) != str_field(&doc, field)
            {
                return Err(StoreError::Malformed(format!("`{field}` is immutable")));
            }
        }

        *entry.value_mut() = doc;
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> Result<(), StoreError> {
        let (_, doc) = self
            .docs
            .remove(&(collection, id))
            .ok_or(StoreError::NotFound { collection, id })?;
        if let Some(field) = collection.token_field() {
            if let Some(token) = str_field(&doc, field) {
                self.tokens.remove(token);
            }
        }
        Ok(())
    }
}

impl InMemoryStore {
    fn scan<F>(&self, collection: Collection, keep: F) -> Vec<Value>
    where
        F: Fn(&Value) -> bool,
    {
        self.docs
            .iter()
            .filter(|e| e.key().0 == collection && keep(e.value()))
            .map(|e| e.value().clone())
            .collect()
    }
}
