use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::{Map as JsonMap, Value as JsonValue};

use arboleda_core::DocumentId;

use super::r#trait::{Document, DocumentStore, StoreError};

/// In-memory document store.
///
/// Intended for tests/dev. Keeps insertion order per collection.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection.
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|c| c.get(collection).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

fn poisoned() -> StoreError {
    StoreError::unavailable("lock poisoned")
}

#[async_trait::async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert(&self, collection: &str, data: JsonValue) -> Result<DocumentId, StoreError> {
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        let id = DocumentId::new();
        collections
            .entry(collection.to_string())
            .or_default()
            .push(Document { id, data });
        Ok(id)
    }

    async fn get(&self, collection: &str, id: DocumentId) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().map_err(|_| poisoned())?;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id))
            .cloned())
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().map_err(|_| poisoned())?;
        Ok(collections.get(collection).cloned().unwrap_or_default())
    }

    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &JsonValue,
    ) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().map_err(|_| poisoned())?;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|d| d.data.get(field) == Some(value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn merge(
        &self,
        collection: &str,
        id: DocumentId,
        fields: JsonMap<String, JsonValue>,
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id,
            })?;

        let JsonValue::Object(body) = &mut doc.data else {
            return Err(StoreError::Serialization(format!(
                "{collection}/{id} is not a JSON object"
            )));
        };
        body.extend(fields);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: DocumentId) -> Result<(), StoreError> {
        let mut collections = self.collections.write().map_err(|_| poisoned())?;
        let docs = collections.get_mut(collection);
        let Some(docs) = docs else {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id,
            });
        };

        let before = docs.len();
        docs.retain(|d| d.id != id);
        if docs.len() == before {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id,
            });
        }
        Ok(())
    }
}
