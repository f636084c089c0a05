use serde_json::{Map as JsonMap, Value as JsonValue};
use thiserror::Error;

use arboleda_core::DocumentId;

/// A stored document: its key plus the JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub data: JsonValue,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: DocumentId },

    /// Transient failure (network, timeout, poisoned lock).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Whether retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value.to_string())
    }
}

/// Async document store contract.
///
/// Implementations must be safe to share across tasks. Writes are durable
/// once the returned future resolves `Ok`.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Add a new document; the store assigns its key.
    async fn insert(&self, collection: &str, data: JsonValue) -> Result<DocumentId, StoreError>;

    async fn get(&self, collection: &str, id: DocumentId) -> Result<Option<Document>, StoreError>;

    /// All documents of a collection, in insertion order.
    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    /// Documents whose top-level `field` equals `value`, in insertion order.
    async fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &JsonValue,
    ) -> Result<Vec<Document>, StoreError>;

    /// Overwrite the given top-level fields, keeping every other field.
    async fn merge(
        &self,
        collection: &str,
        id: DocumentId,
        fields: JsonMap<String, JsonValue>,
    ) -> Result<(), StoreError>;

    async fn delete(&self, collection: &str, id: DocumentId) -> Result<(), StoreError>;
}
