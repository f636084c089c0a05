//! Read side of the audit trail (audit tables in the admin panel).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::document_store::{AUDIT_LOG, DocumentStore, StoreError};

use super::event::{AuditEvent, AuditKind};

/// Page size used when none is given.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Largest page a single query returns.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Pagination parameters for audit queries.
///
/// `limit` is clamped to [`MAX_PAGE_SIZE`] by [`AuditReader::query`] however
/// the value was built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE),
            offset: offset.unwrap_or(0),
        }
        .clamped()
    }

    pub fn clamped(self) -> Self {
        Self {
            limit: self.limit.min(MAX_PAGE_SIZE),
            ..self
        }
    }
}

/// Filter criteria; `None` matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFilter {
    pub actor: Option<String>,
    pub kind: Option<AuditKind>,
    pub action: Option<String>,
}

impl AuditFilter {
    fn matches(&self, event: &AuditEvent) -> bool {
        self.actor.as_ref().is_none_or(|a| *a == event.actor)
            && self.kind.is_none_or(|k| k == event.kind)
            && self.action.as_ref().is_none_or(|a| *a == event.action)
    }
}

/// One page of audit events, newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditPage {
    pub events: Vec<AuditEvent>,
    /// Matching events across all pages.
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}

#[derive(Clone)]
pub struct AuditReader {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

impl AuditReader {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            collection: AUDIT_LOG.to_string(),
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    /// Undecodable documents are skipped with a warning.
    pub async fn query(
        &self,
        filter: &AuditFilter,
        pagination: Pagination,
    ) -> Result<AuditPage, StoreError> {
        let pagination = pagination.clamped();
        let docs = self.store.list(&self.collection).await?;

        let mut events: Vec<AuditEvent> = docs
            .into_iter()
            .rev()
            .filter_map(|doc| match serde_json::from_value::<AuditEvent>(doc.data) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(id = %doc.id, error = %e, "skipping undecodable audit document");
                    None
                }
            })
            .filter(|event| filter.matches(event))
            .collect();

        // Stable: equal timestamps keep newest-insert-first from the reversal.
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let total = events.len() as u64;
        let page: Vec<AuditEvent> = events
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .collect();
        let has_more = u64::from(pagination.offset) + (page.len() as u64) < total;

        Ok(AuditPage {
            events: page,
            total,
            pagination,
            has_more,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{Duration, Utc};

    use crate::audit::NewAuditEvent;
    use crate::document_store::InMemoryDocumentStore;

    async fn seeded() -> (Arc<InMemoryDocumentStore>, AuditReader) {
        let store = Arc::new(InMemoryDocumentStore::new());
        let t0 = Utc::now();
        let events = [
            NewAuditEvent::denial("ana", "carta.crear", "plato").stamp(t0),
            NewAuditEvent::success("luis", "crear", "reserva", "r-1", None)
                .stamp(t0 + Duration::seconds(1)),
            NewAuditEvent::success("ana", "modificar", "reserva", "r-1", None)
                .stamp(t0 + Duration::seconds(2)),
            NewAuditEvent::error("ana", "plato", "p-1", "boom").stamp(t0 + Duration::seconds(3)),
        ];
        for e in events {
            store
                .insert(AUDIT_LOG, serde_json::to_value(e).unwrap())
                .await
                .unwrap();
        }
        store
            .insert(AUDIT_LOG, serde_json::json!({"garbage": true}))
            .await
            .unwrap();
        let reader = AuditReader::new(store.clone());
        (store, reader)
    }

    #[tokio::test]
    async fn newest_first_and_skips_garbage() {
        let (_store, reader) = seeded().await;
        let page = reader
            .query(&AuditFilter::default(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(page.total, 4);
        assert_eq!(page.events[0].action, "PLATO_ERROR");
        assert_eq!(page.events[3].action, "ACCESS_DENIED");
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn filters_by_actor_and_kind() {
        let (_store, reader) = seeded().await;
        let filter = AuditFilter {
            actor: Some("ana".to_string()),
            kind: Some(AuditKind::Action),
            action: None,
        };
        let page = reader.query(&filter, Pagination::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.events[0].action, "RESERVA_MODIFICAR");
    }

    #[tokio::test]
    async fn paginates() {
        let (_store, reader) = seeded().await;
        let page = reader
            .query(&AuditFilter::default(), Pagination::new(Some(2), Some(1)))
            .await
            .unwrap();
        assert_eq!(page.events.len(), 2);
        assert_eq!(page.events[0].action, "RESERVA_MODIFICAR");
        assert!(page.has_more);
    }

    #[test]
    fn pagination_is_capped() {
        assert_eq!(Pagination::new(Some(5000), None).limit, MAX_PAGE_SIZE);
    }

    #[tokio::test]
    async fn oversized_page_from_request_is_clamped() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let t0 = Utc::now();
        for i in 0..1200 {
            let event = NewAuditEvent::denial("ana", "config.ver", "config")
                .stamp(t0 + Duration::milliseconds(i));
            store
                .insert(AUDIT_LOG, serde_json::to_value(event).unwrap())
                .await
                .unwrap();
        }

        let requested: Pagination =
            serde_json::from_value(serde_json::json!({"limit": 5000, "offset": 0})).unwrap();
        let page = AuditReader::new(store)
            .query(&AuditFilter::default(), requested)
            .await
            .unwrap();

        assert_eq!(page.events.len(), MAX_PAGE_SIZE as usize);
        assert_eq!(page.pagination.limit, MAX_PAGE_SIZE);
        assert_eq!(page.total, 1200);
        assert!(page.has_more);
    }
}
