//! Infrastructure layer: document storage, audit trail, user directory and
//! permission-guarded execution.

pub mod audit;
pub mod config;
pub mod directory;
pub mod document_store;
pub mod guard;

pub use audit::{
    AuditEvent, AuditFilter, AuditKind, AuditLog, AuditPage, AuditReader, AuditStats, AuditWorker,
    ChangeSet, Pagination,
};
pub use config::{AuditConfig, RetryPolicy};
pub use directory::{DirectoryError, UserDirectory};
pub use document_store::{DocumentStore, InMemoryDocumentStore, StoreError};
pub use guard::{AuditContext, GuardError, GuardedExecutor};
