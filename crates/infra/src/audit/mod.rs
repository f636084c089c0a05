//! Append-only audit trail.
//!
//! - `event`: the stored record and its constructors
//! - `writer`: non-blocking, best-effort side channel into the store
//! - `reader`: filtered, paginated queries for audit tables

pub mod event;
pub mod reader;
pub mod writer;

pub use event::{ACCESS_DENIED, AuditEvent, AuditKind, ChangeSet, NewAuditEvent};
pub use reader::{
    AuditFilter, AuditPage, AuditReader, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, Pagination,
};
pub use writer::{AuditLog, AuditStats, AuditWorker};
