//! Document store boundary.
//!
//! The remote database is modelled as schemaless JSON documents grouped in
//! named collections, keyed by an opaque [`DocumentId`](arboleda_core::DocumentId)
//! and queryable by field equality.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryDocumentStore;
pub use r#trait::{Document, DocumentStore, StoreError};

/// Collection holding administrative users.
pub const ADMIN_USERS: &str = "usuarios_admin";

/// Append-only collection holding audit events.
pub const AUDIT_LOG: &str = "auditoria";
