//! `arboleda-core` — shared identifiers and the domain error model.
//!
//! This crate contains **pure** primitives (no storage, no IO).

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{DocumentId, Uid};
