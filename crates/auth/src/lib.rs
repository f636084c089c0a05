//! `arboleda-auth` — role registry, permission resolution and the admin-user model.
//!
//! This crate is intentionally decoupled from storage and transport.

pub mod permissions;
pub mod resolver;
pub mod roles;
pub mod user;

pub use permissions::Permission;
pub use resolver::{DecisionSource, PermissionDecision, PermissionResolver};
pub use roles::{Role, RoleId, RoleRegistry, RoleRegistryBuilder};
pub use user::{
    ACCESS_HISTORY_LIMIT, AccessEvent, AccessKind, AdminUser, AdminUserPatch, NewAdminUser,
    UserStatus,
};
