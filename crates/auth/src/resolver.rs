use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::{AdminUser, Permission, RoleId, RoleRegistry};

/// Why a permission query resolved the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    /// No identity was supplied.
    NoUser,
    /// The user's role is not in the registry.
    UnknownRole,
    /// An explicit `true` override.
    OverrideGranted,
    /// An explicit `false` override (beats any role grant).
    OverrideRevoked,
    /// Granted by the role's permission set.
    RoleGranted,
    /// Neither the role nor an override grants it.
    NotGranted,
}

/// Outcome of a permission query, with its reason (for audit/display).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionDecision {
    pub permission: Permission,
    pub granted: bool,
    pub source: DecisionSource,
    pub role: Option<RoleId>,
}

/// Resolves effective permissions from the role registry and per-user overrides.
///
/// - No IO
/// - No panics
/// - Absent users and unknown roles resolve to "no rights", never to an error
#[derive(Debug, Clone)]
pub struct PermissionResolver {
    registry: Arc<RoleRegistry>,
}

impl PermissionResolver {
    pub fn new(registry: Arc<RoleRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &RoleRegistry {
        &self.registry
    }

    pub fn has_permission(&self, user: Option<&AdminUser>, permission: &Permission) -> bool {
        self.explain(user, permission).granted
    }

    /// Explain why a permission is (or is not) granted.
    ///
    /// Precedence: missing user, unknown role, explicit override, role set.
    pub fn explain(&self, user: Option<&AdminUser>, permission: &Permission) -> PermissionDecision {
        let decision = |granted, source, role: Option<&RoleId>| PermissionDecision {
            permission: permission.clone(),
            granted,
            source,
            role: role.cloned(),
        };

        let Some(user) = user else {
            return decision(false, DecisionSource::NoUser, None);
        };

        let Some(role) = self.registry.get_role(&user.role) else {
            warn!(uid = %user.uid, role = %user.role, "admin user has an unknown role");
            return decision(false, DecisionSource::UnknownRole, Some(&user.role));
        };

        match user.overrides.get(permission).copied() {
            Some(true) => decision(true, DecisionSource::OverrideGranted, Some(&role.id)),
            Some(false) => decision(false, DecisionSource::OverrideRevoked, Some(&role.id)),
            None if role.grants(permission) => {
                decision(true, DecisionSource::RoleGranted, Some(&role.id))
            }
            None => decision(false, DecisionSource::NotGranted, Some(&role.id)),
        }
    }

    /// Role grants, plus `true` overrides, minus `false` overrides.
    pub fn effective_permissions(&self, user: Option<&AdminUser>) -> BTreeSet<Permission> {
        let Some(user) = user else {
            return BTreeSet::new();
        };
        let Some(role) = self.registry.get_role(&user.role) else {
            return BTreeSet::new();
        };

        let mut effective = role.permissions.clone();
        for (permission, &granted) in &user.overrides {
            if granted {
                effective.insert(permission.clone());
            } else {
                effective.remove(permission);
            }
        }
        effective
    }

    /// Union of every role's grants, sorted and deduplicated.
    pub fn all_known_permissions(&self) -> Vec<Permission> {
        self.registry
            .list_all_roles()
            .iter()
            .flat_map(|role| role.permissions.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Known permissions grouped by resource segment (for permission checklists).
    pub fn permission_catalog(&self) -> BTreeMap<String, Vec<Permission>> {
        let mut catalog: BTreeMap<String, Vec<Permission>> = BTreeMap::new();
        for permission in self.all_known_permissions() {
            let resource = permission.resource().unwrap_or_default().to_string();
            catalog.entry(resource).or_default().push(permission);
        }
        catalog
    }

    pub fn permissions_of_role(&self, role: &RoleId) -> BTreeSet<Permission> {
        self.registry.permissions_of_role(role)
    }
}
