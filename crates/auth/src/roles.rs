use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use arboleda_core::{DomainError, DomainResult};

use crate::Permission;

/// Role identifier used for RBAC (e.g. "recepcionista").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(Cow<'static, str>);

impl RoleId {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for RoleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for RoleId {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

/// A predefined bundle of permission grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: String,
    /// Display colour for admin UIs (`#RRGGBB`).
    pub color: String,
    /// Base roles ship with the registry and cannot be deleted.
    pub base_role: bool,
    pub permissions: BTreeSet<Permission>,
}

impl Role {
    pub fn new(id: impl Into<RoleId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            color: String::new(),
            base_role: false,
            permissions: BTreeSet::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn base(mut self) -> Self {
        self.base_role = true;
        self
    }

    pub fn with_permissions<I, P>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Permission>,
    {
        self.permissions.extend(permissions.into_iter().map(Into::into));
        self
    }

    pub fn grants(&self, permission: &Permission) -> bool {
        self.permissions.contains(permission)
    }
}

/// Immutable table of every role the application knows about.
///
/// Built once at startup and shared (usually behind an `Arc`); there is no
/// mutation API.
#[derive(Debug, Clone, Default)]
pub struct RoleRegistry {
    roles: Vec<Role>,
    index: HashMap<RoleId, usize>,
}

impl RoleRegistry {
    pub fn builder() -> RoleRegistryBuilder {
        RoleRegistryBuilder::default()
    }

    /// The club's reference role set.
    pub fn builtin() -> Self {
        let reservas = [
            "reservas.crear",
            "reservas.leer",
            "reservas.modificar",
            "reservas.eliminar",
            "reservas.cambiar_estado",
            "reservas.enviar_notificaciones",
            "reservas.exportar",
        ];
        let carta = [
            "carta.crear",
            "carta.leer",
            "carta.modificar",
            "carta.eliminar",
            "carta.gestionar_etiquetas",
            "carta.ver_estadisticas",
            "carta.exportar",
        ];

        let super_admin = Role::new("super_admin", "Super Administrador")
            .with_description("Acceso total a todas las funcionalidades")
            .with_color("#FF6B6B")
            .base()
            .with_permissions(reservas)
            .with_permissions(carta)
            .with_permissions([
                "usuarios.crear",
                "usuarios.leer",
                "usuarios.modificar",
                "usuarios.eliminar",
                "usuarios.asignar_roles",
                "usuarios.ver_auditoria",
                "reportes.ver_todos",
                "reportes.exportar",
                "reportes.ver_auditoria",
                "config.ver",
                "config.modificar",
                "config.backup",
            ]);

        let admin_reservas = Role::new("admin_reservas", "Administrador de Reservas")
            .with_description("Gestiona reservas, confirmaciones y estado")
            .with_color("#4ECDC4")
            .base()
            .with_permissions(reservas)
            .with_permissions([
                "carta.leer",
                "carta.ver_estadisticas",
                "reportes.ver_todos",
                "reportes.exportar",
            ]);

        let admin_carta = Role::new("admin_carta", "Administrador de Carta")
            .with_description("Gestiona menú, platos y promociones")
            .with_color("#95E1D3")
            .base()
            .with_permissions(["reservas.leer"])
            .with_permissions(carta)
            .with_permissions(["reportes.ver_todos"]);

        let recepcionista = Role::new("recepcionista", "Recepcionista")
            .with_description("Solo aceptar y rechazar reservas")
            .with_color("#FFE66D")
            .base()
            .with_permissions([
                "reservas.leer",
                "reservas.cambiar_estado",
                "reservas.enviar_notificaciones",
                "carta.leer",
            ]);

        let mut registry = Self::default();
        for role in [super_admin, admin_reservas, admin_carta, recepcionista] {
            registry.index.insert(role.id.clone(), registry.roles.len());
            registry.roles.push(role);
        }
        registry
    }

    pub fn get_role(&self, id: &RoleId) -> Option<&Role> {
        self.index.get(id).map(|&i| &self.roles[i])
    }

    pub fn contains(&self, id: &RoleId) -> bool {
        self.index.contains_key(id)
    }

    /// Every role, in definition order.
    pub fn list_all_roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn base_roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.iter().filter(|r| r.base_role)
    }

    /// Grants of a role; empty for unknown roles.
    pub fn permissions_of_role(&self, id: &RoleId) -> BTreeSet<Permission> {
        self.get_role(id)
            .map(|r| r.permissions.clone())
            .unwrap_or_default()
    }
}

/// Validating builder for custom registries.
#[derive(Debug, Default)]
pub struct RoleRegistryBuilder {
    roles: Vec<Role>,
}

impl RoleRegistryBuilder {
    pub fn role(mut self, role: Role) -> Self {
        self.roles.push(role);
        self
    }

    /// Rejects duplicate role ids and malformed permission strings.
    pub fn build(self) -> DomainResult<RoleRegistry> {
        let mut registry = RoleRegistry::default();

        for role in self.roles {
            if registry.index.contains_key(&role.id) {
                return Err(DomainError::conflict(format!("duplicate role id '{}'", role.id)));
            }
            if let Some(bad) = role.permissions.iter().find(|p| !p.is_well_formed()) {
                return Err(DomainError::validation(format!(
                    "role '{}' grants malformed permission '{bad}'",
                    role.id
                )));
            }
            registry.index.insert(role.id.clone(), registry.roles.len());
            registry.roles.push(role);
        }

        Ok(registry)
    }
}
