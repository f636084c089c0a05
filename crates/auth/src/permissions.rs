use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use arboleda_core::{DomainError, DomainResult};

/// Permission identifier.
///
/// Permissions are dotted `<resource>.<action>` tokens (e.g. "reservas.crear").
/// At query time they are opaque: an unknown or misspelled permission simply
/// resolves to "not granted".
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Build a permission, rejecting anything that is not `<resource>.<action>`.
    pub fn parse(name: impl Into<Cow<'static, str>>) -> DomainResult<Self> {
        let permission = Self::new(name);
        if !permission.is_well_formed() {
            return Err(DomainError::validation(format!(
                "permission '{permission}' is not of the form <resource>.<action>"
            )));
        }
        Ok(permission)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Exactly two non-empty dot-separated segments.
    pub fn is_well_formed(&self) -> bool {
        match self.as_str().split_once('.') {
            Some((resource, action)) => {
                !resource.is_empty() && !action.is_empty() && !action.contains('.')
            }
            None => false,
        }
    }

    /// Resource segment (`reservas` in `reservas.crear`).
    pub fn resource(&self) -> Option<&str> {
        self.as_str().split_once('.').map(|(resource, _)| resource)
    }

    /// Action segment (`crear` in `reservas.crear`).
    pub fn action(&self) -> Option<&str> {
        self.as_str().split_once('.').map(|(_, action)| action)
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Permission {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_requires_two_segments() {
        assert!(Permission::new("reservas.crear").is_well_formed());
        assert!(!Permission::new("reservas").is_well_formed());
        assert!(!Permission::new("reservas.").is_well_formed());
        assert!(!Permission::new(".crear").is_well_formed());
        assert!(!Permission::new("admin.users.read").is_well_formed());
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(Permission::parse("carta.leer").is_ok());
        let err = Permission::parse("carta").unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn segments() {
        let p = Permission::new("usuarios.asignar_roles");
        assert_eq!(p.resource(), Some("usuarios"));
        assert_eq!(p.action(), Some("asignar_roles"));
    }
}
