use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Action code of a denied permission check.
pub const ACCESS_DENIED: &str = "ACCESS_DENIED";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditKind {
    /// Authorization denials.
    Security,
    /// Successful mutations.
    Action,
    /// Failures while executing a permitted action.
    Error,
}

impl core::fmt::Display for AuditKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AuditKind::Security => write!(f, "SECURITY"),
            AuditKind::Action => write!(f, "ACTION"),
            AuditKind::Error => write!(f, "ERROR"),
        }
    }
}

/// Before/after snapshot of a change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<JsonValue>,
}

impl ChangeSet {
    pub fn new(before: Option<JsonValue>, after: Option<JsonValue>) -> Self {
        Self { before, after }
    }

    pub fn created(after: JsonValue) -> Self {
        Self::new(None, Some(after))
    }
}

/// An audit event not yet stamped by the writer.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEvent {
    pub actor: String,
    pub action: String,
    pub resource: Option<String>,
    pub details: String,
    pub kind: AuditKind,
    pub changes: Option<ChangeSet>,
}

impl NewAuditEvent {
    /// `SECURITY` event for a permission check that failed.
    pub fn denial(actor: &str, attempted_action: &str, resource: &str) -> Self {
        Self {
            actor: actor.to_string(),
            action: ACCESS_DENIED.to_string(),
            resource: Some(resource.to_string()),
            details: format!("denied attempt: {attempted_action}"),
            kind: AuditKind::Security,
            changes: None,
        }
    }

    /// `ACTION` event coded `<RESOURCE>_<VERB>` on `resource_type:resource_id`.
    pub fn success(
        actor: &str,
        verb: &str,
        resource_type: &str,
        resource_id: &str,
        changes: Option<ChangeSet>,
    ) -> Self {
        Self {
            actor: actor.to_string(),
            action: action_code(resource_type, verb),
            resource: Some(resource_descriptor(resource_type, resource_id)),
            details: format!("{verb} on {resource_type}"),
            kind: AuditKind::Action,
            changes,
        }
    }

    /// `ERROR` event carrying the failure message.
    pub fn error(actor: &str, resource_type: &str, resource_id: &str, message: &str) -> Self {
        Self {
            actor: actor.to_string(),
            action: action_code(resource_type, "error"),
            resource: Some(resource_descriptor(resource_type, resource_id)),
            details: message.to_string(),
            kind: AuditKind::Error,
            changes: None,
        }
    }

    pub fn stamp(self, timestamp: DateTime<Utc>) -> AuditEvent {
        AuditEvent {
            timestamp,
            actor: self.actor,
            action: self.action,
            resource: self.resource,
            details: self.details,
            kind: self.kind,
            changes: self.changes,
        }
    }
}

/// Immutable record in the `auditoria` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub action: String,
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub details: String,
    pub kind: AuditKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<ChangeSet>,
}

/// `RESERVA_CREAR` from (`reserva`, `crear`).
pub fn action_code(resource_type: &str, verb: &str) -> String {
    format!("{}_{}", resource_type.to_uppercase(), verb.to_uppercase())
}

/// `reserva:42` from (`reserva`, `42`).
pub fn resource_descriptor(resource_type: &str, resource_id: &str) -> String {
    format!("{resource_type}:{resource_id}")
}
