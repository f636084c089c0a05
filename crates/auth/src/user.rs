//! Administrative-user record.
//!
//! Pure data plus the in-memory rules that apply to it (history cap, patch
//! merge). Persistence lives in the infra directory.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use arboleda_core::Uid;

use crate::{Permission, RoleId};

/// Maximum number of access events retained per user (oldest evicted first).
pub const ACCESS_HISTORY_LIMIT: usize = 50;

/// Account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
}

impl core::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            UserStatus::Active => write!(f, "active"),
            UserStatus::Inactive => write!(f, "inactive"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessKind {
    Login,
}

/// One entry of the access history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEvent {
    pub at: DateTime<Utc>,
    pub kind: AccessKind,
}

impl AccessEvent {
    pub fn login(at: DateTime<Utc>) -> Self {
        Self {
            at,
            kind: AccessKind::Login,
        }
    }
}

/// An administrative user as stored in `usuarios_admin`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUser {
    pub uid: Uid,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    pub role: RoleId,
    /// Per-user exceptions: `true` grants, `false` revokes, regardless of role.
    #[serde(default)]
    pub overrides: BTreeMap<Permission, bool>,
    #[serde(default)]
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_access: Option<DateTime<Utc>>,
    #[serde(default)]
    pub access_history: VecDeque<AccessEvent>,
}

impl AdminUser {
    /// A fresh record: active, no overrides, never accessed.
    pub fn new(new_user: NewAdminUser, created_at: DateTime<Utc>) -> Self {
        Self {
            uid: new_user.uid,
            email: new_user.email,
            name: new_user.name,
            role: new_user.role,
            overrides: BTreeMap::new(),
            status: UserStatus::Active,
            created_at,
            last_access: None,
            access_history: VecDeque::new(),
        }
    }

    /// Label used as the actor of audit events.
    pub fn actor_label(&self) -> &str {
        if self.email.trim().is_empty() {
            self.uid.as_str()
        } else {
            &self.email
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// Append a login, evicting from the front beyond the history cap.
    pub fn push_access(&mut self, event: AccessEvent) {
        self.access_history.push_back(event);
        while self.access_history.len() > ACCESS_HISTORY_LIMIT {
            self.access_history.pop_front();
        }
    }

    /// Merge an explicit patch; fields left as `None` are untouched.
    pub fn apply_patch(&mut self, patch: AdminUserPatch) {
        if let Some(email) = patch.email {
            self.email = email;
        }
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
        if let Some(overrides) = patch.overrides {
            self.overrides = overrides;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(history) = patch.access_history {
            self.access_history = history;
        }
    }
}

/// Data supplied by an administrator when creating a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAdminUser {
    pub uid: Uid,
    pub email: String,
    pub name: String,
    pub role: RoleId,
}

/// Partial update of an [`AdminUser`]; `None` leaves a field as is.
///
/// `uid` and `created_at` are immutable and not patchable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<RoleId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overrides: Option<BTreeMap<Permission, bool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<UserStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_history: Option<VecDeque<AccessEvent>>,
}

impl AdminUserPatch {
    pub fn role(role: impl Into<RoleId>) -> Self {
        Self {
            role: Some(role.into()),
            ..Default::default()
        }
    }

    pub fn status(status: UserStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn overrides(overrides: BTreeMap<Permission, bool>) -> Self {
        Self {
            overrides: Some(overrides),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
