//! Administrative-user directory over the `usuarios_admin` collection.
//!
//! Users are keyed by their external `uid`. Every store failure surfaces as
//! [`DirectoryError::Store`]; nothing here retries.
//!
//! Updates are read-modify-write without a transaction: two concurrent
//! `record_access` calls for the same user can lose one history entry
//! (last write wins).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map as JsonMap, Value as JsonValue};
use thiserror::Error;
use tracing::{debug, info};

use arboleda_auth::{AccessEvent, AdminUser, AdminUserPatch, NewAdminUser, Permission};
use arboleda_core::{DocumentId, Uid};

use crate::document_store::{ADMIN_USERS, Document, DocumentStore, StoreError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("admin user not found: {0}")]
    NotFound(Uid),

    #[error("admin user already exists: {0}")]
    AlreadyExists(Uid),

    #[error("corrupt admin user document {id}: {reason}")]
    Corrupt { id: DocumentId, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            collection: ADMIN_USERS.to_string(),
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    /// Register a user: active, no overrides, never accessed.
    pub async fn create(&self, new_user: NewAdminUser) -> Result<DocumentId, DirectoryError> {
        if self.find(&new_user.uid).await?.is_some() {
            return Err(DirectoryError::AlreadyExists(new_user.uid));
        }

        let user = AdminUser::new(new_user, Utc::now());
        let data = serde_json::to_value(&user).map_err(StoreError::from)?;
        let id = self.store.insert(&self.collection, data).await?;

        info!(uid = %user.uid, role = %user.role, %id, "admin user created");
        Ok(id)
    }

    pub async fn get_by_uid(&self, uid: &Uid) -> Result<Option<AdminUser>, DirectoryError> {
        Ok(self.find(uid).await?.map(|(_, user)| user))
    }

    pub async fn list_all(&self) -> Result<Vec<AdminUser>, DirectoryError> {
        self.store
            .list(&self.collection)
            .await?
            .into_iter()
            .map(|doc| decode(doc).map(|(_, user)| user))
            .collect()
    }

    /// Merge `patch` into the stored user and stamp `last_access` to now.
    pub async fn update(&self, uid: &Uid, patch: AdminUserPatch) -> Result<(), DirectoryError> {
        let (id, _) = self
            .find(uid)
            .await?
            .ok_or_else(|| DirectoryError::NotFound(uid.clone()))?;

        let mut fields = match serde_json::to_value(&patch).map_err(StoreError::from)? {
            JsonValue::Object(fields) => fields,
            _ => JsonMap::new(),
        };
        fields.insert(
            "last_access".to_string(),
            serde_json::to_value(Utc::now()).map_err(StoreError::from)?,
        );

        self.store.merge(&self.collection, id, fields).await?;
        debug!(%uid, %id, "admin user updated");
        Ok(())
    }

    pub async fn delete(&self, uid: &Uid) -> Result<(), DirectoryError> {
        let (id, _) = self
            .find(uid)
            .await?
            .ok_or_else(|| DirectoryError::NotFound(uid.clone()))?;

        self.store.delete(&self.collection, id).await?;
        info!(%uid, %id, "admin user deleted");
        Ok(())
    }

    /// Append a LOGIN entry to the user's access history (capped, FIFO).
    ///
    /// Silently does nothing for unknown users.
    pub async fn record_access(&self, uid: &Uid) -> Result<(), DirectoryError> {
        self.record_access_at(uid, Utc::now()).await
    }

    pub async fn record_access_at(
        &self,
        uid: &Uid,
        at: DateTime<Utc>,
    ) -> Result<(), DirectoryError> {
        let Some((_, mut user)) = self.find(uid).await? else {
            debug!(%uid, "access recorded for unknown admin user; ignored");
            return Ok(());
        };

        user.push_access(AccessEvent::login(at));
        let patch = AdminUserPatch {
            access_history: Some(user.access_history),
            ..Default::default()
        };
        self.update(uid, patch).await
    }

    /// Grant (`true`) or revoke (`false`) one permission for this user only.
    pub async fn set_override(
        &self,
        uid: &Uid,
        permission: Permission,
        granted: bool,
    ) -> Result<(), DirectoryError> {
        let mut user = self.require(uid).await?;
        user.overrides.insert(permission, granted);
        self.update(uid, AdminUserPatch::overrides(user.overrides)).await
    }

    /// Drop an override so the role decides again.
    pub async fn clear_override(
        &self,
        uid: &Uid,
        permission: &Permission,
    ) -> Result<(), DirectoryError> {
        let mut user = self.require(uid).await?;
        user.overrides.remove(permission);
        self.update(uid, AdminUserPatch::overrides(user.overrides)).await
    }

    async fn require(&self, uid: &Uid) -> Result<AdminUser, DirectoryError> {
        self.get_by_uid(uid)
            .await?
            .ok_or_else(|| DirectoryError::NotFound(uid.clone()))
    }

    async fn find(&self, uid: &Uid) -> Result<Option<(DocumentId, AdminUser)>, DirectoryError> {
        let key = JsonValue::String(uid.as_str().to_string());
        let docs = self.store.find_by_field(&self.collection, "uid", &key).await?;
        docs.into_iter().next().map(decode).transpose()
    }
}

fn decode(doc: Document) -> Result<(DocumentId, AdminUser), DirectoryError> {
    let id = doc.id;
    serde_json::from_value(doc.data)
        .map(|user| (id, user))
        .map_err(|e| DirectoryError::Corrupt {
            id,
            reason: e.to_string(),
        })
}
