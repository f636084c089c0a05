//! Guarded execution: check, act, log.
//!
//! Each invocation moves through `Checking -> {Denied, Executing}` and
//! `Executing -> {Succeeded, Failed}`. The action runs at most once and only
//! after the permission check passed; every terminal state records an audit
//! event (best effort).

use std::fmt::Display;
use std::future::Future;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use arboleda_auth::{AdminUser, Permission, PermissionResolver};
use arboleda_core::Uid;

use crate::audit::{AuditLog, ChangeSet};
use crate::directory::UserDirectory;

/// Actor recorded when no identity was supplied.
pub const ANONYMOUS_ACTOR: &str = "anonymous";

/// What the guarded action touches, for the audit trail.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditContext {
    pub verb: String,
    pub resource_type: String,
    pub resource_id: String,
    pub changes: Option<ChangeSet>,
}

impl Default for AuditContext {
    fn default() -> Self {
        Self {
            verb: "modificar".to_string(),
            resource_type: "desconocido".to_string(),
            resource_id: String::new(),
            changes: None,
        }
    }
}

impl AuditContext {
    pub fn new(
        verb: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            verb: verb.into(),
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            changes: None,
        }
        .or_defaults()
    }

    /// Blank `verb` and `resource_type` fall back to the defaults.
    pub fn or_defaults(mut self) -> Self {
        let defaults = Self::default();
        if self.verb.trim().is_empty() {
            self.verb = defaults.verb;
        }
        if self.resource_type.trim().is_empty() {
            self.resource_type = defaults.resource_type;
        }
        self
    }

    pub fn with_changes(mut self, changes: ChangeSet) -> Self {
        self.changes = Some(changes);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardPhase {
    Checking,
    Denied,
    Executing,
    Succeeded,
    Failed,
}

/// Failure of a guarded call.
///
/// `PermissionDenied` is always distinguishable from a failure of the action
/// itself, which is carried unchanged in `Action`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GuardError<E> {
    #[error("permission denied: {0}")]
    PermissionDenied(Permission),

    #[error("{0}")]
    Action(E),
}

impl<E> GuardError<E> {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, GuardError::PermissionDenied(_))
    }

    /// The action's own error, if the action ran and failed.
    pub fn into_action_error(self) -> Option<E> {
        match self {
            GuardError::Action(e) => Some(e),
            GuardError::PermissionDenied(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GuardedExecutor {
    resolver: PermissionResolver,
    audit: AuditLog,
}

impl GuardedExecutor {
    pub fn new(resolver: PermissionResolver, audit: AuditLog) -> Self {
        Self { resolver, audit }
    }

    pub fn resolver(&self) -> &PermissionResolver {
        &self.resolver
    }

    /// Run `action` if `user` holds `required`, auditing the outcome.
    pub async fn execute<T, E, F, Fut>(
        &self,
        user: Option<&AdminUser>,
        required: &Permission,
        context: AuditContext,
        action: F,
    ) -> Result<T, GuardError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let context = context.or_defaults();
        let actor = user.map_or(ANONYMOUS_ACTOR, AdminUser::actor_label).to_string();
        debug!(phase = ?GuardPhase::Checking, %actor, permission = %required);

        let decision = self.resolver.explain(user, required);
        if !decision.granted {
            warn!(
                phase = ?GuardPhase::Denied,
                %actor,
                permission = %required,
                source = ?decision.source,
                "permission denied"
            );
            self.audit.record_denial(&actor, required.as_str(), &context.resource_type);
            return Err(GuardError::PermissionDenied(required.clone()));
        }

        debug!(phase = ?GuardPhase::Executing, %actor, permission = %required);
        match action().await {
            Ok(value) => {
                info!(
                    phase = ?GuardPhase::Succeeded,
                    %actor,
                    verb = %context.verb,
                    resource_type = %context.resource_type,
                    resource_id = %context.resource_id,
                    "guarded action succeeded"
                );
                self.audit.record_success(
                    &actor,
                    &context.verb,
                    &context.resource_type,
                    &context.resource_id,
                    context.changes,
                );
                Ok(value)
            }
            Err(e) => {
                let message = e.to_string();
                error!(
                    phase = ?GuardPhase::Failed,
                    %actor,
                    resource_type = %context.resource_type,
                    error = %message,
                    "guarded action failed"
                );
                self.audit.record_error(
                    &actor,
                    &context.resource_type,
                    &context.resource_id,
                    &message,
                );
                Err(GuardError::Action(e))
            }
        }
    }

    /// Like [`execute`](Self::execute), resolving the caller through the directory.
    ///
    /// Unknown uids and directory failures resolve to "no identity", so the
    /// call is denied.
    pub async fn execute_for_uid<T, E, F, Fut>(
        &self,
        directory: &UserDirectory,
        uid: &Uid,
        required: &Permission,
        context: AuditContext,
        action: F,
    ) -> Result<T, GuardError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let user = match directory.get_by_uid(uid).await {
            Ok(user) => user,
            Err(e) => {
                error!(
                    %uid,
                    error = %e,
                    "admin user lookup failed; treating caller as unidentified"
                );
                None
            }
        };
        self.execute(user.as_ref(), required, context, action).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;

    use arboleda_auth::{NewAdminUser, RoleId, RoleRegistry};

    use super::*;
    use crate::audit::AuditKind;
    use crate::config::AuditConfig;
    use crate::document_store::{AUDIT_LOG, DocumentStore, InMemoryDocumentStore};

    fn user(role: &'static str) -> AdminUser {
        AdminUser::new(
            NewAdminUser {
                uid: Uid::new("u-1"),
                email: "caja@arboleda.pe".to_string(),
                name: "Caja".to_string(),
                role: RoleId::new(role),
            },
            Utc::now(),
        )
    }

    fn setup() -> (Arc<InMemoryDocumentStore>, GuardedExecutor, crate::audit::AuditWorker) {
        let store = Arc::new(InMemoryDocumentStore::new());
        let (audit, worker) = AuditLog::spawn(store.clone(), AuditConfig::default());
        let resolver = PermissionResolver::new(Arc::new(RoleRegistry::builtin()));
        (store, GuardedExecutor::new(resolver, audit), worker)
    }

    async fn audit_kinds(store: &InMemoryDocumentStore) -> Vec<String> {
        store
            .list(AUDIT_LOG)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.data["kind"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    #[tokio::test]
    async fn denied_action_never_runs() {
        let (store, guard, worker) = setup();
        let calls = AtomicUsize::new(0);
        let u = user("recepcionista");

        let result: Result<(), GuardError<String>> = guard
            .execute(
                Some(&u),
                &Permission::new("carta.crear"),
                AuditContext::new("crear", "plato", "p-1"),
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                },
            )
            .await;

        assert_eq!(
            result.unwrap_err(),
            GuardError::PermissionDenied(Permission::new("carta.crear"))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        worker.shutdown().await;
        assert_eq!(audit_kinds(&store).await, ["SECURITY"]);
    }

    #[tokio::test]
    async fn missing_user_is_denied_as_anonymous() {
        let (store, guard, worker) = setup();

        let result: Result<(), GuardError<String>> = guard
            .execute(
                None,
                &Permission::new("reservas.leer"),
                AuditContext::default(),
                || async { Ok(()) },
            )
            .await;
        assert!(result.unwrap_err().is_permission_denied());

        worker.shutdown().await;
        let docs = store.list(AUDIT_LOG).await.unwrap();
        assert_eq!(docs[0].data["actor"], ANONYMOUS_ACTOR);
        assert_eq!(docs[0].data["resource"], "desconocido");
    }

    #[tokio::test]
    async fn success_runs_once_and_records_action() {
        let (store, guard, worker) = setup();
        let calls = AtomicUsize::new(0);
        let u = user("recepcionista");

        let value: Result<u32, GuardError<String>> = guard
            .execute(
                Some(&u),
                &Permission::new("reservas.cambiar_estado"),
                AuditContext::new("cambiar_estado", "reserva", "r-7"),
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                },
            )
            .await;

        assert_eq!(value.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        worker.shutdown().await;
        let docs = store.list(AUDIT_LOG).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].data["kind"], "ACTION");
        assert_eq!(docs[0].data["action"], "RESERVA_CAMBIAR_ESTADO");
        assert_eq!(docs[0].data["resource"], "reserva:r-7");
        assert_eq!(docs[0].data["actor"], "caja@arboleda.pe");
    }

    #[tokio::test]
    async fn failure_records_error_and_returns_original() {
        let (store, guard, worker) = setup();
        let u = user("admin_carta");

        let result: Result<(), GuardError<String>> = guard
            .execute(
                Some(&u),
                &Permission::new("carta.eliminar"),
                AuditContext::new("eliminar", "plato", "p-3"),
                || async { Err("plato en uso".to_string()) },
            )
            .await;

        assert_eq!(result.unwrap_err().into_action_error().as_deref(), Some("plato en uso"));

        worker.shutdown().await;
        let docs = store.list(AUDIT_LOG).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].data["kind"], serde_json::json!(AuditKind::Error));
        assert_eq!(docs[0].data["details"], "plato en uso");
    }

    #[tokio::test]
    async fn override_grant_lets_action_through() {
        let (store, guard, worker) = setup();
        let mut u = user("recepcionista");
        u.overrides.insert(Permission::new("carta.crear"), true);

        let result: Result<&str, GuardError<String>> = guard
            .execute(
                Some(&u),
                &Permission::new("carta.crear"),
                AuditContext::new("crear", "plato", "p-1"),
                || async { Ok("ok") },
            )
            .await;
        assert_eq!(result.unwrap(), "ok");

        worker.shutdown().await;
        assert_eq!(audit_kinds(&store).await, ["ACTION"]);
    }

    #[tokio::test]
    async fn blank_context_falls_back_to_defaults() {
        let (store, guard, worker) = setup();
        let u = user("recepcionista");

        let denied: Result<(), GuardError<String>> = guard
            .execute(
                Some(&u),
                &Permission::new("config.ver"),
                AuditContext::new("", "", ""),
                || async { Ok(()) },
            )
            .await;
        assert!(denied.unwrap_err().is_permission_denied());

        let blank = AuditContext {
            verb: String::new(),
            resource_type: "reserva".to_string(),
            resource_id: "r-2".to_string(),
            changes: None,
        };
        let done: Result<(), GuardError<String>> = guard
            .execute(Some(&u), &Permission::new("reservas.leer"), blank, || async { Ok(()) })
            .await;
        assert!(done.is_ok());

        worker.shutdown().await;
        let docs = store.list(AUDIT_LOG).await.unwrap();
        assert_eq!(docs[0].data["resource"], "desconocido");
        assert_eq!(docs[1].data["action"], "RESERVA_MODIFICAR");
        assert_eq!(docs[1].data["details"], "modificar on reserva");
    }

    #[test]
    fn or_defaults_keeps_given_values() {
        let ctx = AuditContext::new("crear", "plato", "p-1");
        assert_eq!(ctx.verb, "crear");
        assert_eq!(ctx.resource_type, "plato");

        let ctx = AuditContext::new("  ", "", "p-1");
        assert_eq!(ctx.verb, "modificar");
        assert_eq!(ctx.resource_type, "desconocido");
        assert_eq!(ctx.resource_id, "p-1");
    }

    #[test]
    fn guard_error_display_is_distinguishable() {
        let denied: GuardError<String> =
            GuardError::PermissionDenied(Permission::new("config.ver"));
        let failed: GuardError<String> = GuardError::Action("timeout".to_string());
        assert_eq!(denied.to_string(), "permission denied: config.ver");
        assert_eq!(failed.to_string(), "timeout");
        assert!(!failed.is_permission_denied());
    }
}
