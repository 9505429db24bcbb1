use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use super::engine::PermissionEngine;
use super::policy::{Action, ActionPermission, Column, ColumnRule, PermissionsConfig, PolicySnapshot, Resource};
use super::registry::RoleRegistry;
use super::roles::RoleRef;
use crate::errors::{AppError, AppResult};
use crate::store::PolicyRepository;
use crate::utils::utc_now;

pub const DEFAULT_CONFIG_NAME: &str = "default";

const REBUILD_ATTEMPTS: u32 = 3;

/// Owns the column and action matrices.
///
/// Readers take an `Arc<PolicySnapshot>` and keep it for the request.
/// Writers persist first, then derive the next snapshot and swap it in
/// while still holding the write lock, so a reader sees either the old
/// policy or the new one and nothing in between. Entry writes are applied
/// to the cached snapshot; config activation reloads from the store.
pub struct PolicyStore {
    repo: Arc<dyn PolicyRepository>,
    registry: Arc<RoleRegistry>,
    snapshot: RwLock<Arc<PolicySnapshot>>,
}

impl PolicyStore {
    pub async fn load(repo: Arc<dyn PolicyRepository>, registry: Arc<RoleRegistry>) -> AppResult<Self> {
        if repo.load_active_config().await?.is_none() {
            ensure_default_config(repo.as_ref()).await?;
        }
        let snapshot = build_snapshot(repo.as_ref()).await?;
        let store = Self {
            repo,
            registry,
            snapshot: RwLock::new(Arc::new(snapshot)),
        };
        store.report_unknown_roles().await;
        Ok(store)
    }

    pub async fn snapshot(&self) -> Arc<PolicySnapshot> {
        Arc::clone(&*self.snapshot.read().await)
    }

    /// Decision engine over the current policy and roster. Build one per
    /// request and reuse it for every check in that request.
    pub async fn engine(&self) -> PermissionEngine {
        PermissionEngine::new(self.snapshot().await, self.registry.roster().await)
    }

    pub fn registry(&self) -> &Arc<RoleRegistry> {
        &self.registry
    }

    pub async fn set_column_permission(
        &self,
        caller: &RoleRef,
        role_id: &str,
        column: Column,
        can_edit: bool,
    ) -> AppResult<ColumnRule> {
        self.authorize_mutation(caller).await?;
        let role = self.registry.resolve(role_id).await?;

        let mut guard = self.snapshot.write().await;
        let config_id = match guard.config_id() {
            Some(id) => id,
            None => ensure_default_config(self.repo.as_ref()).await?.id,
        };
        let rule = ColumnRule {
            role: role.id,
            column,
            can_edit,
        };
        self.repo.upsert_column_rule(config_id, &rule).await?;
        let next = if guard.config_id() == Some(config_id) {
            guard.with_column_rule(&rule)
        } else {
            self.rebuild_after_write().await?
        };
        *guard = Arc::new(next);

        tracing::info!(
            caller = %caller,
            role = %rule.role,
            column = column.as_str(),
            can_edit,
            "column permission updated"
        );
        Ok(rule)
    }

    pub async fn set_action_permission(
        &self,
        caller: &RoleRef,
        role_id: &str,
        resource: Resource,
        action: Action,
        allowed: bool,
    ) -> AppResult<ActionPermission> {
        self.authorize_mutation(caller).await?;
        if !resource.is_grantable() {
            return Err(AppError::bad_request(
                "the permissions resource is reserved for administrators",
            ));
        }
        let role = self.registry.resolve(role_id).await?;

        let permission = ActionPermission {
            role: role.id,
            resource,
            action,
            can_perform: allowed,
            updated_at: utc_now(),
        };

        let mut guard = self.snapshot.write().await;
        self.repo.upsert_action_permission(&permission).await?;
        *guard = Arc::new(guard.with_action(&permission));

        tracing::info!(
            caller = %caller,
            role = %permission.role,
            resource = resource.as_str(),
            action = action.as_str(),
            allowed,
            "action permission updated"
        );
        Ok(permission)
    }

    /// Drops an explicit entry so the pair falls back to deny.
    pub async fn remove_action_permission(
        &self,
        caller: &RoleRef,
        role_id: &str,
        resource: Resource,
        action: Action,
    ) -> AppResult<()> {
        self.authorize_mutation(caller).await?;
        // Stale entries for roles that no longer resolve may still be removed.
        let key = match self.registry.resolve(role_id).await {
            Ok(role) => role.id,
            Err(_) => role_id.to_string(),
        };

        let mut guard = self.snapshot.write().await;
        if !self.repo.delete_action_permission(&key, resource, action).await? {
            return Err(AppError::not_found(format!(
                "no permission entry for {key}/{}/{}",
                resource.as_str(),
                action.as_str()
            )));
        }
        *guard = Arc::new(guard.without_action(&key, resource, action));

        tracing::info!(
            caller = %caller,
            role = %key,
            resource = resource.as_str(),
            action = action.as_str(),
            "action permission removed"
        );
        Ok(())
    }

    pub async fn list_configs(&self) -> AppResult<Vec<PermissionsConfig>> {
        self.repo.list_configs().await
    }

    pub async fn create_config(&self, caller: &RoleRef, name: &str, creator: Uuid) -> AppResult<PermissionsConfig> {
        self.authorize_mutation(caller).await?;
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::bad_request("config name must not be empty"));
        }
        let config = self.repo.create_config(name, Some(creator)).await?;
        tracing::info!(caller = %caller, config = %config.name, "permissions config created");
        Ok(config)
    }

    /// Makes `config_id` the authoritative column bundle.
    pub async fn activate_config(&self, caller: &RoleRef, config_id: Uuid) -> AppResult<()> {
        self.authorize_mutation(caller).await?;
        let mut guard = self.snapshot.write().await;
        self.repo.activate_config(config_id).await?;
        *guard = Arc::new(self.rebuild_after_write().await?);
        tracing::info!(caller = %caller, config_id = %config_id, "permissions config activated");
        Ok(())
    }

    /// Reloads the policy after a write that could not be applied to the
    /// cached snapshot directly. The write is already persisted, so a failed
    /// reload is retried before it is reported.
    async fn rebuild_after_write(&self) -> AppResult<PolicySnapshot> {
        let mut attempt = 1;
        loop {
            match build_snapshot(self.repo.as_ref()).await {
                Ok(snapshot) => return Ok(snapshot),
                Err(err) if attempt < REBUILD_ATTEMPTS => {
                    tracing::warn!(attempt, error = %err, "policy reload failed, retrying");
                    attempt += 1;
                }
                Err(err) => {
                    tracing::error!(
                        error = %err,
                        "policy write persisted but reload failed; cached policy is stale until the next write"
                    );
                    return Err(err);
                }
            }
        }
    }

    async fn authorize_mutation(&self, caller: &RoleRef) -> AppResult<()> {
        self.engine()
            .await
            .require(caller, Resource::Permissions, Action::Update)
    }

    async fn report_unknown_roles(&self) {
        let snapshot = self.snapshot().await;
        let roster = self.registry.roster().await;
        for role in snapshot.referenced_roles() {
            if !roster.resolve_ref(role).is_recognized() {
                tracing::warn!(role, "policy inconsistency: entry references an unknown role");
            }
        }
    }
}

async fn ensure_default_config(repo: &dyn PolicyRepository) -> AppResult<PermissionsConfig> {
    let existing = repo
        .list_configs()
        .await?
        .into_iter()
        .find(|config| config.name == DEFAULT_CONFIG_NAME);
    let config = match existing {
        Some(config) => config,
        None => repo.create_config(DEFAULT_CONFIG_NAME, None).await?,
    };
    repo.activate_config(config.id).await?;
    tracing::info!(config_id = %config.id, "activated default permissions config");
    Ok(PermissionsConfig {
        is_active: true,
        ..config
    })
}

async fn build_snapshot(repo: &dyn PolicyRepository) -> AppResult<PolicySnapshot> {
    let config = repo.load_active_config().await?;
    let actions = repo.list_action_permissions().await?;
    Ok(PolicySnapshot::from_records(config.as_ref(), &actions))
}
