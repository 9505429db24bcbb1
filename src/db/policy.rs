use async_trait::async_trait;
use uuid::Uuid;

use super::row_parsers::{action_permission_from_row, column_rule_from_row, permissions_config_from_row};
use super::{conflict_on_unique, SqliteStore};
use crate::authz::{Action, ActionPermission, ColumnRule, PermissionsConfig, Resource};
use crate::errors::{AppError, AppResult};
use crate::store::PolicyRepository;
use crate::utils::{timestamp, utc_now};

const CONFIG_COLUMNS: &str = "id, name, is_active, created_by, created_at, updated_at";

impl SqliteStore {
    async fn attach_rules(&self, mut config: PermissionsConfig) -> AppResult<PermissionsConfig> {
        let rows = sqlx::query(
            "SELECT role, column_name, can_edit FROM column_permissions WHERE config_id = ? ORDER BY role, column_name",
        )
        .bind(config.id.to_string())
        .fetch_all(&self.pool)
        .await?;
        config.rules = rows.iter().map(column_rule_from_row).collect::<AppResult<_>>()?;
        Ok(config)
    }
}

#[async_trait]
impl PolicyRepository for SqliteStore {
    async fn load_active_config(&self) -> AppResult<Option<PermissionsConfig>> {
        let row = sqlx::query(&format!(
            "SELECT {CONFIG_COLUMNS} FROM permission_configs WHERE is_active = 1"
        ))
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(Some(self.attach_rules(permissions_config_from_row(&row)?).await?)),
            None => Ok(None),
        }
    }

    async fn list_configs(&self) -> AppResult<Vec<PermissionsConfig>> {
        let rows = sqlx::query(&format!(
            "SELECT {CONFIG_COLUMNS} FROM permission_configs ORDER BY created_at, name"
        ))
        .fetch_all(&self.pool)
        .await?;
        let mut configs = Vec::with_capacity(rows.len());
        for row in &rows {
            configs.push(self.attach_rules(permissions_config_from_row(row)?).await?);
        }
        Ok(configs)
    }

    async fn create_config(&self, name: &str, created_by: Option<Uuid>) -> AppResult<PermissionsConfig> {
        let now = utc_now();
        let config = PermissionsConfig {
            id: Uuid::new_v4(),
            name: name.to_string(),
            is_active: false,
            rules: Vec::new(),
            created_by,
            created_at: now,
            updated_at: now,
        };
        sqlx::query(
            "INSERT INTO permission_configs (id, name, is_active, created_by, created_at, updated_at) VALUES (?, ?, 0, ?, ?, ?)",
        )
        .bind(config.id.to_string())
        .bind(&config.name)
        .bind(created_by.map(|id| id.to_string()))
        .bind(timestamp(now))
        .bind(timestamp(now))
        .execute(&self.pool)
        .await
        .map_err(conflict_on_unique("permissions config name already in use"))?;
        Ok(config)
    }

    async fn activate_config(&self, config_id: Uuid) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE permission_configs SET is_active = 0 WHERE is_active = 1")
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("UPDATE permission_configs SET is_active = 1, updated_at = ? WHERE id = ?")
            .bind(timestamp(utc_now()))
            .bind(config_id.to_string())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(AppError::not_found("permissions config not found"));
        }
        tx.commit().await?;
        Ok(())
    }

    async fn upsert_column_rule(&self, config_id: Uuid, rule: &ColumnRule) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        let touched = sqlx::query("UPDATE permission_configs SET updated_at = ? WHERE id = ?")
            .bind(timestamp(utc_now()))
            .bind(config_id.to_string())
            .execute(&mut *tx)
            .await?;
        if touched.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(AppError::not_found("permissions config not found"));
        }
        sqlx::query(
            "INSERT INTO column_permissions (config_id, role, column_name, can_edit) VALUES (?, ?, ?, ?)
             ON CONFLICT (config_id, role, column_name) DO UPDATE SET can_edit = excluded.can_edit",
        )
        .bind(config_id.to_string())
        .bind(&rule.role)
        .bind(rule.column.as_str())
        .bind(rule.can_edit)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_action_permissions(&self) -> AppResult<Vec<ActionPermission>> {
        let rows = sqlx::query(
            "SELECT role, resource, action, can_perform, updated_at FROM action_permissions ORDER BY updated_at, seq",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(action_permission_from_row).collect()
    }

    async fn upsert_action_permission(&self, permission: &ActionPermission) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO action_permissions (role, resource, action, can_perform, updated_at) VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (role, resource, action) DO UPDATE SET
                can_perform = excluded.can_perform,
                updated_at = excluded.updated_at",
        )
        .bind(&permission.role)
        .bind(permission.resource.as_str())
        .bind(permission.action.as_str())
        .bind(permission.can_perform)
        .bind(timestamp(permission.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_action_permission(&self, role: &str, resource: Resource, action: Action) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM action_permissions WHERE role = ? AND resource = ? AND action = ?")
            .bind(role)
            .bind(resource.as_str())
            .bind(action.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
