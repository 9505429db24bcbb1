use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{ChangeLogStore, NotificationStore, PolicyRepository, RoleStore, TaskStore, UserStore};
use crate::authz::{Action, ActionPermission, ColumnRule, CustomRole, PermissionsConfig, Resource};
use crate::errors::{AppError, AppResult};
use crate::models::change_log::ChangeLogEntry;
use crate::models::notification::{Notification, NotificationKind};
use crate::models::task::Task;
use crate::models::user::{Client, DbClientUser, DbUser};

/// In-process store. One lock covers all tables so every trait call is a
/// single atomic step.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    roles: Vec<CustomRole>,
    configs: Vec<PermissionsConfig>,
    actions: Vec<ActionPermission>,
    tasks: HashMap<Uuid, Task>,
    changes: Vec<ChangeLogEntry>,
    notifications: Vec<Notification>,
    users: Vec<DbUser>,
    clients: Vec<Client>,
    client_users: Vec<DbClientUser>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn list_custom_roles(&self) -> AppResult<Vec<CustomRole>> {
        Ok(self.state.lock().await.roles.clone())
    }

    async fn insert_custom_role(&self, role: &CustomRole) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state.roles.iter().any(|r| r.name.eq_ignore_ascii_case(&role.name)) {
            return Err(AppError::conflict(format!("role '{}' already exists", role.name)));
        }
        state.roles.push(role.clone());
        Ok(())
    }
}

#[async_trait]
impl PolicyRepository for MemoryStore {
    async fn load_active_config(&self) -> AppResult<Option<PermissionsConfig>> {
        let state = self.state.lock().await;
        Ok(state.configs.iter().find(|c| c.is_active).cloned())
    }

    async fn list_configs(&self) -> AppResult<Vec<PermissionsConfig>> {
        Ok(self.state.lock().await.configs.clone())
    }

    async fn create_config(&self, name: &str, created_by: Option<Uuid>) -> AppResult<PermissionsConfig> {
        let mut state = self.state.lock().await;
        if state.configs.iter().any(|c| c.name.eq_ignore_ascii_case(name)) {
            return Err(AppError::conflict(format!("permissions config '{name}' already exists")));
        }
        let now = Utc::now();
        let config = PermissionsConfig {
            id: Uuid::new_v4(),
            name: name.to_string(),
            is_active: false,
            rules: Vec::new(),
            created_by,
            created_at: now,
            updated_at: now,
        };
        state.configs.push(config.clone());
        Ok(config)
    }

    async fn activate_config(&self, config_id: Uuid) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if !state.configs.iter().any(|c| c.id == config_id) {
            return Err(AppError::not_found("permissions config not found"));
        }
        for config in state.configs.iter_mut() {
            config.is_active = config.id == config_id;
        }
        Ok(())
    }

    async fn upsert_column_rule(&self, config_id: Uuid, rule: &ColumnRule) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let config = state
            .configs
            .iter_mut()
            .find(|c| c.id == config_id)
            .ok_or_else(|| AppError::not_found("permissions config not found"))?;
        config
            .rules
            .retain(|r| !(r.role == rule.role && r.column == rule.column));
        config.rules.push(rule.clone());
        config.updated_at = Utc::now();
        Ok(())
    }

    async fn list_action_permissions(&self) -> AppResult<Vec<ActionPermission>> {
        Ok(self.state.lock().await.actions.clone())
    }

    async fn upsert_action_permission(&self, permission: &ActionPermission) -> AppResult<()> {
        let mut state = self.state.lock().await;
        state.actions.retain(|p| {
            !(p.role == permission.role && p.resource == permission.resource && p.action == permission.action)
        });
        state.actions.push(permission.clone());
        Ok(())
    }

    async fn delete_action_permission(&self, role: &str, resource: Resource, action: Action) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let before = state.actions.len();
        state
            .actions
            .retain(|p| !(p.role == role && p.resource == resource && p.action == action));
        Ok(state.actions.len() != before)
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn insert_task(&self, task: &Task) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state.tasks.contains_key(&task.id) {
            return Err(AppError::conflict("task already exists"));
        }
        state.tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn find_task(&self, id: Uuid) -> AppResult<Option<Task>> {
        Ok(self.state.lock().await.tasks.get(&id).cloned())
    }

    async fn replace_task(&self, task: &Task, expected_version: i64) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state.tasks.get_mut(&task.id) {
            Some(current) if current.version == expected_version => {
                *current = task.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_task(&self, id: Uuid) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let removed = state.tasks.remove(&id).is_some();
        if removed {
            state.changes.retain(|c| c.task_id != id);
        }
        Ok(removed)
    }

    async fn tasks_due_between(
        &self,
        assignee: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<Task>> {
        let state = self.state.lock().await;
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| t.assigned_to == Some(assignee))
            .filter(|t| t.due_date.map(|due| due >= from && due <= to).unwrap_or(false))
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.due_date);
        Ok(tasks)
    }
}

#[async_trait]
impl ChangeLogStore for MemoryStore {
    async fn append_change(&self, entry: &ChangeLogEntry) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if !state.tasks.contains_key(&entry.task_id) {
            return Err(AppError::not_found("task not found"));
        }
        state.changes.push(entry.clone());
        Ok(())
    }

    async fn list_changes(&self, task_id: Uuid) -> AppResult<Vec<ChangeLogEntry>> {
        let state = self.state.lock().await;
        Ok(state.changes.iter().filter(|c| c.task_id == task_id).cloned().collect())
    }

    async fn last_change_hash(&self, task_id: Uuid) -> AppResult<Option<String>> {
        let state = self.state.lock().await;
        Ok(state
            .changes
            .iter()
            .rev()
            .find(|c| c.task_id == task_id)
            .map(|c| c.hash.clone()))
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn insert_notification(&self, notification: &Notification) -> AppResult<()> {
        self.state.lock().await.notifications.push(notification.clone());
        Ok(())
    }

    async fn find_notification(&self, id: Uuid) -> AppResult<Option<Notification>> {
        let state = self.state.lock().await;
        Ok(state.notifications.iter().find(|n| n.id == id).cloned())
    }

    async fn mark_notification_read(&self, id: Uuid) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let notification = state
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| AppError::not_found("notification not found"))?;
        notification.is_read = true;
        Ok(())
    }

    async fn list_notifications(&self, user_id: Uuid, unread_only: bool) -> AppResult<Vec<Notification>> {
        let state = self.state.lock().await;
        Ok(state
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id && (!unread_only || !n.is_read))
            .cloned()
            .collect())
    }

    async fn notification_exists(&self, user_id: Uuid, kind: NotificationKind, link: &str) -> AppResult<bool> {
        let state = self.state.lock().await;
        Ok(state
            .notifications
            .iter()
            .any(|n| n.user_id == user_id && n.kind == kind && n.link.as_deref() == Some(link)))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: &DbUser) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state.users.iter().any(|u| u.email == user.email) {
            return Err(AppError::conflict("email already in use"));
        }
        state.users.push(user.clone());
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<DbUser>> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<DbUser>> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> AppResult<Vec<DbUser>> {
        Ok(self.state.lock().await.users.clone())
    }

    async fn save_user(&self, user: &DbUser) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let slot = state
            .users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or_else(|| AppError::not_found("user not found"))?;
        *slot = user.clone();
        Ok(())
    }

    async fn insert_client(&self, client: &Client) -> AppResult<()> {
        self.state.lock().await.clients.push(client.clone());
        Ok(())
    }

    async fn find_client(&self, id: Uuid) -> AppResult<Option<Client>> {
        let state = self.state.lock().await;
        Ok(state.clients.iter().find(|c| c.id == id).cloned())
    }

    async fn insert_client_user(&self, user: &DbClientUser) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state.client_users.iter().any(|u| u.email == user.email) {
            return Err(AppError::conflict("email already in use"));
        }
        state.client_users.push(user.clone());
        Ok(())
    }

    async fn find_client_user(&self, id: Uuid) -> AppResult<Option<DbClientUser>> {
        let state = self.state.lock().await;
        Ok(state.client_users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_client_user_by_email(&self, email: &str) -> AppResult<Option<DbClientUser>> {
        let state = self.state.lock().await;
        Ok(state.client_users.iter().find(|u| u.email == email).cloned())
    }

    async fn save_client_user(&self, user: &DbClientUser) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let slot = state
            .client_users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or_else(|| AppError::not_found("client user not found"))?;
        *slot = user.clone();
        Ok(())
    }
}
