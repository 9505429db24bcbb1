//! Data-access ports.
//!
//! The access-control core only talks to these traits. `db::SqliteStore` is
//! the production adapter; [`memory::MemoryStore`] keeps everything in
//! process and backs the unit tests.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::authz::{Action, ActionPermission, ColumnRule, CustomRole, PermissionsConfig, Resource};
use crate::errors::AppResult;
use crate::models::change_log::ChangeLogEntry;
use crate::models::notification::{Notification, NotificationKind};
use crate::models::task::Task;
use crate::models::user::{Client, DbClientUser, DbUser};

#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Custom roles in creation order.
    async fn list_custom_roles(&self) -> AppResult<Vec<CustomRole>>;

    /// Fails with a unique-violation error when the name is taken.
    async fn insert_custom_role(&self, role: &CustomRole) -> AppResult<()>;
}

#[async_trait]
pub trait PolicyRepository: Send + Sync {
    async fn load_active_config(&self) -> AppResult<Option<PermissionsConfig>>;

    async fn list_configs(&self) -> AppResult<Vec<PermissionsConfig>>;

    async fn create_config(&self, name: &str, created_by: Option<Uuid>) -> AppResult<PermissionsConfig>;

    /// Makes `config_id` the only active bundle in one step.
    async fn activate_config(&self, config_id: Uuid) -> AppResult<()>;

    /// Insert or replace the rule keyed by (config, role, column).
    async fn upsert_column_rule(&self, config_id: Uuid, rule: &ColumnRule) -> AppResult<()>;

    /// Action grants ordered oldest write first.
    async fn list_action_permissions(&self) -> AppResult<Vec<ActionPermission>>;

    async fn upsert_action_permission(&self, permission: &ActionPermission) -> AppResult<()>;

    /// Returns false when no entry existed.
    async fn delete_action_permission(&self, role: &str, resource: Resource, action: Action) -> AppResult<bool>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert_task(&self, task: &Task) -> AppResult<()>;

    async fn find_task(&self, id: Uuid) -> AppResult<Option<Task>>;

    /// Replaces the whole row if its stored version still equals
    /// `expected_version`. Returns false when another writer got there first.
    async fn replace_task(&self, task: &Task, expected_version: i64) -> AppResult<bool>;

    /// Deletes the task together with its change log.
    async fn delete_task(&self, id: Uuid) -> AppResult<bool>;

    /// Tasks assigned to `assignee` with a due date in `[from, to]`.
    async fn tasks_due_between(
        &self,
        assignee: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<Task>>;
}

#[async_trait]
pub trait ChangeLogStore: Send + Sync {
    async fn append_change(&self, entry: &ChangeLogEntry) -> AppResult<()>;

    /// Entries for a task in append order.
    async fn list_changes(&self, task_id: Uuid) -> AppResult<Vec<ChangeLogEntry>>;

    async fn last_change_hash(&self, task_id: Uuid) -> AppResult<Option<String>>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert_notification(&self, notification: &Notification) -> AppResult<()>;

    async fn find_notification(&self, id: Uuid) -> AppResult<Option<Notification>>;

    async fn mark_notification_read(&self, id: Uuid) -> AppResult<()>;

    /// Newest first.
    async fn list_notifications(&self, user_id: Uuid, unread_only: bool) -> AppResult<Vec<Notification>>;

    async fn notification_exists(&self, user_id: Uuid, kind: NotificationKind, link: &str) -> AppResult<bool>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: &DbUser) -> AppResult<()>;

    async fn find_user(&self, id: Uuid) -> AppResult<Option<DbUser>>;

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<DbUser>>;

    async fn list_users(&self) -> AppResult<Vec<DbUser>>;

    /// Whole-row replace of an existing user.
    async fn save_user(&self, user: &DbUser) -> AppResult<()>;

    async fn insert_client(&self, client: &Client) -> AppResult<()>;

    async fn find_client(&self, id: Uuid) -> AppResult<Option<Client>>;

    async fn insert_client_user(&self, user: &DbClientUser) -> AppResult<()>;

    async fn find_client_user(&self, id: Uuid) -> AppResult<Option<DbClientUser>>;

    async fn find_client_user_by_email(&self, email: &str) -> AppResult<Option<DbClientUser>>;

    async fn save_client_user(&self, user: &DbClientUser) -> AppResult<()>;
}

/// Everything the service needs from one backing store.
pub trait DataStore: RoleStore + PolicyRepository + TaskStore + ChangeLogStore + NotificationStore + UserStore {}

impl<T> DataStore for T where T: RoleStore + PolicyRepository + TaskStore + ChangeLogStore + NotificationStore + UserStore {}
