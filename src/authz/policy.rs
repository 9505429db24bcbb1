use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;

/// Coarse entity categories subject to action checks.
///
/// `Permissions` covers the policy itself and the role registry. No stored
/// entry can grant it; only the administrator role holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Resource {
    Tasks,
    Content,
    Campaigns,
    Projects,
    Clients,
    Users,
    Permissions,
}

impl Resource {
    pub const ALL: [Resource; 7] = [
        Resource::Tasks,
        Resource::Content,
        Resource::Campaigns,
        Resource::Projects,
        Resource::Clients,
        Resource::Users,
        Resource::Permissions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Tasks => "tasks",
            Resource::Content => "content",
            Resource::Campaigns => "campaigns",
            Resource::Projects => "projects",
            Resource::Clients => "clients",
            Resource::Users => "users",
            Resource::Permissions => "permissions",
        }
    }

    /// True for resources whose grants live in the action matrix.
    pub fn is_grantable(&self) -> bool {
        !matches!(self, Resource::Permissions)
    }
}

impl FromStr for Resource {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Resource::ALL
            .into_iter()
            .find(|resource| resource.as_str() == value)
            .ok_or_else(|| AppError::bad_request(format!("unknown resource '{value}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Create,
    Update,
    Delete,
    View,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Create, Action::Update, Action::Delete, Action::View];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::View => "view",
        }
    }
}

impl FromStr for Action {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == value)
            .ok_or_else(|| AppError::bad_request(format!("unknown action '{value}'")))
    }
}

/// Task/content fields that carry their own edit grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Column {
    DesignBrief,
    Inspiration,
    Design,
    TextContent,
    DriveLink,
    Notes,
    Status,
}

impl Column {
    pub const ALL: [Column; 7] = [
        Column::DesignBrief,
        Column::Inspiration,
        Column::Design,
        Column::TextContent,
        Column::DriveLink,
        Column::Notes,
        Column::Status,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Column::DesignBrief => "design-brief",
            Column::Inspiration => "inspiration",
            Column::Design => "design",
            Column::TextContent => "text-content",
            Column::DriveLink => "drive-link",
            Column::Notes => "notes",
            Column::Status => "status",
        }
    }
}

impl FromStr for Column {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Column::ALL
            .into_iter()
            .find(|column| column.as_str() == value)
            .ok_or_else(|| AppError::bad_request(format!("unknown column '{value}'")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ColumnRule {
    pub role: String,
    pub column: Column,
    pub can_edit: bool,
}

/// Named bundle of column rules. At most one is active.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PermissionsConfig {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub rules: Vec<ColumnRule>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ActionPermission {
    pub role: String,
    pub resource: Resource,
    pub action: Action,
    pub can_perform: bool,
    pub updated_at: DateTime<Utc>,
}

/// Immutable view of the policy matrices. Readers hold an `Arc` to one of
/// these for the whole request; writers build a new one and swap it in.
#[derive(Debug, Clone, Default)]
pub struct PolicySnapshot {
    config_id: Option<Uuid>,
    config_name: Option<String>,
    columns: HashMap<(String, Column), bool>,
    actions: HashMap<(String, Resource, Action), bool>,
}

impl PolicySnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Later entries win over earlier ones on the same key. Entries for the
    /// reserved `permissions` resource are never loaded.
    pub fn from_records(config: Option<&PermissionsConfig>, actions: &[ActionPermission]) -> Self {
        let mut snapshot = Self::empty();

        if let Some(config) = config {
            snapshot.config_id = Some(config.id);
            snapshot.config_name = Some(config.name.clone());
            for rule in &config.rules {
                snapshot
                    .columns
                    .insert((rule.role.clone(), rule.column), rule.can_edit);
            }
        }

        for entry in actions {
            if !entry.resource.is_grantable() {
                tracing::warn!(
                    role = %entry.role,
                    action = entry.action.as_str(),
                    "ignoring stored grant on reserved permissions resource"
                );
                continue;
            }
            snapshot
                .actions
                .insert((entry.role.clone(), entry.resource, entry.action), entry.can_perform);
        }

        snapshot
    }

    pub fn config_id(&self) -> Option<Uuid> {
        self.config_id
    }

    pub fn config_name(&self) -> Option<&str> {
        self.config_name.as_deref()
    }

    pub fn column_entry(&self, role_key: &str, column: Column) -> Option<bool> {
        self.columns.get(&(role_key.to_string(), column)).copied()
    }

    pub fn action_entry(&self, role_key: &str, resource: Resource, action: Action) -> Option<bool> {
        self.actions
            .get(&(role_key.to_string(), resource, action))
            .copied()
    }

    /// Every role identifier mentioned by any entry.
    pub fn referenced_roles(&self) -> BTreeSet<&str> {
        self.columns
            .keys()
            .map(|(role, _)| role.as_str())
            .chain(self.actions.keys().map(|(role, _, _)| role.as_str()))
            .collect()
    }

    pub fn column_rules(&self) -> Vec<ColumnRule> {
        let mut rules: Vec<ColumnRule> = self
            .columns
            .iter()
            .map(|((role, column), can_edit)| ColumnRule {
                role: role.clone(),
                column: *column,
                can_edit: *can_edit,
            })
            .collect();
        rules.sort_by(|a, b| (a.role.as_str(), a.column).cmp(&(b.role.as_str(), b.column)));
        rules
    }

    pub fn action_rules(&self) -> Vec<(String, Resource, Action, bool)> {
        let mut rules: Vec<_> = self
            .actions
            .iter()
            .map(|((role, resource, action), allowed)| (role.clone(), *resource, *action, *allowed))
            .collect();
        rules.sort_by(|a, b| (a.0.as_str(), a.1, a.2).cmp(&(b.0.as_str(), b.1, b.2)));
        rules
    }

    /// Copy with one column rule of the current config replaced.
    pub fn with_column_rule(&self, rule: &ColumnRule) -> Self {
        let mut next = self.clone();
        next.columns.insert((rule.role.clone(), rule.column), rule.can_edit);
        next
    }

    /// Copy with one action entry replaced. Reserved-resource entries are
    /// ignored, as in [`PolicySnapshot::from_records`].
    pub fn with_action(&self, permission: &ActionPermission) -> Self {
        let mut next = self.clone();
        if permission.resource.is_grantable() {
            next.actions.insert(
                (permission.role.clone(), permission.resource, permission.action),
                permission.can_perform,
            );
        }
        next
    }

    pub fn without_action(&self, role_key: &str, resource: Resource, action: Action) -> Self {
        let mut next = self.clone();
        next.actions.remove(&(role_key.to_string(), resource, action));
        next
    }
}
