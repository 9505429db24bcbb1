use std::sync::Arc;

use super::policy::{Action, Column, PolicySnapshot, Resource};
use super::registry::Roster;
use super::roles::RoleRef;
use crate::errors::{AppError, AppResult};

/// Outcome of a single policy lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
    /// The role is not known to the registry. Treated as deny; callers
    /// should report it as a policy-configuration problem, not a user error.
    UnknownRole,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Pure decision functions over one policy snapshot and one roster.
///
/// Evaluation order:
/// 1. admin role -> allow
/// 2. role not in registry -> unknown role (deny)
/// 3. explicit entry -> its value
/// 4. deny
#[derive(Debug, Clone)]
pub struct PermissionEngine {
    policy: Arc<PolicySnapshot>,
    roster: Arc<Roster>,
}

impl PermissionEngine {
    pub fn new(policy: Arc<PolicySnapshot>, roster: Arc<Roster>) -> Self {
        Self { policy, roster }
    }

    pub fn policy(&self) -> &PolicySnapshot {
        &self.policy
    }

    pub fn evaluate_action(&self, role: &RoleRef, resource: Resource, action: Action) -> Decision {
        if role.is_admin() {
            return Decision::Allow;
        }
        if !self.roster.contains(role) {
            return Decision::UnknownRole;
        }
        if !resource.is_grantable() {
            return Decision::Deny;
        }
        match self.policy.action_entry(role.key(), resource, action) {
            Some(true) => Decision::Allow,
            _ => Decision::Deny,
        }
    }

    pub fn evaluate_column(&self, role: &RoleRef, column: Column) -> Decision {
        if role.is_admin() {
            return Decision::Allow;
        }
        if !self.roster.contains(role) {
            return Decision::UnknownRole;
        }
        match self.policy.column_entry(role.key(), column) {
            Some(true) => Decision::Allow,
            _ => Decision::Deny,
        }
    }

    pub fn can_perform(&self, role: &RoleRef, resource: Resource, action: Action) -> bool {
        let decision = self.evaluate_action(role, resource, action);
        if decision == Decision::UnknownRole {
            tracing::warn!(
                role = %role,
                resource = resource.as_str(),
                action = action.as_str(),
                "policy inconsistency: role is not registered, denying"
            );
        }
        decision.is_allowed()
    }

    pub fn can_edit_column(&self, role: &RoleRef, column: Column) -> bool {
        let decision = self.evaluate_column(role, column);
        if decision == Decision::UnknownRole {
            tracing::warn!(
                role = %role,
                column = column.as_str(),
                "policy inconsistency: role is not registered, denying"
            );
        }
        decision.is_allowed()
    }

    /// `can_perform` as a `Result`, for handlers.
    pub fn require(&self, role: &RoleRef, resource: Resource, action: Action) -> AppResult<()> {
        if self.can_perform(role, resource, action) {
            return Ok(());
        }
        tracing::info!(
            role = %role,
            resource = resource.as_str(),
            action = action.as_str(),
            "action denied"
        );
        Err(AppError::forbidden(format!(
            "role '{role}' may not {} {}",
            action.as_str(),
            resource.as_str()
        )))
    }

    pub fn require_column(&self, role: &RoleRef, column: Column) -> AppResult<()> {
        if self.can_edit_column(role, column) {
            return Ok(());
        }
        tracing::info!(role = %role, column = column.as_str(), "column edit denied");
        Err(AppError::forbidden(format!(
            "role '{role}' may not edit {}",
            column.as_str()
        )))
    }

    pub fn allowed_actions(&self, role: &RoleRef, resource: Resource) -> Vec<Action> {
        Action::ALL
            .into_iter()
            .filter(|action| self.evaluate_action(role, resource, *action).is_allowed())
            .collect()
    }

    pub fn editable_columns(&self, role: &RoleRef) -> Vec<Column> {
        Column::ALL
            .into_iter()
            .filter(|column| self.evaluate_column(role, *column).is_allowed())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::policy::{ActionPermission, ColumnRule, PermissionsConfig};
    use crate::authz::roles::{BuiltinRole, CustomRole, CustomRoleKey};
    use chrono::Utc;
    use uuid::Uuid;

    fn grant(role: &str, resource: Resource, action: Action, can_perform: bool) -> ActionPermission {
        ActionPermission {
            role: role.to_string(),
            resource,
            action,
            can_perform,
            updated_at: Utc::now(),
        }
    }

    fn config(rules: Vec<ColumnRule>) -> PermissionsConfig {
        PermissionsConfig {
            id: Uuid::new_v4(),
            name: "default".into(),
            is_active: true,
            rules,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn custom(name: &str) -> CustomRole {
        CustomRole {
            id: Uuid::new_v4(),
            name: name.into(),
            label: name.into(),
            glyph: "🏷️".into(),
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    fn engine(config: Option<PermissionsConfig>, actions: Vec<ActionPermission>, custom: Vec<CustomRole>) -> PermissionEngine {
        PermissionEngine::new(
            Arc::new(PolicySnapshot::from_records(config.as_ref(), &actions)),
            Arc::new(Roster::new(custom)),
        )
    }

    #[test]
    fn missing_entries_deny_every_non_admin_role() {
        let engine = engine(None, Vec::new(), Vec::new());
        for role in BuiltinRole::ALL.into_iter().filter(|r| *r != BuiltinRole::Admin) {
            for resource in Resource::ALL {
                for action in Action::ALL {
                    assert!(!engine.can_perform(&role.into(), resource, action));
                }
            }
            for column in Column::ALL {
                assert!(!engine.can_edit_column(&role.into(), column));
            }
        }
    }

    #[test]
    fn admin_is_allowed_everything_regardless_of_entries() {
        let engine = engine(
            Some(config(vec![ColumnRule {
                role: "admin".into(),
                column: Column::Design,
                can_edit: false,
            }])),
            vec![grant("admin", Resource::Tasks, Action::Delete, false)],
            Vec::new(),
        );
        for resource in Resource::ALL {
            for action in Action::ALL {
                assert!(engine.can_perform(&RoleRef::ADMIN, resource, action));
            }
        }
        for column in Column::ALL {
            assert!(engine.can_edit_column(&RoleRef::ADMIN, column));
        }
    }

    #[test]
    fn content_writer_cannot_delete_tasks_without_entry() {
        let engine = engine(
            None,
            vec![grant("content-writer", Resource::Tasks, Action::Update, true)],
            Vec::new(),
        );
        let writer = RoleRef::Builtin(BuiltinRole::ContentWriter);
        assert!(!engine.can_perform(&writer, Resource::Tasks, Action::Delete));
        assert!(engine.can_perform(&writer, Resource::Tasks, Action::Update));
    }

    #[test]
    fn explicit_false_entry_denies() {
        let engine = engine(
            Some(config(vec![ColumnRule {
                role: "designer".into(),
                column: Column::Design,
                can_edit: false,
            }])),
            vec![grant("designer", Resource::Content, Action::View, false)],
            Vec::new(),
        );
        let designer = RoleRef::Builtin(BuiltinRole::Designer);
        assert!(!engine.can_perform(&designer, Resource::Content, Action::View));
        assert!(!engine.can_edit_column(&designer, Column::Design));
    }

    #[test]
    fn unknown_roles_are_denied_and_flagged() {
        let engine = engine(
            None,
            vec![grant("ghost", Resource::Tasks, Action::View, true)],
            Vec::new(),
        );
        let ghost = RoleRef::Unrecognized("ghost".into());
        assert_eq!(engine.evaluate_action(&ghost, Resource::Tasks, Action::View), Decision::UnknownRole);
        assert!(!engine.can_perform(&ghost, Resource::Tasks, Action::View));

        // A custom key that is no longer in the roster is just as unknown.
        let stale = RoleRef::Custom(CustomRoleKey::new("ghost"));
        assert_eq!(engine.evaluate_column(&stale, Column::Notes), Decision::UnknownRole);
    }

    #[test]
    fn registered_custom_role_uses_its_entries() {
        let engine = engine(
            Some(config(vec![ColumnRule {
                role: "video-editor".into(),
                column: Column::DriveLink,
                can_edit: true,
            }])),
            vec![grant("video-editor", Resource::Content, Action::Update, true)],
            vec![custom("video-editor")],
        );
        let editor = RoleRef::Custom(CustomRoleKey::new("video-editor"));
        assert!(engine.can_perform(&editor, Resource::Content, Action::Update));
        assert!(!engine.can_perform(&editor, Resource::Content, Action::Delete));
        assert_eq!(engine.editable_columns(&editor), vec![Column::DriveLink]);
    }

    #[test]
    fn permissions_resource_is_admin_only() {
        let engine = engine(None, Vec::new(), Vec::new());
        let manager = RoleRef::Builtin(BuiltinRole::Manager);
        assert!(!engine.can_perform(&manager, Resource::Permissions, Action::Update));
        assert!(matches!(
            engine.require(&manager, Resource::Permissions, Action::Update),
            Err(AppError::Forbidden(_))
        ));
        assert!(engine.require(&RoleRef::ADMIN, Resource::Permissions, Action::Update).is_ok());
    }
}
