//! Authorization core
//!
//! - [`RoleRegistry`]: built-in roles plus administrator-created custom roles
//! - [`PolicyStore`]: the column and action matrices, swapped atomically on write
//! - [`PermissionEngine`]: fail-closed decisions over one policy snapshot
//!
//! Role identifiers coming from users or stored entries are always resolved
//! through the registry into a [`RoleRef`] before they reach the engine.

mod engine;
mod policy;
mod policy_store;
mod registry;
mod roles;

pub use engine::{Decision, PermissionEngine};
pub use policy::{Action, ActionPermission, Column, ColumnRule, PermissionsConfig, PolicySnapshot, Resource};
pub use policy_store::{PolicyStore, DEFAULT_CONFIG_NAME};
pub use registry::{RoleRegistry, Roster};
pub use roles::{normalize_role_key, BuiltinRole, CustomRole, CustomRoleKey, RoleMetadata, RoleRef};
