//! Request-scoped operations that combine the authorization core with the
//! stores. Handlers stay thin and call into these.

pub mod tasks;
pub mod users;

use serde::Serialize;
use uuid::Uuid;

use crate::audit::SideEffectFailure;
use crate::authz::RoleRef;
use crate::models::change_log::ChangeLogEntry;
use crate::models::notification::Notification;

/// The authenticated staff member performing an operation.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: RoleRef,
}

impl Actor {
    pub fn new(user_id: Uuid, role: RoleRef) -> Self {
        Self { user_id, role }
    }
}

/// Result of a committed mutation plus its follow-up effects.
///
/// `failures` lists side effects (change log, notifications) that did not
/// go through; the mutation itself succeeded regardless.
#[derive(Debug, Serialize)]
pub struct MutationOutcome<T> {
    pub value: T,
    pub changes: Vec<ChangeLogEntry>,
    pub notifications: Vec<Notification>,
    pub failures: Vec<SideEffectFailure>,
}

impl<T> MutationOutcome<T> {
    pub fn plain(value: T) -> Self {
        Self {
            value,
            changes: Vec::new(),
            notifications: Vec::new(),
            failures: Vec::new(),
        }
    }
}
