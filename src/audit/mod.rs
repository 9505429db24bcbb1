//! Field-level audit trail for tasks.
//!
//! Only tracked fields are logged. Each entry is chained to the previous
//! entry of the same task by hash, and a logged transition may notify the
//! task's assignee.

pub mod chain;

use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::change_log::ChangeLogEntry;
use crate::models::notification::{Notification, NotificationKind};
use crate::models::task::{Task, TaskStatus};
use crate::notifications::NotificationDispatcher;
use crate::store::ChangeLogStore;
use crate::utils::utc_now;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackedField {
    Status,
    AssignedTo,
}

impl TrackedField {
    pub const ALL: [TrackedField; 2] = [TrackedField::Status, TrackedField::AssignedTo];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackedField::Status => "status",
            TrackedField::AssignedTo => "assigned_to",
        }
    }

    /// Persisted representation of this field on `task`.
    pub fn value_of(&self, task: &Task) -> Option<String> {
        match self {
            TrackedField::Status => Some(task.status.as_str().to_string()),
            TrackedField::AssignedTo => task.assigned_to.map(|id| id.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum SideEffect {
    ChangeLog,
    Notification,
}

/// A follow-up write that failed after its mutation committed. The
/// mutation still stands; this is reported for retry or backfill.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SideEffectFailure {
    pub effect: SideEffect,
    pub task_id: Uuid,
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ChangeRecord {
    pub entry: ChangeLogEntry,
    pub notification: Option<Notification>,
    pub failure: Option<SideEffectFailure>,
}

/// Everything the audit step produced for one applied write.
#[derive(Debug, Default)]
pub struct AuditReport {
    pub changes: Vec<ChangeLogEntry>,
    pub notifications: Vec<Notification>,
    pub failures: Vec<SideEffectFailure>,
}

pub struct AuditTrail {
    changes: Arc<dyn ChangeLogStore>,
    notifier: NotificationDispatcher,
    // Serialises read-last-hash + append so chains do not fork.
    append_lock: Mutex<()>,
}

impl AuditTrail {
    pub fn new(changes: Arc<dyn ChangeLogStore>, notifier: NotificationDispatcher) -> Self {
        Self {
            changes,
            notifier,
            append_lock: Mutex::new(()),
        }
    }

    /// Appends one entry for a real transition of `field`. `task` is the
    /// task as persisted after the write.
    ///
    /// Returns `Ok(None)` when `old == new`. A failed notification does not
    /// fail the call; it is returned in [`ChangeRecord::failure`].
    pub async fn record_change(
        &self,
        task: &Task,
        field: TrackedField,
        old: Option<&str>,
        new: Option<&str>,
        actor: Uuid,
    ) -> AppResult<Option<ChangeRecord>> {
        if old == new {
            return Ok(None);
        }

        let entry = {
            let _guard = self.append_lock.lock().await;
            let prev_hash = self.changes.last_change_hash(task.id).await?;
            let mut entry = ChangeLogEntry {
                id: Uuid::new_v4(),
                task_id: task.id,
                field_name: field.as_str().to_string(),
                old_value: old.map(str::to_string),
                new_value: new.map(str::to_string),
                changed_by: actor,
                changed_at: utc_now(),
                prev_hash,
                hash: String::new(),
            };
            entry.hash = chain::entry_hash(&entry);
            self.changes.append_change(&entry).await?;
            entry
        };

        tracing::debug!(
            task_id = %task.id,
            field = field.as_str(),
            actor = %actor,
            "change recorded"
        );

        let (notification, failure) = match self.notify_for(task, field, new, actor).await {
            Ok(notification) => (notification, None),
            Err(err) => {
                tracing::error!(
                    task_id = %task.id,
                    field = field.as_str(),
                    error = %err,
                    "notification failed after change was recorded"
                );
                let failure = SideEffectFailure {
                    effect: SideEffect::Notification,
                    task_id: task.id,
                    field: field.as_str().to_string(),
                    message: err.to_string(),
                };
                (None, Some(failure))
            }
        };

        Ok(Some(ChangeRecord {
            entry,
            notification,
            failure,
        }))
    }

    /// Records every tracked field that differs between `before` and
    /// `after`. Never fails; store errors come back as failures.
    pub async fn record_transitions(&self, before: &Task, after: &Task, actor: Uuid) -> AuditReport {
        let mut report = AuditReport::default();
        for field in TrackedField::ALL {
            let old = field.value_of(before);
            let new = field.value_of(after);
            match self
                .record_change(after, field, old.as_deref(), new.as_deref(), actor)
                .await
            {
                Ok(Some(record)) => {
                    report.changes.push(record.entry);
                    report.notifications.extend(record.notification);
                    report.failures.extend(record.failure);
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::error!(
                        task_id = %after.id,
                        field = field.as_str(),
                        error = %err,
                        "change log append failed; needs backfill"
                    );
                    report.failures.push(SideEffectFailure {
                        effect: SideEffect::ChangeLog,
                        task_id: after.id,
                        field: field.as_str().to_string(),
                        message: err.to_string(),
                    });
                }
            }
        }
        report
    }

    pub async fn history(&self, task_id: Uuid) -> AppResult<Vec<ChangeLogEntry>> {
        self.changes.list_changes(task_id).await
    }

    /// Recomputes the hash chain of a task's log.
    pub async fn verify_chain(&self, task_id: Uuid) -> AppResult<()> {
        let entries = self.changes.list_changes(task_id).await?;
        match chain::first_broken_link(&entries) {
            None => Ok(()),
            Some(idx) => {
                tracing::warn!(task_id = %task_id, entry = idx, "change log chain is broken");
                Err(AppError::internal(format!(
                    "change log for task {task_id} fails verification at entry {idx}"
                )))
            }
        }
    }

    async fn notify_for(
        &self,
        task: &Task,
        field: TrackedField,
        new: Option<&str>,
        actor: Uuid,
    ) -> AppResult<Option<Notification>> {
        let Some(assignee) = task.assigned_to.filter(|assignee| *assignee != actor) else {
            return Ok(None);
        };
        let link = task.link();

        let notification = match field {
            TrackedField::Status => {
                let status = new
                    .and_then(|value| TaskStatus::from_str(value).ok())
                    .map(|status| status.label().to_string())
                    .unwrap_or_else(|| new.unwrap_or_default().to_string());
                self.notifier
                    .notify(
                        NotificationKind::StatusUpdate,
                        "Task status updated",
                        &format!("\"{}\" is now {}", task.title, status),
                        Some(&link),
                        assignee,
                    )
                    .await?
            }
            TrackedField::AssignedTo => {
                // Only the new assignee hears about an assignment.
                if new != Some(assignee.to_string().as_str()) {
                    return Ok(None);
                }
                self.notifier
                    .notify(
                        NotificationKind::Assignment,
                        "New task assigned",
                        &format!("You have been assigned to \"{}\"", task.title),
                        Some(&link),
                        assignee,
                    )
                    .await?
            }
        };
        Ok(Some(notification))
    }
}
