use std::sync::Arc;

use chrono::Duration;
use uuid::Uuid;

use super::{Actor, MutationOutcome};
use crate::audit::{AuditTrail, SideEffect, SideEffectFailure};
use crate::authz::{Action, Column, PermissionEngine, Resource};
use crate::errors::{AppError, AppResult};
use crate::models::change_log::ChangeLogEntry;
use crate::models::notification::{Notification, NotificationKind};
use crate::models::task::{Task, TaskCreateRequest, TaskPatch, TaskStatus};
use crate::notifications::NotificationDispatcher;
use crate::store::TaskStore;
use crate::utils::utc_now;

const MAX_WRITE_ATTEMPTS: usize = 3;

pub struct TaskService {
    tasks: Arc<dyn TaskStore>,
    audit: Arc<AuditTrail>,
    notifier: NotificationDispatcher,
}

impl TaskService {
    pub fn new(tasks: Arc<dyn TaskStore>, audit: Arc<AuditTrail>, notifier: NotificationDispatcher) -> Self {
        Self { tasks, audit, notifier }
    }

    pub async fn create(
        &self,
        actor: &Actor,
        engine: &PermissionEngine,
        payload: TaskCreateRequest,
    ) -> AppResult<MutationOutcome<Task>> {
        engine.require(&actor.role, Resource::Tasks, Action::Create)?;
        if payload.design_brief.is_some() {
            engine.require_column(&actor.role, Column::DesignBrief)?;
        }
        if payload.notes.is_some() {
            engine.require_column(&actor.role, Column::Notes)?;
        }
        if payload.status.is_some_and(|status| status != TaskStatus::Todo) {
            engine.require_column(&actor.role, Column::Status)?;
        }

        let title = payload.title.trim();
        if title.is_empty() {
            return Err(AppError::bad_request("title must not be empty"));
        }

        let now = utc_now();
        let task = Task {
            id: Uuid::new_v4(),
            project_id: payload.project_id,
            title: title.to_string(),
            status: payload.status.unwrap_or(TaskStatus::Todo),
            assigned_to: payload.assigned_to,
            due_date: payload.due_date,
            design_brief: payload.design_brief.filter(|v| !v.is_empty()),
            inspiration: None,
            design: None,
            text_content: None,
            drive_link: None,
            notes: payload.notes.filter(|v| !v.is_empty()),
            version: 1,
            created_by: actor.user_id,
            created_at: now,
            updated_at: now,
        };
        self.tasks.insert_task(&task).await?;
        tracing::info!(task_id = %task.id, actor = %actor.user_id, "task created");

        let mut outcome = MutationOutcome::plain(task);
        if let Some(assignee) = outcome.value.assigned_to.filter(|a| *a != actor.user_id) {
            let task = &outcome.value;
            let sent = self
                .notifier
                .notify(
                    NotificationKind::Assignment,
                    "New task assigned",
                    &format!("You have been assigned to \"{}\"", task.title),
                    Some(&task.link()),
                    assignee,
                )
                .await;
            match sent {
                Ok(notification) => outcome.notifications.push(notification),
                Err(err) => {
                    tracing::error!(task_id = %task.id, error = %err, "assignment notification failed");
                    outcome.failures.push(SideEffectFailure {
                        effect: SideEffect::Notification,
                        task_id: task.id,
                        field: "assigned_to".to_string(),
                        message: err.to_string(),
                    });
                }
            }
        }
        Ok(outcome)
    }

    pub async fn get(&self, actor: &Actor, engine: &PermissionEngine, id: Uuid) -> AppResult<Task> {
        engine.require(&actor.role, Resource::Tasks, Action::View)?;
        self.find(id).await
    }

    /// Applies a partial update.
    ///
    /// The write is a compare-and-set on the task version, retried against
    /// fresh state a few times. Tracked-field transitions are diffed
    /// between the row that was replaced and the row that was written, so
    /// each applied write is audited exactly once.
    pub async fn update(
        &self,
        actor: &Actor,
        engine: &PermissionEngine,
        id: Uuid,
        patch: TaskPatch,
    ) -> AppResult<MutationOutcome<Task>> {
        if patch.is_empty() {
            return Err(AppError::bad_request("update contains no fields"));
        }
        engine.require(&actor.role, Resource::Tasks, Action::Update)?;
        for column in patch.columns() {
            engine.require_column(&actor.role, column)?;
        }

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let current = self.find(id).await?;
            let mut next = patch.apply_to(&current)?;
            if next == current {
                return Ok(MutationOutcome::plain(current));
            }
            next.version = current.version + 1;
            next.updated_at = utc_now();

            if self.tasks.replace_task(&next, current.version).await? {
                tracing::info!(task_id = %id, actor = %actor.user_id, version = next.version, "task updated");
                let report = self.audit.record_transitions(&current, &next, actor.user_id).await;
                return Ok(MutationOutcome {
                    value: next,
                    changes: report.changes,
                    notifications: report.notifications,
                    failures: report.failures,
                });
            }
            tracing::debug!(task_id = %id, attempt, "task version moved, retrying");
        }

        Err(AppError::conflict("task was modified concurrently, try again"))
    }

    pub async fn delete(&self, actor: &Actor, engine: &PermissionEngine, id: Uuid) -> AppResult<()> {
        engine.require(&actor.role, Resource::Tasks, Action::Delete)?;
        if !self.tasks.delete_task(id).await? {
            return Err(AppError::not_found("task not found"));
        }
        tracing::info!(task_id = %id, actor = %actor.user_id, "task deleted");
        Ok(())
    }

    pub async fn history(&self, actor: &Actor, engine: &PermissionEngine, id: Uuid) -> AppResult<Vec<ChangeLogEntry>> {
        engine.require(&actor.role, Resource::Tasks, Action::View)?;
        self.find(id).await?;
        self.audit.history(id).await
    }

    /// One `deadline` notification per open task of the actor due within
    /// `window`. Tasks that already produced one are skipped.
    pub async fn remind_deadlines(&self, actor: &Actor, window: Duration) -> AppResult<Vec<Notification>> {
        let now = utc_now();
        let until = now
            .checked_add_signed(window)
            .ok_or_else(|| AppError::internal("deadline window overflows the calendar"))?;
        let due = self.tasks.tasks_due_between(actor.user_id, now, until).await?;

        let mut created = Vec::new();
        for task in due.iter().filter(|task| task.status.is_open()) {
            let Some(due_date) = task.due_date else { continue };
            let message = format!(
                "\"{}\" is due {}",
                task.title,
                due_date.format("%Y-%m-%d %H:%M UTC")
            );
            if let Some(notification) = self
                .notifier
                .notify_once(NotificationKind::Deadline, "Deadline approaching", &message, &task.link(), actor.user_id)
                .await?
            {
                created.push(notification);
            }
        }
        tracing::debug!(user_id = %actor.user_id, reminders = created.len(), "deadline sweep finished");
        Ok(created)
    }

    async fn find(&self, id: Uuid) -> AppResult<Task> {
        self.tasks
            .find_task(id)
            .await?
            .ok_or_else(|| AppError::not_found("task not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::{BuiltinRole, PolicyStore, RoleRef, RoleRegistry};
    use crate::store::memory::MemoryStore;
    use crate::store::NotificationStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        policy: PolicyStore,
        service: TaskService,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let registry = Arc::new(RoleRegistry::load(store.clone()).await.unwrap());
        let policy = PolicyStore::load(store.clone(), registry).await.unwrap();
        let notifier = NotificationDispatcher::new(store.clone());
        let audit = Arc::new(AuditTrail::new(store.clone(), notifier.clone()));
        let service = TaskService::new(store.clone(), audit, notifier);
        Fixture { store, policy, service }
    }

    fn admin() -> Actor {
        Actor::new(Uuid::new_v4(), RoleRef::ADMIN)
    }

    fn new_task(title: &str, assigned_to: Option<Uuid>) -> TaskCreateRequest {
        TaskCreateRequest {
            title: title.into(),
            project_id: None,
            status: Some(TaskStatus::InProgress),
            assigned_to,
            due_date: None,
            design_brief: None,
            notes: None,
        }
    }

    fn patch(json: &str) -> TaskPatch {
        serde_json::from_str(json).unwrap()
    }

    #[tokio::test]
    async fn status_change_by_other_user_logs_and_notifies_assignee() {
        let fx = fixture().await;
        let engine = fx.policy.engine().await;
        let u1 = admin();
        let u2 = Uuid::new_v4();

        let created = fx.service.create(&u1, &engine, new_task("Brand deck", Some(u2))).await.unwrap();
        let task_id = created.value.id;
        let before = fx.store.list_notifications(u2, false).await.unwrap().len();

        let outcome = fx
            .service
            .update(&u1, &engine, task_id, patch(r#"{"status":"review"}"#))
            .await
            .unwrap();
        assert_eq!(outcome.value.status, TaskStatus::Review);
        assert_eq!(outcome.changes.len(), 1);
        assert_eq!(outcome.changes[0].old_value.as_deref(), Some("in-progress"));
        assert_eq!(outcome.changes[0].new_value.as_deref(), Some("review"));
        assert!(outcome.failures.is_empty());

        let inbox = fx.store.list_notifications(u2, false).await.unwrap();
        assert_eq!(inbox.len(), before + 1);
        assert_eq!(inbox[0].kind, NotificationKind::StatusUpdate);
    }

    #[tokio::test]
    async fn repeating_a_transition_logs_once() {
        let fx = fixture().await;
        let engine = fx.policy.engine().await;
        let actor = admin();
        let task = fx.service.create(&actor, &engine, new_task("Copy", None)).await.unwrap().value;

        fx.service.update(&actor, &engine, task.id, patch(r#"{"status":"review"}"#)).await.unwrap();
        let again = fx
            .service
            .update(&actor, &engine, task.id, patch(r#"{"status":"review"}"#))
            .await
            .unwrap();
        assert!(again.changes.is_empty());
        assert_eq!(again.value.version, 2);

        let history = fx.service.history(&actor, &engine, task.id).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn denied_column_rejects_whole_patch() {
        let fx = fixture().await;
        let admin = admin();
        fx.policy
            .set_action_permission(&admin.role, "designer", Resource::Tasks, Action::Update, true)
            .await
            .unwrap();
        fx.policy
            .set_column_permission(&admin.role, "designer", Column::Design, true)
            .await
            .unwrap();
        let engine = fx.policy.engine().await;
        let task = fx.service.create(&admin, &engine, new_task("Poster", None)).await.unwrap().value;

        let designer = Actor::new(Uuid::new_v4(), RoleRef::Builtin(BuiltinRole::Designer));
        let denied = fx
            .service
            .update(&designer, &engine, task.id, patch(r#"{"design":"v2.png","notes":"see drive"}"#))
            .await;
        assert!(matches!(denied, Err(AppError::Forbidden(_))));
        assert_eq!(fx.service.get(&admin, &engine, task.id).await.unwrap().design, None);

        let allowed = fx
            .service
            .update(&designer, &engine, task.id, patch(r#"{"design":"v2.png"}"#))
            .await
            .unwrap();
        assert_eq!(allowed.value.design.as_deref(), Some("v2.png"));
    }

    #[tokio::test]
    async fn content_writer_cannot_delete_by_default() {
        let fx = fixture().await;
        let engine = fx.policy.engine().await;
        let admin = admin();
        let task = fx.service.create(&admin, &engine, new_task("Blog post", None)).await.unwrap().value;

        let writer = Actor::new(Uuid::new_v4(), RoleRef::Builtin(BuiltinRole::ContentWriter));
        let result = fx.service.delete(&writer, &engine, task.id).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn delete_removes_history() {
        let fx = fixture().await;
        let engine = fx.policy.engine().await;
        let actor = admin();
        let task = fx.service.create(&actor, &engine, new_task("Reel", None)).await.unwrap().value;
        fx.service.update(&actor, &engine, task.id, patch(r#"{"status":"completed"}"#)).await.unwrap();

        fx.service.delete(&actor, &engine, task.id).await.unwrap();
        assert!(matches!(
            fx.service.history(&actor, &engine, task.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            fx.service.delete(&actor, &engine, task.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn deadline_reminders_are_not_duplicated() {
        let fx = fixture().await;
        let engine = fx.policy.engine().await;
        let actor = admin();
        let mut soon = new_task("Launch email", Some(actor.user_id));
        soon.due_date = Some(utc_now() + Duration::hours(3));
        let mut later = new_task("Quarterly report", Some(actor.user_id));
        later.due_date = Some(utc_now() + Duration::days(10));
        fx.service.create(&actor, &engine, soon).await.unwrap();
        fx.service.create(&actor, &engine, later).await.unwrap();

        let first = fx.service.remind_deadlines(&actor, Duration::hours(24)).await.unwrap();
        assert_eq!(first.len(), 1);
        assert!(first[0].message.contains("Launch email"));

        let second = fx.service.remind_deadlines(&actor, Duration::hours(24)).await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn oversized_deadline_window_is_an_error() {
        let fx = fixture().await;
        let actor = admin();
        let result = fx.service.remind_deadlines(&actor, Duration::days(1_000_000_000)).await;
        assert!(matches!(result, Err(AppError::Internal(_))));
    }
}
