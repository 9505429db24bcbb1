use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::app::AppState;
use crate::audit::{chain, SideEffectFailure};
use crate::errors::AppResult;
use crate::models::change_log::ChangeLogEntry;
use crate::models::notification::Notification;
use crate::models::task::{Task, TaskCreateRequest, TaskPatch};
use crate::services::MutationOutcome;
use crate::session::StaffSession;

/// A committed task write and what followed from it. `failures` lists
/// follow-up writes that did not go through; the task write stands.
#[derive(Debug, Serialize, ToSchema)]
pub struct TaskMutationResponse {
    pub task: Task,
    pub changes: Vec<ChangeLogEntry>,
    pub notifications: Vec<Notification>,
    pub failures: Vec<SideEffectFailure>,
}

impl From<MutationOutcome<Task>> for TaskMutationResponse {
    fn from(outcome: MutationOutcome<Task>) -> Self {
        Self {
            task: outcome.value,
            changes: outcome.changes,
            notifications: outcome.notifications,
            failures: outcome.failures,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChangeHistory {
    pub task_id: Uuid,
    /// False when the hash chain does not recompute.
    pub chain_intact: bool,
    pub entries: Vec<ChangeLogEntry>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_task))
        .route("/:id", get(get_task).patch(update_task).delete(delete_task))
        .route("/:id/changes", get(task_changes))
}

#[utoipa::path(
    post,
    path = "/api/tasks",
    tag = "Tasks",
    request_body = TaskCreateRequest,
    responses(
        (status = 201, description = "Task created", body = TaskMutationResponse),
        (status = 403, description = "Role may not create tasks or set a guarded column")
    ),
    security(("cookieAuth" = []), ("bearerAuth" = []))
)]
pub async fn create_task(
    State(state): State<AppState>,
    session: StaffSession,
    Json(payload): Json<TaskCreateRequest>,
) -> AppResult<(StatusCode, Json<TaskMutationResponse>)> {
    let outcome = state.tasks.create(&session.actor, &session.engine, payload).await?;
    Ok((StatusCode::CREATED, Json(outcome.into())))
}

#[utoipa::path(
    get,
    path = "/api/tasks/{id}",
    tag = "Tasks",
    params(("id" = Uuid, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task detail", body = Task),
        (status = 404, description = "Task not found")
    ),
    security(("cookieAuth" = []), ("bearerAuth" = []))
)]
pub async fn get_task(
    State(state): State<AppState>,
    session: StaffSession,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Task>> {
    Ok(Json(state.tasks.get(&session.actor, &session.engine, id).await?))
}

/// Partial update. Every guarded column in the patch must be editable by
/// the caller's role, otherwise nothing is written.
#[utoipa::path(
    patch,
    path = "/api/tasks/{id}",
    tag = "Tasks",
    params(("id" = Uuid, Path, description = "Task id")),
    request_body = TaskPatch,
    responses(
        (status = 200, description = "Task updated", body = TaskMutationResponse),
        (status = 400, description = "Empty or invalid patch"),
        (status = 403, description = "Action or column not permitted"),
        (status = 404, description = "Task not found"),
        (status = 409, description = "Concurrent modification")
    ),
    security(("cookieAuth" = []), ("bearerAuth" = []))
)]
pub async fn update_task(
    State(state): State<AppState>,
    session: StaffSession,
    Path(id): Path<Uuid>,
    Json(patch): Json<TaskPatch>,
) -> AppResult<Json<TaskMutationResponse>> {
    let outcome = state.tasks.update(&session.actor, &session.engine, id, patch).await?;
    Ok(Json(outcome.into()))
}

#[utoipa::path(
    delete,
    path = "/api/tasks/{id}",
    tag = "Tasks",
    params(("id" = Uuid, Path, description = "Task id")),
    responses(
        (status = 204, description = "Task and its change log deleted"),
        (status = 403, description = "Role may not delete tasks"),
        (status = 404, description = "Task not found")
    ),
    security(("cookieAuth" = []), ("bearerAuth" = []))
)]
pub async fn delete_task(
    State(state): State<AppState>,
    session: StaffSession,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.tasks.delete(&session.actor, &session.engine, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/tasks/{id}/changes",
    tag = "Tasks",
    params(("id" = Uuid, Path, description = "Task id")),
    responses(
        (status = 200, description = "Field-level change log, oldest first", body = ChangeHistory),
        (status = 404, description = "Task not found")
    ),
    security(("cookieAuth" = []), ("bearerAuth" = []))
)]
pub async fn task_changes(
    State(state): State<AppState>,
    session: StaffSession,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ChangeHistory>> {
    let entries = state.tasks.history(&session.actor, &session.engine, id).await?;
    let chain_intact = chain::first_broken_link(&entries).is_none();
    if !chain_intact {
        tracing::warn!(task_id = %id, "change log chain is broken");
    }
    Ok(Json(ChangeHistory {
        task_id: id,
        chain_intact,
        entries,
    }))
}
