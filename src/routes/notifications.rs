use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::app::AppState;
use crate::errors::AppResult;
use crate::models::notification::{Notification, NotificationList};
use crate::session::StaffSession;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct NotificationQuery {
    /// Only return unread notifications.
    #[serde(default)]
    pub unread: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReminderResponse {
    pub window_hours: i64,
    pub created: Vec<Notification>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/:id/read", post(mark_read))
        .route("/deadline-reminders", post(deadline_reminders))
}

#[utoipa::path(
    get,
    path = "/api/notifications",
    tag = "Notifications",
    params(NotificationQuery),
    responses((status = 200, description = "Caller's notifications, newest first", body = NotificationList)),
    security(("cookieAuth" = []), ("bearerAuth" = []))
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    session: StaffSession,
    Query(query): Query<NotificationQuery>,
) -> AppResult<Json<NotificationList>> {
    let list = state
        .notifications
        .list_for(session.actor.user_id, query.unread)
        .await?;
    Ok(Json(list))
}

#[utoipa::path(
    post,
    path = "/api/notifications/{id}/read",
    tag = "Notifications",
    params(("id" = Uuid, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Marked read", body = Notification),
        (status = 403, description = "Belongs to another user"),
        (status = 404, description = "Notification not found")
    ),
    security(("cookieAuth" = []), ("bearerAuth" = []))
)]
pub async fn mark_read(
    State(state): State<AppState>,
    session: StaffSession,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Notification>> {
    let notification = state.notifications.mark_read(id, session.actor.user_id).await?;
    Ok(Json(notification))
}

/// Sweeps the caller's open tasks due within the configured window and
/// creates at most one reminder per task.
#[utoipa::path(
    post,
    path = "/api/notifications/deadline-reminders",
    tag = "Notifications",
    responses((status = 201, description = "Reminders created by this sweep", body = ReminderResponse)),
    security(("cookieAuth" = []), ("bearerAuth" = []))
)]
pub async fn deadline_reminders(
    State(state): State<AppState>,
    session: StaffSession,
) -> AppResult<(StatusCode, Json<ReminderResponse>)> {
    let created = state
        .tasks
        .remind_deadlines(&session.actor, state.config.deadline_window()?)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ReminderResponse {
            window_hours: state.config.deadline_window_hours,
            created,
        }),
    ))
}
