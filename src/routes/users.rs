//! Staff lifecycle and portal account administration.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use uuid::Uuid;

use crate::app::AppState;
use crate::errors::AppResult;
use crate::models::user::{
    ChangeRoleRequest, Client, ClientCreateRequest, ClientUser, ClientUserCreateRequest, User,
};
use crate::session::{AdminSession, StaffSession};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id/approve", post(approve_user))
        .route("/users/:id/suspend", post(suspend_user))
        .route("/users/:id/reactivate", post(reactivate_user))
        .route("/users/:id/role", put(change_role))
        .route("/clients", post(create_client))
        .route("/clients/:id/users", post(create_client_user))
        .route("/client-users/:id/suspend", post(suspend_client_user))
        .route("/client-users/:id/reactivate", post(reactivate_client_user))
}

#[utoipa::path(
    get,
    path = "/api/users",
    tag = "Users",
    responses(
        (status = 200, description = "Staff accounts", body = Vec<User>),
        (status = 403, description = "Role may not view users")
    ),
    security(("cookieAuth" = []), ("bearerAuth" = []))
)]
pub async fn list_users(State(state): State<AppState>, session: StaffSession) -> AppResult<Json<Vec<User>>> {
    let users = state.users.list(&session.actor, &session.engine).await?;
    Ok(Json(users))
}

#[utoipa::path(
    post,
    path = "/api/users/{id}/approve",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Account activated", body = User),
        (status = 409, description = "Account is not pending")
    ),
    security(("cookieAuth" = []), ("bearerAuth" = []))
)]
pub async fn approve_user(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Path(id): Path<Uuid>,
) -> AppResult<Json<User>> {
    Ok(Json(state.users.approve(&admin.actor, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/users/{id}/suspend",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Account suspended", body = User),
        (status = 400, description = "Administrators cannot suspend themselves"),
        (status = 409, description = "Account is not active")
    ),
    security(("cookieAuth" = []), ("bearerAuth" = []))
)]
pub async fn suspend_user(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Path(id): Path<Uuid>,
) -> AppResult<Json<User>> {
    Ok(Json(state.users.suspend(&admin.actor, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/users/{id}/reactivate",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Account reactivated", body = User),
        (status = 409, description = "Account is not suspended")
    ),
    security(("cookieAuth" = []), ("bearerAuth" = []))
)]
pub async fn reactivate_user(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Path(id): Path<Uuid>,
) -> AppResult<Json<User>> {
    Ok(Json(state.users.reactivate(&admin.actor, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/users/{id}/role",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = ChangeRoleRequest,
    responses(
        (status = 200, description = "Role changed", body = User),
        (status = 404, description = "Unknown user or role")
    ),
    security(("cookieAuth" = []), ("bearerAuth" = []))
)]
pub async fn change_role(
    State(state): State<AppState>,
    AdminSession(admin): AdminSession,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChangeRoleRequest>,
) -> AppResult<Json<User>> {
    Ok(Json(state.users.change_role(&admin.actor, id, &payload.role).await?))
}

#[utoipa::path(
    post,
    path = "/api/clients",
    tag = "Clients",
    request_body = ClientCreateRequest,
    responses(
        (status = 201, description = "Client created", body = Client),
        (status = 403, description = "Role may not create clients")
    ),
    security(("cookieAuth" = []), ("bearerAuth" = []))
)]
pub async fn create_client(
    State(state): State<AppState>,
    session: StaffSession,
    Json(payload): Json<ClientCreateRequest>,
) -> AppResult<(StatusCode, Json<Client>)> {
    let client = state
        .users
        .create_client(&session.actor, &session.engine, &payload.name)
        .await?;
    Ok((StatusCode::CREATED, Json(client)))
}

#[utoipa::path(
    post,
    path = "/api/clients/{id}/users",
    tag = "Clients",
    params(("id" = Uuid, Path, description = "Client id")),
    request_body = ClientUserCreateRequest,
    responses(
        (status = 201, description = "Portal account created", body = ClientUser),
        (status = 404, description = "Client not found"),
        (status = 409, description = "Email already in use")
    ),
    security(("cookieAuth" = []), ("bearerAuth" = []))
)]
pub async fn create_client_user(
    State(state): State<AppState>,
    session: StaffSession,
    Path(client_id): Path<Uuid>,
    Json(payload): Json<ClientUserCreateRequest>,
) -> AppResult<(StatusCode, Json<ClientUser>)> {
    let client_user = state
        .users
        .create_client_user(&session.actor, &session.engine, client_id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(client_user)))
}

#[utoipa::path(
    post,
    path = "/api/client-users/{id}/suspend",
    tag = "Clients",
    params(("id" = Uuid, Path, description = "Portal account id")),
    responses((status = 200, description = "Portal account suspended", body = ClientUser)),
    security(("cookieAuth" = []), ("bearerAuth" = []))
)]
pub async fn suspend_client_user(
    State(state): State<AppState>,
    session: StaffSession,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ClientUser>> {
    let client_user = state
        .users
        .suspend_client_user(&session.actor, &session.engine, id)
        .await?;
    Ok(Json(client_user))
}

#[utoipa::path(
    post,
    path = "/api/client-users/{id}/reactivate",
    tag = "Clients",
    params(("id" = Uuid, Path, description = "Portal account id")),
    responses((status = 200, description = "Portal account reactivated", body = ClientUser)),
    security(("cookieAuth" = []), ("bearerAuth" = []))
)]
pub async fn reactivate_client_user(
    State(state): State<AppState>,
    session: StaffSession,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ClientUser>> {
    let client_user = state
        .users
        .reactivate_client_user(&session.actor, &session.engine, id)
        .await?;
    Ok(Json(client_user))
}
