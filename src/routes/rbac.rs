//! Role and permission administration.
//!
//! Every write goes through the policy store, which asks the permission
//! engine first; only the administrator role holds the `permissions`
//! resource, so non-admin callers get 403 here regardless of the matrix.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{Action, ActionPermission, ColumnRule, PermissionsConfig, Resource, RoleMetadata};
use crate::errors::AppResult;
use crate::models::rbac::*;
use crate::session::StaffSession;

pub fn routes() -> Router<AppState> {
    Router::new()
        // Roles
        .route("/roles", get(list_roles).post(create_role))
        .route("/roles/:role_id", get(get_role))
        // Policy matrices
        .route("/permissions", get(get_policy))
        .route("/permissions/columns", put(set_column_permission))
        .route("/permissions/actions", put(set_action_permission))
        .route(
            "/permissions/actions/:role/:resource/:action",
            delete(remove_action_permission),
        )
        // Named column bundles
        .route("/configs", get(list_configs).post(create_config))
        .route("/configs/:config_id/activate", post(activate_config))
        // Caller's effective grants
        .route("/me", get(effective_permissions))
}

// =============================================================================
// ROLE ENDPOINTS
// =============================================================================

/// Built-in roles first, then custom roles in creation order.
#[utoipa::path(
    get,
    path = "/api/rbac/roles",
    tag = "RBAC",
    responses((status = 200, description = "Known roles", body = Vec<RoleMetadata>)),
    security(("cookieAuth" = []), ("bearerAuth" = []))
)]
pub async fn list_roles(State(state): State<AppState>, _session: StaffSession) -> Json<Vec<RoleMetadata>> {
    Json(state.registry.list_roles().await)
}

#[utoipa::path(
    post,
    path = "/api/rbac/roles",
    tag = "RBAC",
    request_body = RoleCreateRequest,
    responses(
        (status = 201, description = "Role created", body = RoleMetadata),
        (status = 400, description = "Invalid role name"),
        (status = 403, description = "Administrator only"),
        (status = 409, description = "Role name already exists")
    ),
    security(("cookieAuth" = []), ("bearerAuth" = []))
)]
pub async fn create_role(
    State(state): State<AppState>,
    session: StaffSession,
    Json(req): Json<RoleCreateRequest>,
) -> AppResult<(StatusCode, Json<RoleMetadata>)> {
    session
        .engine
        .require(&session.actor.role, Resource::Permissions, Action::Create)?;
    let role = state
        .registry
        .create_custom_role(
            &req.name,
            req.label.as_deref(),
            req.glyph.as_deref(),
            session.actor.user_id,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(role)))
}

#[utoipa::path(
    get,
    path = "/api/rbac/roles/{role_id}",
    tag = "RBAC",
    params(("role_id" = String, Path, description = "Role identifier")),
    responses(
        (status = 200, description = "Role metadata", body = RoleMetadata),
        (status = 404, description = "Unknown role")
    ),
    security(("cookieAuth" = []), ("bearerAuth" = []))
)]
pub async fn get_role(
    State(state): State<AppState>,
    _session: StaffSession,
    Path(role_id): Path<String>,
) -> AppResult<Json<RoleMetadata>> {
    Ok(Json(state.registry.resolve(&role_id).await?))
}

// =============================================================================
// POLICY ENDPOINTS
// =============================================================================

#[utoipa::path(
    get,
    path = "/api/rbac/permissions",
    tag = "RBAC",
    responses(
        (status = 200, description = "Active column rules and action grants", body = PolicyView),
        (status = 403, description = "Administrator only")
    ),
    security(("cookieAuth" = []), ("bearerAuth" = []))
)]
pub async fn get_policy(session: StaffSession) -> AppResult<Json<PolicyView>> {
    session
        .engine
        .require(&session.actor.role, Resource::Permissions, Action::View)?;
    let policy = session.engine.policy();
    let actions = policy
        .action_rules()
        .into_iter()
        .map(|(role, resource, action, can_perform)| ActionGrant {
            role,
            resource,
            action,
            can_perform,
        })
        .collect();
    Ok(Json(PolicyView {
        config_id: policy.config_id(),
        config_name: policy.config_name().map(str::to_string),
        columns: policy.column_rules(),
        actions,
    }))
}

#[utoipa::path(
    put,
    path = "/api/rbac/permissions/columns",
    tag = "RBAC",
    request_body = ColumnPermissionRequest,
    responses(
        (status = 200, description = "Column rule stored in the active bundle", body = ColumnRule),
        (status = 403, description = "Administrator only"),
        (status = 404, description = "Unknown role")
    ),
    security(("cookieAuth" = []), ("bearerAuth" = []))
)]
pub async fn set_column_permission(
    State(state): State<AppState>,
    session: StaffSession,
    Json(req): Json<ColumnPermissionRequest>,
) -> AppResult<Json<ColumnRule>> {
    let rule = state
        .policy
        .set_column_permission(&session.actor.role, &req.role, req.column, req.can_edit)
        .await?;
    Ok(Json(rule))
}

#[utoipa::path(
    put,
    path = "/api/rbac/permissions/actions",
    tag = "RBAC",
    request_body = ActionPermissionRequest,
    responses(
        (status = 200, description = "Action grant stored", body = ActionPermission),
        (status = 400, description = "The permissions resource cannot be granted"),
        (status = 403, description = "Administrator only"),
        (status = 404, description = "Unknown role")
    ),
    security(("cookieAuth" = []), ("bearerAuth" = []))
)]
pub async fn set_action_permission(
    State(state): State<AppState>,
    session: StaffSession,
    Json(req): Json<ActionPermissionRequest>,
) -> AppResult<Json<ActionPermission>> {
    let permission = state
        .policy
        .set_action_permission(&session.actor.role, &req.role, req.resource, req.action, req.can_perform)
        .await?;
    Ok(Json(permission))
}

#[utoipa::path(
    delete,
    path = "/api/rbac/permissions/actions/{role}/{resource}/{action}",
    tag = "RBAC",
    params(
        ("role" = String, Path, description = "Role identifier"),
        ("resource" = String, Path, description = "Resource, e.g. content"),
        ("action" = String, Path, description = "Action, e.g. update")
    ),
    responses(
        (status = 204, description = "Entry removed; the pair is denied again"),
        (status = 403, description = "Administrator only"),
        (status = 404, description = "No such entry")
    ),
    security(("cookieAuth" = []), ("bearerAuth" = []))
)]
pub async fn remove_action_permission(
    State(state): State<AppState>,
    session: StaffSession,
    Path((role, resource, action)): Path<(String, String, String)>,
) -> AppResult<StatusCode> {
    let resource: Resource = resource.parse()?;
    let action: Action = action.parse()?;
    state
        .policy
        .remove_action_permission(&session.actor.role, &role, resource, action)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// CONFIG ENDPOINTS
// =============================================================================

fn summarize(config: &PermissionsConfig) -> PermissionsConfigSummary {
    PermissionsConfigSummary {
        id: config.id,
        name: config.name.clone(),
        is_active: config.is_active,
        rule_count: config.rules.len(),
        created_at: config.created_at,
    }
}

#[utoipa::path(
    get,
    path = "/api/rbac/configs",
    tag = "RBAC",
    responses(
        (status = 200, description = "Named permission bundles", body = Vec<PermissionsConfigSummary>),
        (status = 403, description = "Administrator only")
    ),
    security(("cookieAuth" = []), ("bearerAuth" = []))
)]
pub async fn list_configs(
    State(state): State<AppState>,
    session: StaffSession,
) -> AppResult<Json<Vec<PermissionsConfigSummary>>> {
    session
        .engine
        .require(&session.actor.role, Resource::Permissions, Action::View)?;
    let configs = state.policy.list_configs().await?;
    Ok(Json(configs.iter().map(summarize).collect()))
}

#[utoipa::path(
    post,
    path = "/api/rbac/configs",
    tag = "RBAC",
    request_body = ConfigCreateRequest,
    responses(
        (status = 201, description = "Inactive bundle created", body = PermissionsConfigSummary),
        (status = 403, description = "Administrator only"),
        (status = 409, description = "Name already in use")
    ),
    security(("cookieAuth" = []), ("bearerAuth" = []))
)]
pub async fn create_config(
    State(state): State<AppState>,
    session: StaffSession,
    Json(req): Json<ConfigCreateRequest>,
) -> AppResult<(StatusCode, Json<PermissionsConfigSummary>)> {
    let config = state
        .policy
        .create_config(&session.actor.role, &req.name, session.actor.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(summarize(&config))))
}

#[utoipa::path(
    post,
    path = "/api/rbac/configs/{config_id}/activate",
    tag = "RBAC",
    params(("config_id" = Uuid, Path, description = "Bundle id")),
    responses(
        (status = 204, description = "Bundle is now the only active one"),
        (status = 403, description = "Administrator only"),
        (status = 404, description = "Bundle not found")
    ),
    security(("cookieAuth" = []), ("bearerAuth" = []))
)]
pub async fn activate_config(
    State(state): State<AppState>,
    session: StaffSession,
    Path(config_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state
        .policy
        .activate_config(&session.actor.role, config_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/rbac/me",
    tag = "RBAC",
    responses((status = 200, description = "Caller's effective grants", body = EffectivePermissions)),
    security(("cookieAuth" = []), ("bearerAuth" = []))
)]
pub async fn effective_permissions(session: StaffSession) -> Json<EffectivePermissions> {
    let role = &session.actor.role;
    let actions = Resource::ALL
        .into_iter()
        .map(|resource| ResourceActions {
            resource,
            actions: session.engine.allowed_actions(role, resource),
        })
        .filter(|entry| !entry.actions.is_empty())
        .collect();
    Json(EffectivePermissions {
        user_id: session.actor.user_id,
        role: role.key().to_string(),
        actions,
        editable_columns: session.engine.editable_columns(role),
    })
}
