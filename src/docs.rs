use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{Map, Value};
use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::openapi::server::Server;
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::errors::{AppError, AppResult};
use crate::routes;
use crate::session::STAFF_COOKIE;

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::health::health,
		routes::auth::register,
		routes::auth::login,
		routes::auth::me,
		routes::auth::logout,
		routes::client_auth::login,
		routes::client_auth::me,
		routes::client_auth::logout,
		routes::session::resolve,
		routes::users::list_users,
		routes::users::approve_user,
		routes::users::suspend_user,
		routes::users::reactivate_user,
		routes::users::change_role,
		routes::users::create_client,
		routes::users::create_client_user,
		routes::users::suspend_client_user,
		routes::users::reactivate_client_user,
		routes::rbac::list_roles,
		routes::rbac::create_role,
		routes::rbac::get_role,
		routes::rbac::get_policy,
		routes::rbac::set_column_permission,
		routes::rbac::set_action_permission,
		routes::rbac::remove_action_permission,
		routes::rbac::list_configs,
		routes::rbac::create_config,
		routes::rbac::activate_config,
		routes::rbac::effective_permissions,
		routes::tasks::create_task,
		routes::tasks::get_task,
		routes::tasks::update_task,
		routes::tasks::delete_task,
		routes::tasks::task_changes,
		routes::notifications::list_notifications,
		routes::notifications::mark_read,
		routes::notifications::deadline_reminders
	),
	components(
		schemas(
			crate::models::user::User,
			crate::models::user::UserStatus,
			crate::models::user::ClientStatus,
			crate::models::user::Client,
			crate::models::user::ClientUser,
			crate::models::user::AuthResponse,
			crate::models::user::ClientAuthResponse,
			crate::models::user::LoginRequest,
			crate::models::user::RegisterRequest,
			crate::models::user::ChangeRoleRequest,
			crate::models::user::ClientCreateRequest,
			crate::models::user::ClientUserCreateRequest,
			crate::models::task::Task,
			crate::models::task::TaskStatus,
			crate::models::task::TaskCreateRequest,
			crate::models::task::TaskPatch,
			crate::models::change_log::ChangeLogEntry,
			crate::models::notification::Notification,
			crate::models::notification::NotificationKind,
			crate::models::notification::NotificationList,
			crate::models::rbac::RoleCreateRequest,
			crate::models::rbac::ColumnPermissionRequest,
			crate::models::rbac::ActionPermissionRequest,
			crate::models::rbac::ActionGrant,
			crate::models::rbac::ConfigCreateRequest,
			crate::models::rbac::PermissionsConfigSummary,
			crate::models::rbac::PolicyView,
			crate::models::rbac::EffectivePermissions,
			crate::models::rbac::ResourceActions,
			crate::authz::RoleMetadata,
			crate::authz::BuiltinRole,
			crate::authz::Resource,
			crate::authz::Action,
			crate::authz::Column,
			crate::authz::ColumnRule,
			crate::authz::ActionPermission,
			crate::audit::SideEffect,
			crate::audit::SideEffectFailure,
			crate::edge::RouteClass,
			crate::session::CredentialKind,
			crate::session::ForbiddenReason,
			routes::health::HealthResponse,
			routes::auth::MessageResponse,
			routes::session::ResolveRequest,
			routes::session::SessionResolution,
			routes::tasks::TaskMutationResponse,
			routes::tasks::ChangeHistory,
			routes::notifications::ReminderResponse
		)
	),
	modifiers(&SecurityAddon),
	tags(
		(name = "Health", description = "Liveness and database check"),
		(name = "Auth", description = "Staff sign-in"),
		(name = "Client Portal", description = "Portal sign-in"),
		(name = "Session", description = "Route classification and session guard"),
		(name = "Users", description = "Staff account lifecycle"),
		(name = "Clients", description = "Client records and portal accounts"),
		(name = "RBAC", description = "Roles, column rules and action grants"),
		(name = "Tasks", description = "Column-guarded tasks with audited transitions"),
		(name = "Notifications", description = "In-app notifications")
	)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
	fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
		if let Some(components) = openapi.components.as_mut() {
			components.add_security_scheme(
				"bearerAuth",
				SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
			);
			components.add_security_scheme(
				"cookieAuth",
				SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(STAFF_COOKIE))),
			);
		}
	}
}

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = ApiDoc::openapi();
	doc.servers = Some(vec![Server::new(format!("http://localhost:{}", port))]);

	let mut value = serde_json::to_value(&doc)?;
	normalize_path_operations(&mut value);
	Ok(serde_json::from_value(value)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> AppResult<Router> {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.with_credentials(true)
		.persist_authorization(true);

	let doc_json = Arc::new(
		serde_json::to_value(&doc).map_err(|err| AppError::internal(format!("openapi serialization: {err}")))?,
	);

	let json_route = {
		let doc_json = Arc::clone(&doc_json);
		get(move || {
			let doc_json = Arc::clone(&doc_json);
			async move { Json((*doc_json).clone()) }
		})
	};

	Ok(Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config)))
}

// Lowercases method keys and folds duplicates so Swagger UI does not choke.
fn normalize_path_operations(doc: &mut Value) {
	if let Some(paths) = doc.get_mut("paths").and_then(Value::as_object_mut) {
		let snapshot = paths.clone();
		for (path, item) in snapshot {
			if let Some(ops) = item.as_object() {
				let mut normalized = Map::new();
				for (method, val) in ops {
					let key = method.to_lowercase();
					if let Some(existing) = normalized.get_mut(&key) {
						merge_values(existing, val);
					} else {
						normalized.insert(key, val.clone());
					}
				}
				paths.insert(path, Value::Object(normalized));
			}
		}
	}
}

fn merge_values(target: &mut Value, addition: &Value) {
	match (target, addition) {
		(Value::Object(dest), Value::Object(src)) => {
			for (key, value) in src {
				if let Some(existing) = dest.get_mut(key) {
					merge_values(existing, value);
				} else {
					dest.insert(key.clone(), value.clone());
				}
			}
		}
		(Value::Array(dest), Value::Array(src)) => {
			for item in src {
				if !dest.contains(item) {
					dest.push(item.clone());
				}
			}
		}
		_ => {}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn document_lists_api_paths_and_schemes() {
		let doc = build_openapi(8000).unwrap();
		let value = serde_json::to_value(&doc).unwrap();
		let paths = value["paths"].as_object().unwrap();
		assert!(paths.contains_key("/api/session/resolve"));
		assert!(paths.contains_key("/api/rbac/permissions/actions/{role}/{resource}/{action}"));
		assert!(value["components"]["securitySchemes"]["cookieAuth"].is_object());
		assert_eq!(value["servers"][0]["url"], "http://localhost:8000");
	}
}
