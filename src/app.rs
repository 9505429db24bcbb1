use std::sync::Arc;

use axum::http::Method;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::audit::AuditTrail;
use crate::authz::{PolicyStore, RoleRegistry};
use crate::config::AppConfig;
use crate::db::SqliteStore;
use crate::docs;
use crate::edge::{route_gate, RouteClassifier};
use crate::errors::{AppError, AppResult};
use crate::jwt::JwtConfig;
use crate::notifications::NotificationDispatcher;
use crate::routes::{auth, client_auth, health, notifications, rbac, session, tasks, users};
use crate::services::tasks::TaskService;
use crate::services::users::UserService;
use crate::session::SessionResolver;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<AppConfig>,
    pub jwt: Arc<JwtConfig>,
    pub registry: Arc<RoleRegistry>,
    pub policy: Arc<PolicyStore>,
    pub users: Arc<UserService>,
    pub tasks: Arc<TaskService>,
    pub notifications: NotificationDispatcher,
    pub audit: Arc<AuditTrail>,
    pub sessions: Arc<SessionResolver>,
    pub classifier: Arc<RouteClassifier>,
}

impl AppState {
    /// Loads the role roster and the active policy, then wires the services
    /// over one SQLite store.
    pub async fn new(pool: SqlitePool, config: AppConfig) -> AppResult<Self> {
        let store = Arc::new(SqliteStore::new(pool.clone()));
        let jwt = Arc::new(config.jwt.clone());

        let registry = Arc::new(RoleRegistry::load(store.clone()).await?);
        let policy = Arc::new(PolicyStore::load(store.clone(), Arc::clone(&registry)).await?);
        let notifications = NotificationDispatcher::new(store.clone());
        let audit = Arc::new(AuditTrail::new(store.clone(), notifications.clone()));
        let tasks = Arc::new(TaskService::new(store.clone(), Arc::clone(&audit), notifications.clone()));
        let users = Arc::new(UserService::new(store.clone(), Arc::clone(&registry)));
        let sessions = Arc::new(SessionResolver::new(Arc::clone(&jwt), store, Arc::clone(&registry)));

        Ok(Self {
            pool,
            config: Arc::new(config),
            jwt,
            registry,
            policy,
            users,
            tasks,
            notifications,
            audit,
            sessions,
            classifier: Arc::new(RouteClassifier::standard()),
        })
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let config = AppConfig::from_env()?;
    let port = config.port;
    let state = AppState::new(pool, config).await?;

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_origin(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/health", get(health::health))
        .nest("/auth", auth::routes())
        .nest("/client-auth", client_auth::routes())
        .nest("/session", session::routes())
        .merge(users::routes())
        .nest("/rbac", rbac::routes())
        .nest("/tasks", tasks::routes())
        .nest("/notifications", notifications::routes());

    let openapi = docs::build_openapi(port).map_err(|err| AppError::internal(format!("openapi: {err}")))?;

    let router = Router::new()
        .nest("/api", api)
        .with_state(state.clone())
        .merge(docs::swagger_routes(openapi)?)
        .layer(from_fn_with_state(state, route_gate))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
