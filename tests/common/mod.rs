#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Context;
use axum::body::{self, Body};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt; // for `oneshot`

use agency_crm::authz::RoleRegistry;
use agency_crm::create_app;
use agency_crm::db::SqliteStore;
use agency_crm::models::user::User;
use agency_crm::services::users::UserService;

pub const PASSWORD: &str = "password123";

pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    // Keeps the database file alive for the test.
    _dir: TempDir,
}

pub async fn setup() -> anyhow::Result<TestApp> {
    let dir = tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("test.db");

    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator =
        sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;

    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app(pool.clone()).await?;

    Ok(TestApp { app, pool, _dir: dir })
}

impl TestApp {
    /// Inserts an active staff account straight into the database.
    pub async fn seed_staff(&self, name: &str, email: &str, role: &str) -> anyhow::Result<User> {
        let store = Arc::new(SqliteStore::new(self.pool.clone()));
        let registry = Arc::new(RoleRegistry::load(store.clone()).await?);
        let users = UserService::new(store, registry);
        Ok(users.seed_active(name, email, PASSWORD, role).await?)
    }

    pub async fn send(&self, req: Request<Body>) -> anyhow::Result<Response> {
        Ok(self.app.clone().oneshot(req).await?)
    }

    /// Signs in and returns the `Cookie` header value for the session.
    pub async fn login_staff(&self, email: &str) -> anyhow::Result<String> {
        let resp = self
            .send(json_request(
                "POST",
                "/api/auth/login",
                None,
                serde_json::json!({ "email": email, "password": PASSWORD }),
            )?)
            .await?;
        anyhow::ensure!(resp.status() == StatusCode::OK, "staff login failed: {}", resp.status());
        session_cookie(&resp, "crm_staff_session").context("no staff cookie set")
    }

    pub async fn login_client(&self, email: &str) -> anyhow::Result<String> {
        let resp = self
            .send(json_request(
                "POST",
                "/api/client-auth/login",
                None,
                serde_json::json!({ "email": email, "password": PASSWORD }),
            )?)
            .await?;
        anyhow::ensure!(resp.status() == StatusCode::OK, "client login failed: {}", resp.status());
        session_cookie(&resp, "crm_client_session").context("no client cookie set")
    }
}

pub fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: Value) -> anyhow::Result<Request<Body>> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    Ok(builder.body(Body::from(body.to_string()))?)
}

pub fn empty_request(method: &str, uri: &str, cookie: Option<&str>) -> anyhow::Result<Request<Body>> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    Ok(builder.body(Body::empty())?)
}

pub async fn read_json(resp: Response) -> anyhow::Result<Value> {
    let body_bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    Ok(serde_json::from_slice(&body_bytes)?)
}

/// Every `Set-Cookie` header on the response.
pub fn set_cookies(resp: &Response) -> Vec<String> {
    resp.headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// `name=value` of a cookie the response sets to a non-empty value.
pub fn session_cookie(resp: &Response, name: &str) -> Option<String> {
    set_cookies(resp).into_iter().find_map(|cookie| {
        let pair = cookie.split(';').next()?.trim().to_string();
        let (key, value) = pair.split_once('=')?;
        (key == name && !value.is_empty()).then_some(pair)
    })
}

/// True when the response expires the named cookie.
pub fn clears_cookie(resp: &Response, name: &str) -> bool {
    set_cookies(resp)
        .iter()
        .any(|cookie| cookie.starts_with(&format!("{name}=;")) && cookie.contains("Max-Age=0"))
}
