use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use super::cookie_headers;
use crate::app::AppState;
use crate::errors::AppResult;
use crate::models::user::{AuthResponse, LoginRequest, RegisterRequest, User};
use crate::session::{establish, CookieUpdate, CredentialKind, StaffSession};

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/logout", post(logout))
}

fn staff_session(state: &AppState, user: User) -> AppResult<(HeaderMap, AuthResponse)> {
    let token = state.jwt.encode(CredentialKind::Staff, user.id)?;
    let cookies = establish(
        CredentialKind::Staff,
        token.clone(),
        state.jwt.max_age_seconds(),
        state.config.cookie_secure,
    );
    Ok((cookie_headers(&cookies), AuthResponse { token, user }))
}

/// New staff accounts start pending. The session is issued right away so
/// the browser lands on the awaiting-approval page.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered, pending approval", body = AuthResponse),
        (status = 400, description = "Invalid payload"),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, HeaderMap, Json<AuthResponse>)> {
    let user = state.users.register(payload).await?;
    let (headers, body) = staff_session(&state, user)?;
    Ok((StatusCode::CREATED, headers, Json(body)))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful; staff cookie set, portal cookie cleared", body = AuthResponse),
        (status = 401, description = "Invalid credentials or suspended account")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<(HeaderMap, Json<AuthResponse>)> {
    let user = state.users.authenticate_staff(&payload.email, &payload.password).await?;
    let (headers, body) = staff_session(&state, user)?;
    Ok((headers, Json(body)))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Awaiting approval")
    ),
    security(("cookieAuth" = []), ("bearerAuth" = []))
)]
pub async fn me(session: StaffSession) -> Json<User> {
    Json(session.user)
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "Staff cookie cleared", body = MessageResponse))
)]
pub async fn logout(State(state): State<AppState>) -> (HeaderMap, Json<MessageResponse>) {
    let headers = cookie_headers(&[CookieUpdate::clear(CredentialKind::Staff, state.config.cookie_secure)]);
    (
        headers,
        Json(MessageResponse {
            message: "Logged out".to_string(),
        }),
    )
}
