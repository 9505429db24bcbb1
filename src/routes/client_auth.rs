use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};

use super::auth::MessageResponse;
use super::cookie_headers;
use crate::app::AppState;
use crate::errors::AppResult;
use crate::models::user::{ClientAuthResponse, ClientUser, LoginRequest};
use crate::session::{establish, ClientSession, CookieUpdate, CredentialKind};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/logout", post(logout))
}

#[utoipa::path(
    post,
    path = "/api/client-auth/login",
    tag = "Client Portal",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful; portal cookie set, staff cookie cleared", body = ClientAuthResponse),
        (status = 401, description = "Invalid credentials or suspended account")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<(HeaderMap, Json<ClientAuthResponse>)> {
    let client_user = state.users.authenticate_client(&payload.email, &payload.password).await?;
    let token = state.jwt.encode(CredentialKind::Client, client_user.id)?;
    let cookies = establish(
        CredentialKind::Client,
        token.clone(),
        state.jwt.max_age_seconds(),
        state.config.cookie_secure,
    );
    Ok((cookie_headers(&cookies), Json(ClientAuthResponse { token, client_user })))
}

#[utoipa::path(
    get,
    path = "/api/client-auth/me",
    tag = "Client Portal",
    responses(
        (status = 200, description = "Current portal account", body = ClientUser),
        (status = 401, description = "Not signed in to the portal")
    ),
    security(("cookieAuth" = []))
)]
pub async fn me(session: ClientSession) -> Json<ClientUser> {
    Json(session.client_user)
}

#[utoipa::path(
    post,
    path = "/api/client-auth/logout",
    tag = "Client Portal",
    responses((status = 200, description = "Portal cookie cleared", body = MessageResponse))
)]
pub async fn logout(State(state): State<AppState>) -> (HeaderMap, Json<MessageResponse>) {
    let headers = cookie_headers(&[CookieUpdate::clear(CredentialKind::Client, state.config.cookie_secure)]);
    (
        headers,
        Json(MessageResponse {
            message: "Logged out".to_string(),
        }),
    )
}
