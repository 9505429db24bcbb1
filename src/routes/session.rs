use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::cookie_headers;
use crate::app::AppState;
use crate::edge::RouteClass;
use crate::errors::AppResult;
use crate::session::{
    CookieUpdate, CredentialKind, GuardState, Principal, SessionGuard, SessionJar,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResolveRequest {
    #[schema(example = "/reports/q3")]
    pub path: String,
}

/// What the guard decided for a page path and the caller's credentials.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResolution {
    pub path: String,
    pub class: RouteClass,
    /// `unguarded` for public and excluded paths, otherwise the guard state.
    #[schema(example = "authorized")]
    pub state: String,
    #[schema(value_type = Option<Object>)]
    pub principal: Option<Principal>,
    pub forbidden_reason: Option<String>,
    pub redirect: Option<String>,
    /// Credentials expired by this response.
    pub cleared: Vec<CredentialKind>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/resolve", post(resolve))
}

/// Runs classification and the session guard for `path` exactly as a page
/// navigation would, and expires whatever the guard asks to clear.
#[utoipa::path(
    post,
    path = "/api/session/resolve",
    tag = "Session",
    request_body = ResolveRequest,
    responses((status = 200, description = "Guard outcome for the path", body = SessionResolution))
)]
pub async fn resolve(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ResolveRequest>,
) -> AppResult<(HeaderMap, Json<SessionResolution>)> {
    let class = state.classifier.classify(&payload.path);
    let Some(requirement) = state.classifier.requirement(&payload.path) else {
        return Ok((
            HeaderMap::new(),
            Json(SessionResolution {
                path: payload.path,
                class,
                state: "unguarded".to_string(),
                principal: None,
                forbidden_reason: None,
                redirect: None,
                cleared: Vec::new(),
            }),
        ));
    };

    let jar = SessionJar::from_headers(&headers);
    let identity = state.sessions.resolve(&jar).await?;
    let outcome = SessionGuard::evaluate(Some(&identity), &requirement);
    tracing::debug!(path = %payload.path, state = outcome.state.name(), "session resolved");

    let (principal, forbidden_reason) = match &outcome.state {
        GuardState::Authorized(principal) => (Some(principal.clone()), None),
        GuardState::Forbidden(reason) => (None, Some(reason.as_str().to_string())),
        _ => (None, None),
    };
    let clears: Vec<CookieUpdate> = outcome
        .clear
        .iter()
        .map(|kind| CookieUpdate::clear(*kind, state.config.cookie_secure))
        .collect();

    Ok((
        cookie_headers(&clears),
        Json(SessionResolution {
            path: payload.path,
            class,
            state: outcome.state.name().to_string(),
            principal,
            forbidden_reason,
            redirect: outcome.redirect.map(str::to_string),
            cleared: outcome.clear,
        }),
    ))
}
