use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};

use super::guard::{GuardOutcome, GuardState, Principal, RouteRequirement, SessionGuard};
use super::identity::{append_cookies, CookieUpdate, CredentialKind, SessionIdentity, SessionJar};
use crate::app::AppState;
use crate::authz::PermissionEngine;
use crate::errors::AppError;
use crate::models::user::{ClientUser, User};
use crate::services::Actor;

/// An active staff member, plus the permission engine for this request.
pub struct StaffSession {
    pub user: User,
    pub actor: Actor,
    pub engine: PermissionEngine,
}

/// A [`StaffSession`] whose role is the administrator role.
pub struct AdminSession(pub StaffSession);

/// An active portal account.
pub struct ClientSession {
    pub client_user: ClientUser,
}

/// A guard refusal as an HTTP response. Carries the cookies the guard
/// asked to expire.
#[derive(Debug)]
pub struct GuardRejection {
    error: AppError,
    clear: Vec<CookieUpdate>,
}

impl From<AppError> for GuardRejection {
    fn from(error: AppError) -> Self {
        Self {
            error,
            clear: Vec::new(),
        }
    }
}

impl IntoResponse for GuardRejection {
    fn into_response(self) -> Response {
        let mut response = self.error.into_response();
        append_cookies(response.headers_mut(), &self.clear);
        response
    }
}

async fn guard(
    parts: &Parts,
    state: &AppState,
    route: &RouteRequirement,
) -> Result<(SessionIdentity, GuardOutcome), GuardRejection> {
    let jar = SessionJar::from_headers(&parts.headers);
    let identity = state.sessions.resolve(&jar).await?;
    let outcome = SessionGuard::evaluate(Some(&identity), route);
    if outcome.may_render() {
        return Ok((identity, outcome));
    }

    let error = match &outcome.state {
        GuardState::AwaitingApproval => AppError::PendingApproval,
        GuardState::Forbidden(reason) => AppError::forbidden(reason.as_str()),
        _ => match route.audience {
            CredentialKind::Staff => AppError::unauthorized("staff sign-in required"),
            CredentialKind::Client => AppError::client_unauthorized("portal sign-in required"),
        },
    };
    let clear = outcome
        .clear
        .iter()
        .map(|kind| CookieUpdate::clear(*kind, state.config.cookie_secure))
        .collect();
    Err(GuardRejection { error, clear })
}

async fn staff_session(parts: &Parts, state: &AppState, route: RouteRequirement) -> Result<StaffSession, GuardRejection> {
    let (identity, outcome) = guard(parts, state, &route).await?;
    let (Some(staff), GuardState::Authorized(Principal::Staff { user_id, role })) = (identity.staff, outcome.state)
    else {
        return Err(AppError::unauthorized("staff sign-in required").into());
    };
    Ok(StaffSession {
        user: staff.user,
        actor: Actor::new(user_id, role),
        engine: state.policy.engine().await,
    })
}

#[async_trait]
impl FromRequestParts<AppState> for StaffSession {
    type Rejection = GuardRejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        staff_session(parts, state, RouteRequirement::staff()).await
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminSession {
    type Rejection = GuardRejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        staff_session(parts, state, RouteRequirement::admin()).await.map(AdminSession)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for ClientSession {
    type Rejection = GuardRejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let (identity, _) = guard(parts, state, &RouteRequirement::client()).await?;
        let client = identity
            .client
            .ok_or_else(|| AppError::client_unauthorized("portal sign-in required"))?;
        Ok(ClientSession {
            client_user: client.client_user,
        })
    }
}
