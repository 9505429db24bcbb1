use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

use super::classifier::RouteClass;
use crate::app::AppState;
use crate::errors::{CLIENT_LOGIN_PATH, STAFF_LOGIN_PATH};
use crate::session::{CredentialKind, SessionJar};

/// Edge gate for page paths.
///
/// Only checks that a credential of the right kind is present; whether it
/// is valid, approved or allowed is decided later by the session guard.
pub async fn route_gate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path();
    let class = state.classifier.classify(path);

    let required = match class {
        RouteClass::StaffProtected => Some((CredentialKind::Staff, STAFF_LOGIN_PATH)),
        RouteClass::ClientProtected => Some((CredentialKind::Client, CLIENT_LOGIN_PATH)),
        RouteClass::Public | RouteClass::Excluded => None,
    };

    if let Some((kind, login)) = required {
        let jar = SessionJar::from_headers(request.headers());
        if !jar.has(kind) {
            tracing::debug!(path, credential = kind.as_str(), "no credential at edge, redirecting");
            return Redirect::to(login).into_response();
        }
    }

    next.run(request).await
}
