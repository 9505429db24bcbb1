pub mod auth;
pub mod client_auth;
pub mod health;
pub mod notifications;
pub mod rbac;
pub mod session;
pub mod tasks;
pub mod users;

use axum::http::HeaderMap;

use crate::session::{append_cookies, CookieUpdate};

/// Response headers carrying the given `Set-Cookie` instructions.
pub(crate) fn cookie_headers(updates: &[CookieUpdate]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    append_cookies(&mut headers, updates);
    headers
}
