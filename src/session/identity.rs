use axum::http::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::authz::RoleRef;
use crate::models::user::{ClientUser, User};

pub const STAFF_COOKIE: &str = "crm_staff_session";
pub const CLIENT_COOKIE: &str = "crm_client_session";

/// The two identity spaces. Each has its own storage key and token kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CredentialKind {
    Staff,
    Client,
}

impl CredentialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialKind::Staff => "staff",
            CredentialKind::Client => "client",
        }
    }

    pub fn cookie_name(&self) -> &'static str {
        match self {
            CredentialKind::Staff => STAFF_COOKIE,
            CredentialKind::Client => CLIENT_COOKIE,
        }
    }

    pub fn other(&self) -> CredentialKind {
        match self {
            CredentialKind::Staff => CredentialKind::Client,
            CredentialKind::Client => CredentialKind::Staff,
        }
    }
}

/// Raw credential artifacts found on a request. Nothing here is validated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionJar {
    staff: Option<String>,
    client: Option<String>,
}

impl SessionJar {
    pub fn new(staff: Option<String>, client: Option<String>) -> Self {
        Self { staff, client }
    }

    /// Reads both session cookies. A bearer token counts as a staff
    /// credential when no staff cookie is present; there is no bearer form
    /// for portal sessions.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut jar = SessionJar::default();
        for header in headers.get_all(COOKIE) {
            let Ok(raw) = header.to_str() else { continue };
            for pair in raw.split(';') {
                let Some((name, value)) = pair.trim().split_once('=') else { continue };
                let value = value.trim();
                if value.is_empty() {
                    continue;
                }
                match name.trim() {
                    STAFF_COOKIE => jar.staff = Some(value.to_string()),
                    CLIENT_COOKIE => jar.client = Some(value.to_string()),
                    _ => {}
                }
            }
        }

        if jar.staff.is_none() {
            jar.staff = headers
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_string);
        }
        jar
    }

    pub fn token(&self, kind: CredentialKind) -> Option<&str> {
        match kind {
            CredentialKind::Staff => self.staff.as_deref(),
            CredentialKind::Client => self.client.as_deref(),
        }
    }

    pub fn has(&self, kind: CredentialKind) -> bool {
        self.token(kind).is_some()
    }
}

/// One `Set-Cookie` instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieUpdate {
    pub kind: CredentialKind,
    /// `None` expires the cookie.
    pub value: Option<String>,
    pub max_age: i64,
    pub secure: bool,
}

impl CookieUpdate {
    pub fn set(kind: CredentialKind, token: String, max_age: i64, secure: bool) -> Self {
        Self {
            kind,
            value: Some(token),
            max_age,
            secure,
        }
    }

    pub fn clear(kind: CredentialKind, secure: bool) -> Self {
        Self {
            kind,
            value: None,
            max_age: 0,
            secure,
        }
    }

    pub fn header_value(&self) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.kind.cookie_name(),
            self.value.as_deref().unwrap_or_default(),
            self.max_age
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

/// Cookies for a fresh session of `kind`. The other kind is always
/// expired in the same response so both never coexist in one browser.
pub fn establish(kind: CredentialKind, token: String, max_age: i64, secure: bool) -> Vec<CookieUpdate> {
    vec![
        CookieUpdate::clear(kind.other(), secure),
        CookieUpdate::set(kind, token, max_age, secure),
    ]
}

pub fn append_cookies(headers: &mut HeaderMap, updates: &[CookieUpdate]) {
    for update in updates {
        if let Ok(value) = HeaderValue::from_str(&update.header_value()) {
            headers.append(SET_COOKIE, value);
        }
    }
}

#[derive(Debug, Clone)]
pub struct StaffIdentity {
    pub user: User,
    pub role: RoleRef,
}

#[derive(Debug, Clone)]
pub struct ClientIdentity {
    pub client_user: ClientUser,
}

/// Resolved once per request from a [`SessionJar`] and passed down by
/// value. Accounts are included whatever their status; the guard decides.
#[derive(Debug, Clone, Default)]
pub struct SessionIdentity {
    pub staff: Option<StaffIdentity>,
    pub client: Option<ClientIdentity>,
    /// Credentials that were presented but did not resolve.
    pub stale: Vec<CredentialKind>,
}

impl SessionIdentity {
    pub fn anonymous() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_both_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; crm_staff_session=abc; crm_client_session=xyz"),
        );
        let jar = SessionJar::from_headers(&headers);
        assert_eq!(jar.token(CredentialKind::Staff), Some("abc"));
        assert_eq!(jar.token(CredentialKind::Client), Some("xyz"));
    }

    #[test]
    fn bearer_token_is_staff_only() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer tok"));
        let jar = SessionJar::from_headers(&headers);
        assert_eq!(jar.token(CredentialKind::Staff), Some("tok"));
        assert!(!jar.has(CredentialKind::Client));
    }

    #[test]
    fn establishing_one_kind_expires_the_other() {
        let updates = establish(CredentialKind::Client, "t".into(), 3600, false);
        assert_eq!(updates[0], CookieUpdate::clear(CredentialKind::Staff, false));
        assert_eq!(updates[1].kind, CredentialKind::Client);
        assert_eq!(
            updates[0].header_value(),
            "crm_staff_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"
        );
        assert!(updates[1].header_value().starts_with("crm_client_session=t;"));
    }

    #[test]
    fn secure_flag_is_appended() {
        let cookie = CookieUpdate::set(CredentialKind::Staff, "t".into(), 60, true);
        assert!(cookie.header_value().ends_with("; Secure"));
    }
}
