use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::identity::{CredentialKind, SessionIdentity};
use crate::authz::{normalize_role_key, RoleRef};
use crate::errors::{CLIENT_LOGIN_PATH, PENDING_APPROVAL_PATH, STAFF_LOGIN_PATH};
use crate::models::user::{ClientStatus, UserStatus};

pub const HOME_PATH: &str = "/";

/// Who was let through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Principal {
    Staff { user_id: Uuid, role: RoleRef },
    Client { client_user_id: Uuid, client_id: Uuid },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ForbiddenReason {
    Role,
    AdminRequired,
}

impl ForbiddenReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForbiddenReason::Role => "role",
            ForbiddenReason::AdminRequired => "admin-required",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardState {
    /// Identity not resolved yet. Never renders.
    Unresolved,
    Unauthenticated,
    AwaitingApproval,
    Authorized(Principal),
    Forbidden(ForbiddenReason),
}

impl GuardState {
    pub fn name(&self) -> &'static str {
        match self {
            GuardState::Unresolved => "unresolved",
            GuardState::Unauthenticated => "unauthenticated",
            GuardState::AwaitingApproval => "awaiting-approval",
            GuardState::Authorized(_) => "authorized",
            GuardState::Forbidden(_) => "forbidden",
        }
    }
}

/// What a protected route asks of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRequirement {
    pub audience: CredentialKind,
    /// Role identifiers allowed in; `None` admits any staff role.
    pub allowed_roles: Option<Vec<String>>,
    pub admin_only: bool,
}

impl RouteRequirement {
    pub fn staff() -> Self {
        Self {
            audience: CredentialKind::Staff,
            allowed_roles: None,
            admin_only: false,
        }
    }

    pub fn admin() -> Self {
        Self {
            admin_only: true,
            ..Self::staff()
        }
    }

    pub fn client() -> Self {
        Self {
            audience: CredentialKind::Client,
            allowed_roles: None,
            admin_only: false,
        }
    }

    pub fn with_roles(roles: &[&str]) -> Self {
        Self {
            allowed_roles: Some(roles.iter().map(|role| normalize_role_key(role)).collect()),
            ..Self::staff()
        }
    }

    fn admits(&self, role: &RoleRef) -> bool {
        match &self.allowed_roles {
            None => true,
            // An unresolved role never satisfies a role set.
            Some(allowed) => role.is_recognized() && allowed.iter().any(|r| r == role.key()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardOutcome {
    pub state: GuardState,
    pub redirect: Option<&'static str>,
    /// Credentials the response must expire.
    pub clear: Vec<CredentialKind>,
}

impl GuardOutcome {
    fn new(state: GuardState, redirect: Option<&'static str>, clear: Vec<CredentialKind>) -> Self {
        Self { state, redirect, clear }
    }

    pub fn may_render(&self) -> bool {
        matches!(self.state, GuardState::Authorized(_))
    }
}

fn login_for(audience: CredentialKind) -> &'static str {
    match audience {
        CredentialKind::Staff => STAFF_LOGIN_PATH,
        CredentialKind::Client => CLIENT_LOGIN_PATH,
    }
}

/// Single decision point for route entry.
///
/// Rules run in a fixed order and the first match wins:
/// 1. no usable credential -> unauthenticated, redirected to the login page
///    of the route's audience (`/client-login` for portal routes)
/// 2. suspended portal account -> clear it, unauthenticated
/// 3. credential of the wrong kind for the route -> unauthenticated, the
///    other session is left alone
/// 4. pending staff account -> awaiting approval
/// 5. role outside the route's role set -> forbidden (role)
/// 6. admin route, non-admin role -> forbidden (admin-required)
/// 7. authorized
///
/// A suspended staff account is treated like a missing credential.
pub struct SessionGuard;

impl SessionGuard {
    pub fn evaluate(identity: Option<&SessionIdentity>, route: &RouteRequirement) -> GuardOutcome {
        let Some(identity) = identity else {
            return GuardOutcome::new(GuardState::Unresolved, None, Vec::new());
        };
        let mut clear = identity.stale.clone();
        let staff = identity.staff.as_ref();
        let client = identity.client.as_ref();

        if staff.is_none() && client.is_none() {
            return GuardOutcome::new(GuardState::Unauthenticated, Some(login_for(route.audience)), clear);
        }

        if let Some(client) = client {
            if client.client_user.status == ClientStatus::Suspended {
                clear.push(CredentialKind::Client);
                return GuardOutcome::new(GuardState::Unauthenticated, Some(CLIENT_LOGIN_PATH), clear);
            }
        }

        let staff = match route.audience {
            CredentialKind::Staff => {
                if client.is_some() {
                    return GuardOutcome::new(GuardState::Unauthenticated, Some(STAFF_LOGIN_PATH), clear);
                }
                staff
            }
            CredentialKind::Client => {
                return match (staff, client) {
                    (None, Some(client)) => GuardOutcome::new(
                        GuardState::Authorized(Principal::Client {
                            client_user_id: client.client_user.id,
                            client_id: client.client_user.client_id,
                        }),
                        None,
                        clear,
                    ),
                    _ => GuardOutcome::new(GuardState::Unauthenticated, Some(CLIENT_LOGIN_PATH), clear),
                };
            }
        };

        let Some(staff) = staff else {
            return GuardOutcome::new(GuardState::Unauthenticated, Some(STAFF_LOGIN_PATH), clear);
        };

        match staff.user.status {
            UserStatus::Pending => {
                return GuardOutcome::new(GuardState::AwaitingApproval, Some(PENDING_APPROVAL_PATH), clear);
            }
            UserStatus::Suspended => {
                clear.push(CredentialKind::Staff);
                return GuardOutcome::new(GuardState::Unauthenticated, Some(STAFF_LOGIN_PATH), clear);
            }
            UserStatus::Active => {}
        }

        if !route.admits(&staff.role) {
            tracing::info!(user_id = %staff.user.id, role = %staff.role, "route denied for role");
            return GuardOutcome::new(GuardState::Forbidden(ForbiddenReason::Role), Some(HOME_PATH), clear);
        }

        if route.admin_only && !staff.role.is_admin() {
            tracing::info!(user_id = %staff.user.id, role = %staff.role, "admin route denied");
            return GuardOutcome::new(
                GuardState::Forbidden(ForbiddenReason::AdminRequired),
                Some(HOME_PATH),
                clear,
            );
        }

        GuardOutcome::new(
            GuardState::Authorized(Principal::Staff {
                user_id: staff.user.id,
                role: staff.role.clone(),
            }),
            None,
            clear,
        )
    }
}
