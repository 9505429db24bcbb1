//! Session integrity.
//!
//! Staff and portal sessions use separate credentials and are never held
//! together. Every protected entry goes through [`SessionGuard::evaluate`]
//! with an identity resolved once for the request.

pub mod extract;
pub mod guard;
pub mod identity;
pub mod resolver;

pub use extract::{AdminSession, ClientSession, GuardRejection, StaffSession};
pub use guard::{ForbiddenReason, GuardOutcome, GuardState, Principal, RouteRequirement, SessionGuard, HOME_PATH};
pub use identity::{
    append_cookies, establish, ClientIdentity, CookieUpdate, CredentialKind, SessionIdentity, SessionJar,
    StaffIdentity, CLIENT_COOKIE, STAFF_COOKIE,
};
pub use resolver::SessionResolver;
