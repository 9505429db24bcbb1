use std::sync::Arc;

use super::identity::{ClientIdentity, CredentialKind, SessionIdentity, SessionJar, StaffIdentity};
use crate::authz::RoleRegistry;
use crate::errors::AppResult;
use crate::jwt::JwtConfig;
use crate::store::UserStore;

/// Turns raw credentials into a [`SessionIdentity`].
///
/// Tokens that fail to decode, or whose account no longer exists, are
/// reported as stale instead of failing the request.
pub struct SessionResolver {
    jwt: Arc<JwtConfig>,
    users: Arc<dyn UserStore>,
    registry: Arc<RoleRegistry>,
}

impl SessionResolver {
    pub fn new(jwt: Arc<JwtConfig>, users: Arc<dyn UserStore>, registry: Arc<RoleRegistry>) -> Self {
        Self { jwt, users, registry }
    }

    pub async fn resolve(&self, jar: &SessionJar) -> AppResult<SessionIdentity> {
        let mut identity = SessionIdentity::anonymous();

        if let Some(token) = jar.token(CredentialKind::Staff) {
            match self.jwt.decode(CredentialKind::Staff, token) {
                Ok(claims) => match self.users.find_user(claims.sub).await? {
                    Some(user) => {
                        let role = self.registry.resolve_ref(&user.role).await;
                        if !role.is_recognized() {
                            tracing::warn!(
                                user_id = %user.id,
                                role = %user.role,
                                "policy inconsistency: user references an unknown role"
                            );
                        }
                        identity.staff = Some(StaffIdentity {
                            user: user.into(),
                            role,
                        });
                    }
                    None => identity.stale.push(CredentialKind::Staff),
                },
                Err(err) => {
                    tracing::debug!(error = %err, "staff credential rejected");
                    identity.stale.push(CredentialKind::Staff);
                }
            }
        }

        if let Some(token) = jar.token(CredentialKind::Client) {
            match self.jwt.decode(CredentialKind::Client, token) {
                Ok(claims) => match self.users.find_client_user(claims.sub).await? {
                    Some(client_user) => {
                        identity.client = Some(ClientIdentity {
                            client_user: client_user.into(),
                        });
                    }
                    None => identity.stale.push(CredentialKind::Client),
                },
                Err(err) => {
                    tracing::debug!(error = %err, "client credential rejected");
                    identity.stale.push(CredentialKind::Client);
                }
            }
        }

        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::RoleRef;
    use crate::models::user::{DbUser, UserStatus};
    use crate::store::memory::MemoryStore;
    use crate::store::UserStore;
    use chrono::Utc;
    use uuid::Uuid;

    async fn resolver(store: Arc<MemoryStore>) -> (Arc<JwtConfig>, SessionResolver) {
        let jwt = Arc::new(JwtConfig {
            secret: Arc::new(b"resolver-secret".to_vec()),
            exp_hours: 1,
        });
        let registry = Arc::new(RoleRegistry::load(store.clone()).await.unwrap());
        (jwt.clone(), SessionResolver::new(jwt, store, registry))
    }

    fn db_user(role: &str) -> DbUser {
        let now = Utc::now();
        DbUser {
            id: Uuid::new_v4(),
            name: "Kim".into(),
            email: format!("{}@agency.example", Uuid::new_v4()),
            password_hash: "unused".into(),
            role: role.into(),
            status: UserStatus::Active,
            avatar_url: None,
            department: None,
            approved_by: None,
            approved_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn resolves_staff_role_through_registry() {
        let store = Arc::new(MemoryStore::new());
        let user = db_user("Manager");
        store.insert_user(&user).await.unwrap();
        let (jwt, resolver) = resolver(store).await;

        let token = jwt.encode(CredentialKind::Staff, user.id).unwrap();
        let identity = resolver.resolve(&SessionJar::new(Some(token), None)).await.unwrap();
        let staff = identity.staff.unwrap();
        assert_eq!(staff.role, RoleRef::Builtin(crate::authz::BuiltinRole::Manager));
        assert!(identity.stale.is_empty());
    }

    #[tokio::test]
    async fn unknown_role_resolves_as_unrecognized() {
        let store = Arc::new(MemoryStore::new());
        let user = db_user("retired-role");
        store.insert_user(&user).await.unwrap();
        let (jwt, resolver) = resolver(store).await;

        let token = jwt.encode(CredentialKind::Staff, user.id).unwrap();
        let identity = resolver.resolve(&SessionJar::new(Some(token), None)).await.unwrap();
        assert_eq!(identity.staff.unwrap().role, RoleRef::Unrecognized("retired-role".into()));
    }

    #[tokio::test]
    async fn wrong_kind_and_garbage_tokens_are_stale() {
        let store = Arc::new(MemoryStore::new());
        let user = db_user("designer");
        store.insert_user(&user).await.unwrap();
        let (jwt, resolver) = resolver(store).await;

        // A staff token placed in the client slot does not resolve.
        let staff_token = jwt.encode(CredentialKind::Staff, user.id).unwrap();
        let identity = resolver
            .resolve(&SessionJar::new(Some("garbage".into()), Some(staff_token)))
            .await
            .unwrap();
        assert!(identity.staff.is_none());
        assert!(identity.client.is_none());
        assert_eq!(identity.stale, vec![CredentialKind::Staff, CredentialKind::Client]);
    }
}
