use std::sync::Arc;

use uuid::Uuid;

use super::Actor;
use crate::authz::{Action, BuiltinRole, PermissionEngine, Resource, RoleRegistry};
use crate::errors::{AppError, AppResult};
use crate::models::user::{
    Client, ClientStatus, ClientUser, ClientUserCreateRequest, DbClientUser, DbUser, RegisterRequest, User,
    UserStatus,
};
use crate::store::UserStore;
use crate::utils::{hash_password, normalize_email, utc_now, verify_password};

/// Staff and portal account lifecycle.
pub struct UserService {
    users: Arc<dyn UserStore>,
    registry: Arc<RoleRegistry>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserStore>, registry: Arc<RoleRegistry>) -> Self {
        Self { users, registry }
    }

    // ---------------------------------------------------------------------
    // staff
    // ---------------------------------------------------------------------

    /// Self-registration. The account starts pending with the least
    /// privileged built-in role.
    pub async fn register(&self, payload: RegisterRequest) -> AppResult<User> {
        let user = self
            .insert_staff(
                &payload.name,
                &payload.email,
                &payload.password,
                BuiltinRole::TeamMember.as_str(),
                UserStatus::Pending,
                payload.department,
            )
            .await?;
        tracing::info!(user_id = %user.id, "staff registration pending approval");
        Ok(user)
    }

    /// Creates an account that is active from the start, bypassing approval.
    pub async fn seed_active(&self, name: &str, email: &str, password: &str, role: &str) -> AppResult<User> {
        let role = self.registry.resolve(role).await?;
        let user = self
            .insert_staff(name, email, password, &role.id, UserStatus::Active, None)
            .await?;
        tracing::info!(user_id = %user.id, role = %user.role, "active staff account seeded");
        Ok(user)
    }

    /// Pending accounts may sign in; the session guard keeps them on the
    /// approval screen. Suspended accounts may not.
    pub async fn authenticate_staff(&self, email: &str, password: &str) -> AppResult<User> {
        let user = self
            .users
            .find_user_by_email(&normalize_email(email))
            .await?
            .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

        if !verify_password(password, &user.password_hash)? {
            return Err(AppError::unauthorized("invalid credentials"));
        }
        if user.status == UserStatus::Suspended {
            tracing::info!(user_id = %user.id, "suspended account attempted to sign in");
            return Err(AppError::unauthorized("account suspended"));
        }
        Ok(user.into())
    }

    pub async fn list(&self, actor: &Actor, engine: &PermissionEngine) -> AppResult<Vec<User>> {
        engine.require(&actor.role, Resource::Users, Action::View)?;
        let users = self.users.list_users().await?;
        Ok(users.into_iter().map(User::from).collect())
    }

    /// pending -> active. Records who approved and when.
    pub async fn approve(&self, admin: &Actor, id: Uuid) -> AppResult<User> {
        require_admin(admin)?;
        let mut user = self.load(id).await?;
        if user.status != UserStatus::Pending {
            return Err(AppError::conflict(format!(
                "only pending accounts can be approved (account is {})",
                user.status.as_str()
            )));
        }
        let now = utc_now();
        user.status = UserStatus::Active;
        user.approved_by = Some(admin.user_id);
        user.approved_at = Some(now);
        user.updated_at = now;
        self.users.save_user(&user).await?;
        tracing::info!(user_id = %id, approved_by = %admin.user_id, "account approved");
        Ok(user.into())
    }

    /// active -> suspended.
    pub async fn suspend(&self, admin: &Actor, id: Uuid) -> AppResult<User> {
        require_admin(admin)?;
        if admin.user_id == id {
            return Err(AppError::bad_request("administrators cannot suspend themselves"));
        }
        let mut user = self.load(id).await?;
        if user.status != UserStatus::Active {
            return Err(AppError::conflict(format!(
                "only active accounts can be suspended (account is {})",
                user.status.as_str()
            )));
        }
        user.status = UserStatus::Suspended;
        user.updated_at = utc_now();
        self.users.save_user(&user).await?;
        tracing::info!(user_id = %id, suspended_by = %admin.user_id, "account suspended");
        Ok(user.into())
    }

    /// suspended -> active.
    pub async fn reactivate(&self, admin: &Actor, id: Uuid) -> AppResult<User> {
        require_admin(admin)?;
        let mut user = self.load(id).await?;
        if user.status != UserStatus::Suspended {
            return Err(AppError::conflict("only suspended accounts can be reactivated"));
        }
        user.status = UserStatus::Active;
        user.updated_at = utc_now();
        self.users.save_user(&user).await?;
        tracing::info!(user_id = %id, reactivated_by = %admin.user_id, "account reactivated");
        Ok(user.into())
    }

    pub async fn change_role(&self, admin: &Actor, id: Uuid, role: &str) -> AppResult<User> {
        require_admin(admin)?;
        let role = self.registry.resolve(role).await?;
        let mut user = self.load(id).await?;
        user.role = role.id;
        user.updated_at = utc_now();
        self.users.save_user(&user).await?;
        tracing::info!(user_id = %id, role = %user.role, changed_by = %admin.user_id, "role changed");
        Ok(user.into())
    }

    // ---------------------------------------------------------------------
    // clients
    // ---------------------------------------------------------------------

    pub async fn create_client(&self, actor: &Actor, engine: &PermissionEngine, name: &str) -> AppResult<Client> {
        engine.require(&actor.role, Resource::Clients, Action::Create)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::bad_request("client name must not be empty"));
        }
        let client = Client {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: utc_now(),
        };
        self.users.insert_client(&client).await?;
        tracing::info!(client_id = %client.id, "client created");
        Ok(client)
    }

    pub async fn create_client_user(
        &self,
        actor: &Actor,
        engine: &PermissionEngine,
        client_id: Uuid,
        payload: ClientUserCreateRequest,
    ) -> AppResult<ClientUser> {
        engine.require(&actor.role, Resource::Clients, Action::Create)?;
        self.users
            .find_client(client_id)
            .await?
            .ok_or_else(|| AppError::not_found("client not found"))?;

        let name = payload.name.trim();
        if name.is_empty() {
            return Err(AppError::bad_request("name must not be empty"));
        }
        let email = normalize_email(&payload.email);
        if self.users.find_client_user_by_email(&email).await?.is_some() {
            return Err(AppError::conflict("email already in use"));
        }

        let now = utc_now();
        let client_user = DbClientUser {
            id: Uuid::new_v4(),
            client_id,
            name: name.to_string(),
            email,
            password_hash: hash_password(&payload.password)?,
            status: ClientStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.users.insert_client_user(&client_user).await?;
        tracing::info!(client_user_id = %client_user.id, client_id = %client_id, "portal account created");
        Ok(client_user.into())
    }

    pub async fn authenticate_client(&self, email: &str, password: &str) -> AppResult<ClientUser> {
        let user = self
            .users
            .find_client_user_by_email(&normalize_email(email))
            .await?
            .ok_or_else(|| AppError::client_unauthorized("invalid credentials"))?;

        if !verify_password(password, &user.password_hash)? {
            return Err(AppError::client_unauthorized("invalid credentials"));
        }
        if user.status == ClientStatus::Suspended {
            return Err(AppError::client_unauthorized("account suspended"));
        }
        Ok(user.into())
    }

    pub async fn suspend_client_user(&self, actor: &Actor, engine: &PermissionEngine, id: Uuid) -> AppResult<ClientUser> {
        self.set_client_status(actor, engine, id, ClientStatus::Suspended).await
    }

    pub async fn reactivate_client_user(&self, actor: &Actor, engine: &PermissionEngine, id: Uuid) -> AppResult<ClientUser> {
        self.set_client_status(actor, engine, id, ClientStatus::Active).await
    }

    async fn set_client_status(
        &self,
        actor: &Actor,
        engine: &PermissionEngine,
        id: Uuid,
        status: ClientStatus,
    ) -> AppResult<ClientUser> {
        engine.require(&actor.role, Resource::Clients, Action::Update)?;
        let mut user = self.load_client_user(id).await?;
        if user.status == status {
            return Err(AppError::conflict(format!("portal account is already {}", status.as_str())));
        }
        user.status = status;
        user.updated_at = utc_now();
        self.users.save_client_user(&user).await?;
        tracing::info!(client_user_id = %id, status = status.as_str(), actor = %actor.user_id, "portal account status changed");
        Ok(user.into())
    }

    async fn insert_staff(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: &str,
        status: UserStatus,
        department: Option<String>,
    ) -> AppResult<User> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::bad_request("name must not be empty"));
        }
        let email = normalize_email(email);
        if !email.contains('@') {
            return Err(AppError::bad_request("email is not valid"));
        }
        if self.users.find_user_by_email(&email).await?.is_some() {
            return Err(AppError::conflict("email already in use"));
        }

        let now = utc_now();
        let user = DbUser {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email,
            password_hash: hash_password(password)?,
            role: role.to_string(),
            status,
            avatar_url: None,
            department,
            approved_by: None,
            approved_at: None,
            created_at: now,
            updated_at: now,
        };
        self.users.insert_user(&user).await?;
        Ok(user.into())
    }

    async fn load(&self, id: Uuid) -> AppResult<DbUser> {
        self.users
            .find_user(id)
            .await?
            .ok_or_else(|| AppError::not_found("user not found"))
    }

    async fn load_client_user(&self, id: Uuid) -> AppResult<DbClientUser> {
        self.users
            .find_client_user(id)
            .await?
            .ok_or_else(|| AppError::not_found("portal account not found"))
    }
}

fn require_admin(actor: &Actor) -> AppResult<()> {
    if actor.role.is_admin() {
        return Ok(());
    }
    tracing::info!(actor = %actor.user_id, role = %actor.role, "admin-only operation denied");
    Err(AppError::forbidden("administrator role required"))
}
