use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use super::roles::{normalize_role_key, BuiltinRole, CustomRole, CustomRoleKey, RoleMetadata, RoleRef};
use crate::errors::{AppError, AppResult};
use crate::store::RoleStore;
use crate::utils::utc_now;

const MAX_ROLE_NAME_LENGTH: usize = 64;
const DEFAULT_CUSTOM_GLYPH: &str = "🏷️";

/// Immutable list of custom roles at one point in time.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    custom: Vec<CustomRole>,
}

impl Roster {
    pub fn new(custom: Vec<CustomRole>) -> Self {
        Self { custom }
    }

    pub fn find_custom(&self, key: &str) -> Option<&CustomRole> {
        let key = normalize_role_key(key);
        self.custom.iter().find(|role| role.name == key)
    }

    pub fn contains(&self, role: &RoleRef) -> bool {
        match role {
            RoleRef::Builtin(_) => true,
            RoleRef::Custom(key) => self.find_custom(key.as_str()).is_some(),
            RoleRef::Unrecognized(_) => false,
        }
    }

    /// Total resolution: never fails, unknown identifiers come back as
    /// [`RoleRef::Unrecognized`].
    pub fn resolve_ref(&self, raw: &str) -> RoleRef {
        if let Some(builtin) = BuiltinRole::from_key(raw) {
            return RoleRef::Builtin(builtin);
        }
        match self.find_custom(raw) {
            Some(role) => RoleRef::Custom(CustomRoleKey::new(role.name.clone())),
            None => RoleRef::Unrecognized(raw.to_string()),
        }
    }

    pub fn metadata(&self, raw: &str) -> Option<RoleMetadata> {
        if let Some(builtin) = BuiltinRole::from_key(raw) {
            return Some(builtin.into());
        }
        self.find_custom(raw).map(RoleMetadata::from)
    }

    /// Built-ins in their fixed order, then custom roles oldest first.
    pub fn list(&self) -> Vec<RoleMetadata> {
        BuiltinRole::ALL
            .into_iter()
            .map(RoleMetadata::from)
            .chain(self.custom.iter().map(RoleMetadata::from))
            .collect()
    }

    fn collides(&self, key: &str) -> bool {
        BuiltinRole::from_key(key).is_some() || self.find_custom(key).is_some()
    }
}

/// Owns the set of known roles and resolves identifiers against it.
pub struct RoleRegistry {
    store: Arc<dyn RoleStore>,
    roster: RwLock<Arc<Roster>>,
}

impl RoleRegistry {
    pub async fn load(store: Arc<dyn RoleStore>) -> AppResult<Self> {
        let custom = store.list_custom_roles().await?;
        tracing::debug!(custom_roles = custom.len(), "role registry loaded");
        Ok(Self {
            store,
            roster: RwLock::new(Arc::new(Roster::new(custom))),
        })
    }

    pub async fn roster(&self) -> Arc<Roster> {
        Arc::clone(&*self.roster.read().await)
    }

    pub async fn resolve(&self, role_id: &str) -> AppResult<RoleMetadata> {
        self.roster()
            .await
            .metadata(role_id)
            .ok_or_else(|| AppError::not_found(format!("role '{role_id}' not found")))
    }

    pub async fn resolve_ref(&self, raw: &str) -> RoleRef {
        self.roster().await.resolve_ref(raw)
    }

    pub async fn list_roles(&self) -> Vec<RoleMetadata> {
        self.roster().await.list()
    }

    /// Persists a new custom role and publishes it to readers.
    ///
    /// The write lock is held across the duplicate check and the insert, so
    /// two creations of the same name in this process cannot both pass; the
    /// store's unique index covers other processes.
    pub async fn create_custom_role(
        &self,
        name: &str,
        label: Option<&str>,
        glyph: Option<&str>,
        creator: Uuid,
    ) -> AppResult<RoleMetadata> {
        let key = normalize_role_key(name);
        validate_role_key(&key)?;

        let mut guard = self.roster.write().await;
        if guard.collides(&key) {
            return Err(AppError::duplicate_role(key));
        }

        let label = label.map(str::trim).filter(|l| !l.is_empty()).unwrap_or(name.trim());
        let glyph = glyph.map(str::trim).filter(|g| !g.is_empty()).unwrap_or(DEFAULT_CUSTOM_GLYPH);

        let role = CustomRole {
            id: Uuid::new_v4(),
            name: key.clone(),
            label: label.to_string(),
            glyph: glyph.to_string(),
            created_by: creator,
            created_at: utc_now(),
        };

        if let Err(err) = self.store.insert_custom_role(&role).await {
            if err.is_unique_violation() {
                return Err(AppError::duplicate_role(key));
            }
            return Err(err);
        }

        let mut custom = guard.custom.clone();
        custom.push(role.clone());
        *guard = Arc::new(Roster::new(custom));

        tracing::info!(role = %role.name, created_by = %creator, "custom role created");
        Ok(RoleMetadata::from(&role))
    }
}

fn validate_role_key(key: &str) -> AppResult<()> {
    if key.is_empty() {
        return Err(AppError::bad_request("role name must not be empty"));
    }
    if key.chars().count() > MAX_ROLE_NAME_LENGTH {
        return Err(AppError::bad_request(format!(
            "role name must be at most {MAX_ROLE_NAME_LENGTH} characters"
        )));
    }
    if !key.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') {
        return Err(AppError::bad_request(
            "role name may only contain letters, digits, '-' and '_'",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    async fn registry() -> RoleRegistry {
        RoleRegistry::load(Arc::new(MemoryStore::new())).await.unwrap()
    }

    #[tokio::test]
    async fn resolves_builtin_roles() {
        let registry = registry().await;
        let meta = registry.resolve("content-writer").await.unwrap();
        assert_eq!(meta.label, "Content Writer");
        assert!(!meta.is_custom);
    }

    #[tokio::test]
    async fn unknown_role_is_not_found() {
        let registry = registry().await;
        assert!(matches!(registry.resolve("intern").await, Err(AppError::NotFound(_))));
        assert_eq!(
            registry.resolve_ref("intern").await,
            RoleRef::Unrecognized("intern".into())
        );
    }

    #[tokio::test]
    async fn created_role_is_listed_after_builtins() {
        let registry = registry().await;
        let creator = Uuid::new_v4();
        registry
            .create_custom_role("Video Editor", None, Some("🎬"), creator)
            .await
            .unwrap();
        registry
            .create_custom_role("seo", Some("SEO Specialist"), None, creator)
            .await
            .unwrap();

        let ids: Vec<String> = registry.list_roles().await.into_iter().map(|r| r.id).collect();
        assert_eq!(
            ids,
            vec![
                "admin",
                "manager",
                "designer",
                "content-writer",
                "social-media",
                "team-member",
                "video-editor",
                "seo"
            ]
        );

        let meta = registry.resolve("VIDEO-EDITOR").await.unwrap();
        assert_eq!(meta.label, "Video Editor");
        assert_eq!(meta.glyph, "🎬");
        assert_eq!(meta.created_by, Some(creator));
        assert!(matches!(registry.resolve_ref("video-editor").await, RoleRef::Custom(_)));
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected_case_insensitively() {
        let registry = registry().await;
        let creator = Uuid::new_v4();
        registry.create_custom_role("Strategist", None, None, creator).await.unwrap();
        let before = registry.list_roles().await;

        let custom_clash = registry.create_custom_role("STRATEGIST", None, None, creator).await;
        assert!(matches!(custom_clash, Err(AppError::DuplicateRole(_))));

        let builtin_clash = registry.create_custom_role("Admin", None, None, creator).await;
        assert!(matches!(builtin_clash, Err(AppError::DuplicateRole(_))));

        assert_eq!(registry.list_roles().await, before);
    }

    #[tokio::test]
    async fn malformed_names_are_rejected() {
        let registry = registry().await;
        let creator = Uuid::new_v4();
        assert!(matches!(
            registry.create_custom_role("   ", None, None, creator).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            registry.create_custom_role("ops/lead", None, None, creator).await,
            Err(AppError::BadRequest(_))
        ));
    }
}
