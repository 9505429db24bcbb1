use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use utoipa::ToSchema;
use uuid::Uuid;

/// Roles shipped with the product. Their order is the listing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum BuiltinRole {
    Admin,
    Manager,
    Designer,
    ContentWriter,
    SocialMedia,
    TeamMember,
}

impl BuiltinRole {
    pub const ALL: [BuiltinRole; 6] = [
        BuiltinRole::Admin,
        BuiltinRole::Manager,
        BuiltinRole::Designer,
        BuiltinRole::ContentWriter,
        BuiltinRole::SocialMedia,
        BuiltinRole::TeamMember,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BuiltinRole::Admin => "admin",
            BuiltinRole::Manager => "manager",
            BuiltinRole::Designer => "designer",
            BuiltinRole::ContentWriter => "content-writer",
            BuiltinRole::SocialMedia => "social-media",
            BuiltinRole::TeamMember => "team-member",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BuiltinRole::Admin => "Administrator",
            BuiltinRole::Manager => "Account Manager",
            BuiltinRole::Designer => "Designer",
            BuiltinRole::ContentWriter => "Content Writer",
            BuiltinRole::SocialMedia => "Social Media",
            BuiltinRole::TeamMember => "Team Member",
        }
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            BuiltinRole::Admin => "🛡️",
            BuiltinRole::Manager => "📋",
            BuiltinRole::Designer => "🎨",
            BuiltinRole::ContentWriter => "✍️",
            BuiltinRole::SocialMedia => "📱",
            BuiltinRole::TeamMember => "👤",
        }
    }

    /// Case-insensitive lookup by identifier.
    pub fn from_key(key: &str) -> Option<Self> {
        let key = normalize_role_key(key);
        Self::ALL.into_iter().find(|role| role.as_str() == key)
    }
}

/// Canonical form of a role identifier: trimmed, lowercased, inner
/// whitespace collapsed to `-`.
pub fn normalize_role_key(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
}

/// Identifier of a registered custom role. Only the role registry mints
/// these, so holding one means the name resolved at some point.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CustomRoleKey(String);

impl CustomRoleKey {
    pub(crate) fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A role as seen by authorization code.
///
/// `Unrecognized` carries an identifier that did not resolve through the
/// registry (deleted or never created). It is accepted as input so the
/// decision functions stay total, and is always treated as least
/// privilege.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoleRef {
    Builtin(BuiltinRole),
    Custom(CustomRoleKey),
    Unrecognized(String),
}

impl RoleRef {
    pub const ADMIN: RoleRef = RoleRef::Builtin(BuiltinRole::Admin);

    pub fn key(&self) -> &str {
        match self {
            RoleRef::Builtin(role) => role.as_str(),
            RoleRef::Custom(key) => key.as_str(),
            RoleRef::Unrecognized(raw) => raw.as_str(),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, RoleRef::Builtin(BuiltinRole::Admin))
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, RoleRef::Unrecognized(_))
    }
}

impl From<BuiltinRole> for RoleRef {
    fn from(role: BuiltinRole) -> Self {
        RoleRef::Builtin(role)
    }
}

impl fmt::Display for RoleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl Serialize for RoleRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

/// Administrator-defined role as persisted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CustomRole {
    pub id: Uuid,
    /// Canonical identifier, see [`normalize_role_key`].
    pub name: String,
    pub label: String,
    pub glyph: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// What the registry answers for any role, built-in or custom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RoleMetadata {
    pub id: String,
    pub label: String,
    pub glyph: String,
    pub is_custom: bool,
    pub created_by: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<BuiltinRole> for RoleMetadata {
    fn from(role: BuiltinRole) -> Self {
        RoleMetadata {
            id: role.as_str().to_string(),
            label: role.label().to_string(),
            glyph: role.glyph().to_string(),
            is_custom: false,
            created_by: None,
            created_at: None,
        }
    }
}

impl From<&CustomRole> for RoleMetadata {
    fn from(role: &CustomRole) -> Self {
        RoleMetadata {
            id: role.name.clone(),
            label: role.label.clone(),
            glyph: role.glyph.clone(),
            is_custom: true,
            created_by: Some(role.created_by),
            created_at: Some(role.created_at),
        }
    }
}
