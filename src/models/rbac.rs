use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::{Action, Column, ColumnRule, Resource};

// =============================================================================
// ROLE
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct RoleCreateRequest {
    #[schema(example = "video-editor")]
    pub name: String,
    #[schema(example = "Video Editor")]
    pub label: Option<String>,
    #[schema(example = "🎬")]
    pub glyph: Option<String>,
}

// =============================================================================
// COLUMN PERMISSION
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct ColumnPermissionRequest {
    #[schema(example = "designer")]
    pub role: String,
    pub column: Column,
    pub can_edit: bool,
}

// =============================================================================
// ACTION PERMISSION
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct ActionPermissionRequest {
    #[schema(example = "social-media")]
    pub role: String,
    pub resource: Resource,
    pub action: Action,
    pub can_perform: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ActionGrant {
    pub role: String,
    pub resource: Resource,
    pub action: Action,
    pub can_perform: bool,
}

// =============================================================================
// PERMISSION CONFIG (named presets)
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfigCreateRequest {
    #[schema(example = "launch-week")]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PermissionsConfigSummary {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub rule_count: usize,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// POLICY VIEWS (computed)
// =============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct PolicyView {
    pub config_id: Option<Uuid>,
    pub config_name: Option<String>,
    pub columns: Vec<ColumnRule>,
    pub actions: Vec<ActionGrant>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EffectivePermissions {
    pub user_id: Uuid,
    pub role: String,
    pub actions: Vec<ResourceActions>,
    pub editable_columns: Vec<Column>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResourceActions {
    pub resource: Resource,
    pub actions: Vec<Action>,
}
