use async_trait::async_trait;

use super::row_parsers::custom_role_from_row;
use super::SqliteStore;
use crate::authz::CustomRole;
use crate::errors::AppResult;
use crate::store::RoleStore;
use crate::utils::timestamp;

#[async_trait]
impl RoleStore for SqliteStore {
    async fn list_custom_roles(&self) -> AppResult<Vec<CustomRole>> {
        let rows = sqlx::query(
            "SELECT id, name, label, glyph, created_by, created_at FROM roles ORDER BY seq",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(custom_role_from_row).collect()
    }

    async fn insert_custom_role(&self, role: &CustomRole) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO roles (id, name, label, glyph, created_by, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(role.id.to_string())
        .bind(&role.name)
        .bind(&role.label)
        .bind(&role.glyph)
        .bind(role.created_by.to_string())
        .bind(timestamp(role.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
