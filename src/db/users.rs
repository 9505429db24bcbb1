use async_trait::async_trait;
use uuid::Uuid;

use super::row_parsers::{client_from_row, db_client_user_from_row, db_user_from_row};
use super::{conflict_on_unique, SqliteStore};
use crate::errors::{AppError, AppResult};
use crate::models::user::{Client, DbClientUser, DbUser};
use crate::store::UserStore;
use crate::utils::timestamp;

const USER_COLUMNS: &str = "id, name, email, password_hash, role, status, avatar_url, department, \
     approved_by, approved_at, created_at, updated_at";
const CLIENT_USER_COLUMNS: &str = "id, client_id, name, email, password_hash, status, created_at, updated_at";

#[async_trait]
impl UserStore for SqliteStore {
    async fn insert_user(&self, user: &DbUser) -> AppResult<()> {
        sqlx::query(&format!(
            "INSERT INTO users ({USER_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(user.id.to_string())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.role)
        .bind(user.status.as_str())
        .bind(&user.avatar_url)
        .bind(&user.department)
        .bind(user.approved_by.map(|id| id.to_string()))
        .bind(user.approved_at.map(timestamp))
        .bind(timestamp(user.created_at))
        .bind(timestamp(user.updated_at))
        .execute(&self.pool)
        .await
        .map_err(conflict_on_unique("email already in use"))?;
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<DbUser>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(db_user_from_row).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<DbUser>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(db_user_from_row).transpose()
    }

    async fn list_users(&self) -> AppResult<Vec<DbUser>> {
        let rows = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at"))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(db_user_from_row).collect()
    }

    async fn save_user(&self, user: &DbUser) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE users SET name = ?, email = ?, password_hash = ?, role = ?, status = ?, avatar_url = ?,
                department = ?, approved_by = ?, approved_at = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.role)
        .bind(user.status.as_str())
        .bind(&user.avatar_url)
        .bind(&user.department)
        .bind(user.approved_by.map(|id| id.to_string()))
        .bind(user.approved_at.map(timestamp))
        .bind(timestamp(user.updated_at))
        .bind(user.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(conflict_on_unique("email already in use"))?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("user not found"));
        }
        Ok(())
    }

    async fn insert_client(&self, client: &Client) -> AppResult<()> {
        sqlx::query("INSERT INTO clients (id, name, created_at) VALUES (?, ?, ?)")
            .bind(client.id.to_string())
            .bind(&client.name)
            .bind(timestamp(client.created_at))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_client(&self, id: Uuid) -> AppResult<Option<Client>> {
        let row = sqlx::query("SELECT id, name, created_at FROM clients WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(client_from_row).transpose()
    }

    async fn insert_client_user(&self, user: &DbClientUser) -> AppResult<()> {
        sqlx::query(&format!(
            "INSERT INTO client_users ({CLIENT_USER_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(user.id.to_string())
        .bind(user.client_id.to_string())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.status.as_str())
        .bind(timestamp(user.created_at))
        .bind(timestamp(user.updated_at))
        .execute(&self.pool)
        .await
        .map_err(conflict_on_unique("email already in use"))?;
        Ok(())
    }

    async fn find_client_user(&self, id: Uuid) -> AppResult<Option<DbClientUser>> {
        let row = sqlx::query(&format!("SELECT {CLIENT_USER_COLUMNS} FROM client_users WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(db_client_user_from_row).transpose()
    }

    async fn find_client_user_by_email(&self, email: &str) -> AppResult<Option<DbClientUser>> {
        let row = sqlx::query(&format!("SELECT {CLIENT_USER_COLUMNS} FROM client_users WHERE email = ?"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(db_client_user_from_row).transpose()
    }

    async fn save_client_user(&self, user: &DbClientUser) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE client_users SET name = ?, email = ?, password_hash = ?, status = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.status.as_str())
        .bind(timestamp(user.updated_at))
        .bind(user.id.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("client user not found"));
        }
        Ok(())
    }
}
