use async_trait::async_trait;
use uuid::Uuid;

use super::row_parsers::notification_from_row;
use super::SqliteStore;
use crate::errors::{AppError, AppResult};
use crate::models::notification::{Notification, NotificationKind};
use crate::store::NotificationStore;
use crate::utils::timestamp;

const NOTIFICATION_COLUMNS: &str = "id, user_id, kind, title, message, link, is_read, created_at";

#[async_trait]
impl NotificationStore for SqliteStore {
    async fn insert_notification(&self, notification: &Notification) -> AppResult<()> {
        sqlx::query(&format!(
            "INSERT INTO notifications ({NOTIFICATION_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(notification.id.to_string())
        .bind(notification.user_id.to_string())
        .bind(notification.kind.as_str())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.link)
        .bind(notification.is_read)
        .bind(timestamp(notification.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_notification(&self, id: Uuid) -> AppResult<Option<Notification>> {
        let row = sqlx::query(&format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(notification_from_row).transpose()
    }

    async fn mark_notification_read(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("notification not found"));
        }
        Ok(())
    }

    async fn list_notifications(&self, user_id: Uuid, unread_only: bool) -> AppResult<Vec<Notification>> {
        let filter = if unread_only { " AND is_read = 0" } else { "" };
        let rows = sqlx::query(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE user_id = ?{filter} ORDER BY seq DESC"
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(notification_from_row).collect()
    }

    async fn notification_exists(&self, user_id: Uuid, kind: NotificationKind, link: &str) -> AppResult<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM notifications WHERE user_id = ? AND kind = ? AND link = ? LIMIT 1")
                .bind(user_id.to_string())
                .bind(kind.as_str())
                .bind(link)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }
}
