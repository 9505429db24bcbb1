use async_trait::async_trait;
use uuid::Uuid;

use super::row_parsers::change_log_from_row;
use super::SqliteStore;
use crate::errors::AppResult;
use crate::models::change_log::ChangeLogEntry;
use crate::store::ChangeLogStore;
use crate::utils::timestamp;

#[async_trait]
impl ChangeLogStore for SqliteStore {
    async fn append_change(&self, entry: &ChangeLogEntry) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO change_logs (id, task_id, field_name, old_value, new_value, changed_by, changed_at, prev_hash, hash)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.id.to_string())
        .bind(entry.task_id.to_string())
        .bind(&entry.field_name)
        .bind(&entry.old_value)
        .bind(&entry.new_value)
        .bind(entry.changed_by.to_string())
        .bind(timestamp(entry.changed_at))
        .bind(&entry.prev_hash)
        .bind(&entry.hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_changes(&self, task_id: Uuid) -> AppResult<Vec<ChangeLogEntry>> {
        let rows = sqlx::query(
            "SELECT id, task_id, field_name, old_value, new_value, changed_by, changed_at, prev_hash, hash
             FROM change_logs WHERE task_id = ? ORDER BY seq",
        )
        .bind(task_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(change_log_from_row).collect()
    }

    async fn last_change_hash(&self, task_id: Uuid) -> AppResult<Option<String>> {
        let hash: Option<String> =
            sqlx::query_scalar("SELECT hash FROM change_logs WHERE task_id = ? ORDER BY seq DESC LIMIT 1")
                .bind(task_id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        Ok(hash)
    }
}
