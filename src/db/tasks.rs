use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::row_parsers::task_from_row;
use super::{conflict_on_unique, SqliteStore};
use crate::errors::AppResult;
use crate::models::task::Task;
use crate::store::TaskStore;
use crate::utils::timestamp;

const TASK_COLUMNS: &str = "id, project_id, title, status, assigned_to, due_date, design_brief, inspiration, design, \
     text_content, drive_link, notes, version, created_by, created_at, updated_at";

#[async_trait]
impl TaskStore for SqliteStore {
    async fn insert_task(&self, task: &Task) -> AppResult<()> {
        sqlx::query(&format!(
            "INSERT INTO tasks ({TASK_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(task.id.to_string())
        .bind(task.project_id.map(|id| id.to_string()))
        .bind(&task.title)
        .bind(task.status.as_str())
        .bind(task.assigned_to.map(|id| id.to_string()))
        .bind(task.due_date.map(timestamp))
        .bind(&task.design_brief)
        .bind(&task.inspiration)
        .bind(&task.design)
        .bind(&task.text_content)
        .bind(&task.drive_link)
        .bind(&task.notes)
        .bind(task.version)
        .bind(task.created_by.to_string())
        .bind(timestamp(task.created_at))
        .bind(timestamp(task.updated_at))
        .execute(&self.pool)
        .await
        .map_err(conflict_on_unique("task already exists"))?;
        Ok(())
    }

    async fn find_task(&self, id: Uuid) -> AppResult<Option<Task>> {
        let row = sqlx::query(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(task_from_row).transpose()
    }

    async fn replace_task(&self, task: &Task, expected_version: i64) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE tasks SET project_id = ?, title = ?, status = ?, assigned_to = ?, due_date = ?,
                design_brief = ?, inspiration = ?, design = ?, text_content = ?, drive_link = ?, notes = ?,
                version = ?, updated_at = ?
             WHERE id = ? AND version = ?",
        )
        .bind(task.project_id.map(|id| id.to_string()))
        .bind(&task.title)
        .bind(task.status.as_str())
        .bind(task.assigned_to.map(|id| id.to_string()))
        .bind(task.due_date.map(timestamp))
        .bind(&task.design_brief)
        .bind(&task.inspiration)
        .bind(&task.design)
        .bind(&task.text_content)
        .bind(&task.drive_link)
        .bind(&task.notes)
        .bind(task.version)
        .bind(timestamp(task.updated_at))
        .bind(task.id.to_string())
        .bind(expected_version)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_task(&self, id: Uuid) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM change_logs WHERE task_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn tasks_due_between(
        &self,
        assignee: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<Task>> {
        let rows = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE assigned_to = ? AND due_date IS NOT NULL AND due_date >= ? AND due_date <= ?
             ORDER BY due_date"
        ))
        .bind(assignee.to_string())
        .bind(timestamp(from))
        .bind(timestamp(to))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(task_from_row).collect()
    }
}
