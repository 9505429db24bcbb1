use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::Column;
use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Review,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Review => "review",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "To Do",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Review => "Review",
            TaskStatus::Completed => "Completed",
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, TaskStatus::Completed)
    }
}

impl FromStr for TaskStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "todo" => Ok(TaskStatus::Todo),
            "in-progress" => Ok(TaskStatus::InProgress),
            "review" => Ok(TaskStatus::Review),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(AppError::bad_request(format!("unknown task status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Option<Uuid>,
    pub title: String,
    pub status: TaskStatus,
    pub assigned_to: Option<Uuid>,
    #[schema(format = DateTime, example = "2025-10-10T10:00:00Z")]
    pub due_date: Option<DateTime<Utc>>,
    pub design_brief: Option<String>,
    pub inspiration: Option<String>,
    pub design: Option<String>,
    pub text_content: Option<String>,
    pub drive_link: Option<String>,
    pub notes: Option<String>,
    /// Bumped on every applied write; writers compare-and-set on it.
    pub version: i64,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn link(&self) -> String {
        format!("/tasks/{}", self.id)
    }

    pub fn column_value(&self, column: Column) -> Option<String> {
        match column {
            Column::DesignBrief => self.design_brief.clone(),
            Column::Inspiration => self.inspiration.clone(),
            Column::Design => self.design.clone(),
            Column::TextContent => self.text_content.clone(),
            Column::DriveLink => self.drive_link.clone(),
            Column::Notes => self.notes.clone(),
            Column::Status => Some(self.status.as_str().to_string()),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TaskCreateRequest {
    #[schema(example = "Spring campaign key visual")]
    pub title: String,
    pub project_id: Option<Uuid>,
    pub status: Option<TaskStatus>,
    pub assigned_to: Option<Uuid>,
    #[schema(format = DateTime, example = "2025-10-10T10:00:00Z")]
    pub due_date: Option<DateTime<Utc>>,
    pub design_brief: Option<String>,
    pub notes: Option<String>,
}

/// Partial update. Absent fields are left alone; `assigned_to: null`
/// unassigns; an empty string clears a text column.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub status: Option<TaskStatus>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<Uuid>)]
    pub assigned_to: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub design_brief: Option<String>,
    pub inspiration: Option<String>,
    pub design: Option<String>,
    pub text_content: Option<String>,
    pub drive_link: Option<String>,
    pub notes: Option<String>,
}

impl TaskPatch {
    /// Guarded columns this patch writes to.
    pub fn columns(&self) -> Vec<Column> {
        let mut columns = Vec::new();
        if self.design_brief.is_some() {
            columns.push(Column::DesignBrief);
        }
        if self.inspiration.is_some() {
            columns.push(Column::Inspiration);
        }
        if self.design.is_some() {
            columns.push(Column::Design);
        }
        if self.text_content.is_some() {
            columns.push(Column::TextContent);
        }
        if self.drive_link.is_some() {
            columns.push(Column::DriveLink);
        }
        if self.notes.is_some() {
            columns.push(Column::Notes);
        }
        if self.status.is_some() {
            columns.push(Column::Status);
        }
        columns
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.assigned_to.is_none()
            && self.due_date.is_none()
            && self.columns().is_empty()
    }

    /// The task as it would look with this patch applied. Version and
    /// timestamps are left to the caller.
    pub fn apply_to(&self, task: &Task) -> Result<Task, AppError> {
        let mut next = task.clone();
        if let Some(title) = &self.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(AppError::bad_request("title must not be empty"));
            }
            next.title = title.to_string();
        }
        if let Some(status) = self.status {
            next.status = status;
        }
        if let Some(assigned_to) = self.assigned_to {
            next.assigned_to = assigned_to;
        }
        if let Some(due_date) = self.due_date {
            next.due_date = due_date;
        }
        set_text(&mut next.design_brief, &self.design_brief);
        set_text(&mut next.inspiration, &self.inspiration);
        set_text(&mut next.design, &self.design);
        set_text(&mut next.text_content, &self.text_content);
        set_text(&mut next.drive_link, &self.drive_link);
        set_text(&mut next.notes, &self.notes);
        Ok(next)
    }
}

fn set_text(target: &mut Option<String>, value: &Option<String>) {
    if let Some(value) = value {
        *target = if value.is_empty() { None } else { Some(value.clone()) };
    }
}

// Distinguishes an explicit `null` from a missing key.
fn present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}
