use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Decode, Row, Sqlite, Type};
use uuid::Uuid;

use crate::authz::{ActionPermission, ColumnRule, CustomRole, PermissionsConfig};
use crate::errors::AppError;
use crate::models::change_log::ChangeLogEntry;
use crate::models::notification::Notification;
use crate::models::task::Task;
use crate::models::user::{Client, DbClientUser, DbUser};

pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, AppError> {
    let s = s.trim();

    // Try RFC3339 first (e.g. 2025-11-19T12:34:56.000000Z)
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // SQLite default timestamp format: "YYYY-MM-DD HH:MM:SS" (with optional fractional seconds)
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    if let Ok(naive_date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let ndt = naive_date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| AppError::internal("invalid datetime: date out of range".to_string()))?;
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    Err(AppError::internal(format!("invalid datetime: {}", s)))
}

fn parse_opt_datetime(s: Option<String>) -> Result<Option<DateTime<Utc>>, AppError> {
    match s {
        Some(s) if !s.trim().is_empty() => Ok(Some(parse_datetime(&s)?)),
        _ => Ok(None),
    }
}

fn parse_uuid(s: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(s).map_err(|e| AppError::internal(format!("invalid uuid: {}", e)))
}

fn parse_opt_uuid(s: Option<String>) -> Result<Option<Uuid>, AppError> {
    s.as_deref().map(parse_uuid).transpose()
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, AppError>
where
    T: Decode<'r, Sqlite> + Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|e| AppError::internal(format!("missing {}: {}", name, e)))
}

pub fn db_user_from_row(row: &SqliteRow) -> Result<DbUser, AppError> {
    let id: String = column(row, "id")?;
    let status: String = column(row, "status")?;
    let approved_by: Option<String> = column(row, "approved_by")?;
    let approved_at: Option<String> = column(row, "approved_at")?;
    let created_at: String = column(row, "created_at")?;
    let updated_at: String = column(row, "updated_at")?;

    Ok(DbUser {
        id: parse_uuid(&id)?,
        name: column(row, "name")?,
        email: column(row, "email")?,
        password_hash: column(row, "password_hash")?,
        role: column(row, "role")?,
        status: status.parse()?,
        avatar_url: column(row, "avatar_url")?,
        department: column(row, "department")?,
        approved_by: parse_opt_uuid(approved_by)?,
        approved_at: parse_opt_datetime(approved_at)?,
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

pub fn client_from_row(row: &SqliteRow) -> Result<Client, AppError> {
    let id: String = column(row, "id")?;
    let created_at: String = column(row, "created_at")?;

    Ok(Client {
        id: parse_uuid(&id)?,
        name: column(row, "name")?,
        created_at: parse_datetime(&created_at)?,
    })
}

pub fn db_client_user_from_row(row: &SqliteRow) -> Result<DbClientUser, AppError> {
    let id: String = column(row, "id")?;
    let client_id: String = column(row, "client_id")?;
    let status: String = column(row, "status")?;
    let created_at: String = column(row, "created_at")?;
    let updated_at: String = column(row, "updated_at")?;

    Ok(DbClientUser {
        id: parse_uuid(&id)?,
        client_id: parse_uuid(&client_id)?,
        name: column(row, "name")?,
        email: column(row, "email")?,
        password_hash: column(row, "password_hash")?,
        status: status.parse()?,
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

pub fn custom_role_from_row(row: &SqliteRow) -> Result<CustomRole, AppError> {
    let id: String = column(row, "id")?;
    let created_by: String = column(row, "created_by")?;
    let created_at: String = column(row, "created_at")?;

    Ok(CustomRole {
        id: parse_uuid(&id)?,
        name: column(row, "name")?,
        label: column(row, "label")?,
        glyph: column(row, "glyph")?,
        created_by: parse_uuid(&created_by)?,
        created_at: parse_datetime(&created_at)?,
    })
}

/// Config header only; rules are attached by the caller.
pub fn permissions_config_from_row(row: &SqliteRow) -> Result<PermissionsConfig, AppError> {
    let id: String = column(row, "id")?;
    let is_active: i64 = column(row, "is_active")?;
    let created_by: Option<String> = column(row, "created_by")?;
    let created_at: String = column(row, "created_at")?;
    let updated_at: String = column(row, "updated_at")?;

    Ok(PermissionsConfig {
        id: parse_uuid(&id)?,
        name: column(row, "name")?,
        is_active: is_active != 0,
        rules: Vec::new(),
        created_by: parse_opt_uuid(created_by)?,
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

pub fn column_rule_from_row(row: &SqliteRow) -> Result<ColumnRule, AppError> {
    let column_name: String = column(row, "column_name")?;
    let can_edit: i64 = column(row, "can_edit")?;

    Ok(ColumnRule {
        role: column(row, "role")?,
        column: column_name
            .parse()
            .map_err(|_| AppError::internal(format!("invalid column: {}", column_name)))?,
        can_edit: can_edit != 0,
    })
}

pub fn action_permission_from_row(row: &SqliteRow) -> Result<ActionPermission, AppError> {
    let resource: String = column(row, "resource")?;
    let action: String = column(row, "action")?;
    let can_perform: i64 = column(row, "can_perform")?;
    let updated_at: String = column(row, "updated_at")?;

    Ok(ActionPermission {
        role: column(row, "role")?,
        resource: resource
            .parse()
            .map_err(|_| AppError::internal(format!("invalid resource: {}", resource)))?,
        action: action
            .parse()
            .map_err(|_| AppError::internal(format!("invalid action: {}", action)))?,
        can_perform: can_perform != 0,
        updated_at: parse_datetime(&updated_at)?,
    })
}

pub fn task_from_row(row: &SqliteRow) -> Result<Task, AppError> {
    let id: String = column(row, "id")?;
    let project_id: Option<String> = column(row, "project_id")?;
    let status: String = column(row, "status")?;
    let assigned_to: Option<String> = column(row, "assigned_to")?;
    let due_date: Option<String> = column(row, "due_date")?;
    let created_by: String = column(row, "created_by")?;
    let created_at: String = column(row, "created_at")?;
    let updated_at: String = column(row, "updated_at")?;

    Ok(Task {
        id: parse_uuid(&id)?,
        project_id: parse_opt_uuid(project_id)?,
        title: column(row, "title")?,
        status: status
            .parse()
            .map_err(|_| AppError::internal(format!("invalid task status: {}", status)))?,
        assigned_to: parse_opt_uuid(assigned_to)?,
        due_date: parse_opt_datetime(due_date)?,
        design_brief: column(row, "design_brief")?,
        inspiration: column(row, "inspiration")?,
        design: column(row, "design")?,
        text_content: column(row, "text_content")?,
        drive_link: column(row, "drive_link")?,
        notes: column(row, "notes")?,
        version: column(row, "version")?,
        created_by: parse_uuid(&created_by)?,
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

pub fn change_log_from_row(row: &SqliteRow) -> Result<ChangeLogEntry, AppError> {
    let id: String = column(row, "id")?;
    let task_id: String = column(row, "task_id")?;
    let changed_by: String = column(row, "changed_by")?;
    let changed_at: String = column(row, "changed_at")?;

    Ok(ChangeLogEntry {
        id: parse_uuid(&id)?,
        task_id: parse_uuid(&task_id)?,
        field_name: column(row, "field_name")?,
        old_value: column(row, "old_value")?,
        new_value: column(row, "new_value")?,
        changed_by: parse_uuid(&changed_by)?,
        changed_at: parse_datetime(&changed_at)?,
        prev_hash: column(row, "prev_hash")?,
        hash: column(row, "hash")?,
    })
}

pub fn notification_from_row(row: &SqliteRow) -> Result<Notification, AppError> {
    let id: String = column(row, "id")?;
    let user_id: String = column(row, "user_id")?;
    let kind: String = column(row, "kind")?;
    let is_read: i64 = column(row, "is_read")?;
    let created_at: String = column(row, "created_at")?;

    Ok(Notification {
        id: parse_uuid(&id)?,
        user_id: parse_uuid(&user_id)?,
        kind: kind.parse()?,
        title: column(row, "title")?,
        message: column(row, "message")?,
        link: column(row, "link")?,
        is_read: is_read != 0,
        created_at: parse_datetime(&created_at)?,
    })
}
