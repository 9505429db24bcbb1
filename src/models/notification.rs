use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    Assignment,
    StatusUpdate,
    Deadline,
    Comment,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Assignment => "assignment",
            NotificationKind::StatusUpdate => "status-update",
            NotificationKind::Deadline => "deadline",
            NotificationKind::Comment => "comment",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "assignment" => Ok(NotificationKind::Assignment),
            "status-update" => Ok(NotificationKind::StatusUpdate),
            "deadline" => Ok(NotificationKind::Deadline),
            "comment" => Ok(NotificationKind::Comment),
            other => Err(AppError::internal(format!("invalid notification kind: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationList {
    pub unread: usize,
    pub items: Vec<Notification>,
}
