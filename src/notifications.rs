use std::sync::Arc;

use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::notification::{Notification, NotificationKind, NotificationList};
use crate::store::NotificationStore;
use crate::utils::utc_now;

/// Creates durable notification records. Delivery (push, email) is up to
/// whoever reads them.
#[derive(Clone)]
pub struct NotificationDispatcher {
    store: Arc<dyn NotificationStore>,
}

impl NotificationDispatcher {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }

    pub async fn notify(
        &self,
        kind: NotificationKind,
        title: &str,
        message: &str,
        link: Option<&str>,
        recipient: Uuid,
    ) -> AppResult<Notification> {
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: recipient,
            kind,
            title: title.to_string(),
            message: message.to_string(),
            link: link.map(str::to_string),
            is_read: false,
            created_at: utc_now(),
        };
        self.store.insert_notification(&notification).await?;
        tracing::debug!(
            notification_id = %notification.id,
            recipient = %recipient,
            kind = kind.as_str(),
            "notification created"
        );
        Ok(notification)
    }

    /// Like [`notify`](Self::notify) but skips recipients that already hold a
    /// notification of this kind for `link`.
    pub async fn notify_once(
        &self,
        kind: NotificationKind,
        title: &str,
        message: &str,
        link: &str,
        recipient: Uuid,
    ) -> AppResult<Option<Notification>> {
        if self.store.notification_exists(recipient, kind, link).await? {
            return Ok(None);
        }
        self.notify(kind, title, message, Some(link), recipient).await.map(Some)
    }

    /// Only the recipient may mark a notification read.
    pub async fn mark_read(&self, notification_id: Uuid, actor: Uuid) -> AppResult<Notification> {
        let mut notification = self
            .store
            .find_notification(notification_id)
            .await?
            .ok_or_else(|| AppError::not_found("notification not found"))?;

        if notification.user_id != actor {
            tracing::info!(
                notification_id = %notification_id,
                actor = %actor,
                "refused to mark another user's notification read"
            );
            return Err(AppError::forbidden("notification belongs to another user"));
        }

        if !notification.is_read {
            self.store.mark_notification_read(notification_id).await?;
            notification.is_read = true;
        }
        Ok(notification)
    }

    pub async fn list_for(&self, user_id: Uuid, unread_only: bool) -> AppResult<NotificationList> {
        let items = self.store.list_notifications(user_id, unread_only).await?;
        let unread = if unread_only {
            items.len()
        } else {
            items.iter().filter(|n| !n.is_read).count()
        };
        Ok(NotificationList { unread, items })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn dispatcher() -> NotificationDispatcher {
        NotificationDispatcher::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn recipient_can_mark_read() {
        let dispatcher = dispatcher();
        let recipient = Uuid::new_v4();
        let created = dispatcher
            .notify(NotificationKind::Comment, "New comment", "Looks good", Some("/tasks/1"), recipient)
            .await
            .unwrap();

        let list = dispatcher.list_for(recipient, false).await.unwrap();
        assert_eq!(list.unread, 1);

        let read = dispatcher.mark_read(created.id, recipient).await.unwrap();
        assert!(read.is_read);
        assert_eq!(dispatcher.list_for(recipient, false).await.unwrap().unread, 0);
        assert!(dispatcher.list_for(recipient, true).await.unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn other_users_cannot_mark_read() {
        let dispatcher = dispatcher();
        let created = dispatcher
            .notify(NotificationKind::Assignment, "Assigned", "You have a task", None, Uuid::new_v4())
            .await
            .unwrap();

        let result = dispatcher.mark_read(created.id, Uuid::new_v4()).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn unknown_notification_is_not_found() {
        let result = dispatcher().mark_read(Uuid::new_v4(), Uuid::new_v4()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn notify_once_skips_existing_link() {
        let dispatcher = dispatcher();
        let recipient = Uuid::new_v4();
        let first = dispatcher
            .notify_once(NotificationKind::Deadline, "Due soon", "Soon", "/tasks/a", recipient)
            .await
            .unwrap();
        let second = dispatcher
            .notify_once(NotificationKind::Deadline, "Due soon", "Soon", "/tasks/a", recipient)
            .await
            .unwrap();
        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(dispatcher.list_for(recipient, false).await.unwrap().items.len(), 1);
    }
}
