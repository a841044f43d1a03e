//! 通知内存仓储

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{IdSequence, MemoryStore};
use crate::error::Result;
use crate::models::{NewNotification, Notification, NotificationStatus};
use crate::repository::traits::NotificationRepositoryTrait;

#[derive(Debug, Default)]
pub struct MemoryNotificationRepository {
    notifications: MemoryStore<i64, Notification>,
    seq: IdSequence,
}

impl MemoryNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationRepositoryTrait for MemoryNotificationRepository {
    async fn create(&self, notification: &NewNotification) -> Result<Notification> {
        let now = Utc::now();
        let created = Notification {
            id: self.seq.next(),
            stream_id: notification.stream_id,
            title: notification.title.clone(),
            message: notification.message.clone(),
            notification_type: notification.notification_type,
            status: NotificationStatus::Pending,
            scheduled_at: notification.scheduled_at,
            attempts: 0,
            sent_count: 0,
            failed_count: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        };
        self.notifications.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get(&self, id: i64) -> Result<Option<Notification>> {
        Ok(self.notifications.get(&id))
    }

    async fn list_by_stream(
        &self,
        stream_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>> {
        let mut notifications = self.notifications.list_by(|n| n.stream_id == stream_id);
        notifications.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(notifications
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_by_stream(&self, stream_id: i64) -> Result<i64> {
        Ok(self.notifications.count_by(|n| n.stream_id == stream_id) as i64)
    }

    async fn claim_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Notification>> {
        let mut candidates = self
            .notifications
            .list_by(|n| n.status == NotificationStatus::Pending && n.scheduled_at <= now);
        candidates.sort_by_key(|n| (n.scheduled_at, n.id));

        let mut claimed = Vec::new();
        for candidate in candidates {
            if claimed.len() as i64 >= limit {
                break;
            }
            let won = self.notifications.update_if(&candidate.id, |n| {
                if n.status != NotificationStatus::Pending {
                    return false;
                }
                n.status = NotificationStatus::Sending;
                n.attempts += 1;
                n.updated_at = now;
                true
            });
            if won == Some(true) {
                if let Some(notification) = self.notifications.get(&candidate.id) {
                    claimed.push(notification);
                }
            }
        }
        Ok(claimed)
    }

    async fn mark_sent(&self, id: i64, sent: i32, failed: i32) -> Result<()> {
        self.notifications.update(&id, |n| {
            n.status = NotificationStatus::Sent;
            n.sent_count = sent;
            n.failed_count = failed;
            n.updated_at = Utc::now();
        });
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: i64,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.notifications.update(&id, |n| {
            n.last_error = Some(error.to_string());
            match retry_at {
                Some(at) => {
                    n.status = NotificationStatus::Pending;
                    n.scheduled_at = at;
                }
                None => n.status = NotificationStatus::Failed,
            }
            n.updated_at = Utc::now();
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationType;
    use chrono::Duration;

    fn new_notification(scheduled_at: DateTime<Utc>) -> NewNotification {
        NewNotification {
            stream_id: 1,
            title: "Урок".to_string(),
            message: "Новый урок доступен".to_string(),
            notification_type: NotificationType::Info,
            scheduled_at,
        }
    }

    #[tokio::test]
    async fn test_claim_due_and_retry_cycle() {
        let repo = MemoryNotificationRepository::new();
        let now = Utc::now();
        let due = repo.create(&new_notification(now)).await.unwrap();
        repo.create(&new_notification(now + Duration::hours(1))).await.unwrap();

        let claimed = repo.claim_due(now, 10).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].status, NotificationStatus::Sending);
        assert_eq!(claimed[0].attempts, 1);
        assert!(repo.claim_due(now, 10).await.unwrap().is_empty());

        let retry_at = now + Duration::seconds(30);
        repo.mark_failed(due.id, "timeout", Some(retry_at)).await.unwrap();
        assert!(repo.claim_due(now, 10).await.unwrap().is_empty());

        let claimed = repo.claim_due(retry_at, 10).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].attempts, 2);

        repo.mark_sent(due.id, 5, 1).await.unwrap();
        let sent = repo.get(due.id).await.unwrap().unwrap();
        assert_eq!(sent.status, NotificationStatus::Sent);
        assert_eq!((sent.sent_count, sent.failed_count), (5, 1));
    }

    #[tokio::test]
    async fn test_mark_failed_without_retry_is_terminal() {
        let repo = MemoryNotificationRepository::new();
        let now = Utc::now();
        let n = repo.create(&new_notification(now)).await.unwrap();
        repo.claim_due(now, 1).await.unwrap();
        repo.mark_failed(n.id, "bot blocked", None).await.unwrap();

        let failed = repo.get(n.id).await.unwrap().unwrap();
        assert_eq!(failed.status, NotificationStatus::Failed);
        assert_eq!(failed.last_error.as_deref(), Some("bot blocked"));
        assert!(repo.claim_due(now + Duration::days(1), 10).await.unwrap().is_empty());
    }
}
