//! 通知投递 Worker
//!
//! 定期领取到期的通知并投递给学习流学员。
//! 领取时状态改为 sending，同一条通知不会被多个实例重复投递。

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use course_shared::config::WorkersConfig;
use course_shared::observability::metrics;
use tracing::{error, info};

use crate::error::Result;
use crate::service::NotificationService;

pub struct NotificationWorker {
    notifications: Arc<NotificationService>,
    poll_interval: Duration,
    batch_size: i64,
    max_attempts: i32,
}

impl NotificationWorker {
    pub fn new(notifications: Arc<NotificationService>, config: &WorkersConfig) -> Self {
        Self {
            notifications,
            poll_interval: Duration::from_secs(config.notification_poll_secs),
            batch_size: config.notification_batch_size,
            max_attempts: config.notification_max_attempts,
        }
    }

    pub async fn run(&self) {
        info!(
            poll_interval = ?self.poll_interval,
            batch_size = self.batch_size,
            max_attempts = self.max_attempts,
            "NotificationWorker 已启动"
        );

        loop {
            if let Err(e) = self.run_once(Utc::now()).await {
                error!(error = %e, "通知投递出错");
            }
            metrics::set_worker_last_run("notification_worker");
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// 处理一轮，返回处理的通知数
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<usize> {
        let claimed = self.notifications.claim_due(now, self.batch_size).await?;
        let count = claimed.len();

        for notification in claimed {
            if let Err(e) = self
                .notifications
                .deliver(&notification, self.max_attempts, now)
                .await
            {
                error!(notification_id = notification.id, error = %e, "通知投递失败");
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::CreateNotificationRequest;
    use crate::models::{NewCourse, NewStream, NotificationType};
    use crate::repository::Repositories;
    use crate::telegram::MockMessageSender;

    #[tokio::test]
    async fn test_run_once_delivers_due_notifications() {
        let repos = Repositories::memory();
        let course = repos
            .courses
            .create_course(&NewCourse {
                author_id: 1,
                title: "Rust".to_string(),
                description: None,
                cover_url: None,
                price: 0,
                currency: "RUB".to_string(),
            })
            .await
            .unwrap();
        let stream = repos
            .streams
            .create_stream(&NewStream {
                course_id: course.id,
                name: "s".to_string(),
                start_date: Utc::now(),
                end_date: None,
                price: 0,
                currency: "RUB".to_string(),
                max_students: None,
                notify_on_release: true,
                timezone: None,
            })
            .await
            .unwrap();
        repos.streams.enroll(stream.id, 7, None).await.unwrap();

        let mut sender = MockMessageSender::new();
        sender
            .expect_send_message()
            .withf(|chat_id, _| *chat_id == 7)
            .times(1)
            .returning(|_, _| Ok(()));
        let service = Arc::new(NotificationService::new(
            repos.courses.clone(),
            repos.streams.clone(),
            repos.notifications.clone(),
            Arc::new(sender),
        ));
        let now = Utc::now();
        service
            .create(
                1,
                stream.id,
                &CreateNotificationRequest {
                    title: "Hi".to_string(),
                    message: "Welcome".to_string(),
                    notification_type: NotificationType::Announcement,
                    scheduled_at: None,
                },
                now,
            )
            .await
            .unwrap();

        let worker = NotificationWorker::new(service, &WorkersConfig::default());
        assert_eq!(worker.run_once(now).await.unwrap(), 1);
        assert_eq!(worker.run_once(now).await.unwrap(), 0);
    }
}
