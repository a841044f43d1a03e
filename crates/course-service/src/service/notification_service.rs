//! 通知服务
//!
//! 作者向学习流学员广播消息；Worker 领取到期通知后调用 [`NotificationService::deliver`]
//! 逐个发送给已报名学员的 Telegram 私聊。

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use course_shared::observability::metrics;
use futures::stream::{self, StreamExt};
use tracing::{info, instrument, warn};

use crate::dto::{CreateNotificationRequest, PageResponse, PaginationParams, parse_optional_date};
use crate::error::Result;
use crate::models::{
    Lesson, NewNotification, Notification, NotificationStatus, NotificationType, Stream,
};
use crate::repository::{
    CourseRepositoryTrait, NotificationRepositoryTrait, StreamRepositoryTrait,
};
use crate::telegram::MessageSender;

use super::access::StreamAccess;

/// 单条通知并发发送数，Bot API 全局限速约 30 条/秒
const SEND_CONCURRENCY: usize = 8;
const RETRY_BASE_SECS: i64 = 30;
const RETRY_MAX_SECS: i64 = 3600;

/// 第 `attempt` 次尝试失败后的重试间隔：30s、60s、120s ... 上限 1 小时
pub fn retry_backoff(attempt: i32) -> Duration {
    let exp = attempt.saturating_sub(1).clamp(0, 16) as u32;
    Duration::seconds((RETRY_BASE_SECS << exp).min(RETRY_MAX_SECS))
}

/// 一次投递的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: i32,
    pub failed: i32,
    pub status: NotificationStatus,
}

pub struct NotificationService {
    notifications: Arc<dyn NotificationRepositoryTrait>,
    streams: Arc<dyn StreamRepositoryTrait>,
    sender: Arc<dyn MessageSender>,
    access: StreamAccess,
}

impl NotificationService {
    pub fn new(
        courses: Arc<dyn CourseRepositoryTrait>,
        streams: Arc<dyn StreamRepositoryTrait>,
        notifications: Arc<dyn NotificationRepositoryTrait>,
        sender: Arc<dyn MessageSender>,
    ) -> Self {
        Self {
            access: StreamAccess::new(courses, streams.clone()),
            notifications,
            streams,
            sender,
        }
    }

    #[instrument(skip(self, req))]
    pub async fn create(
        &self,
        user_id: i64,
        stream_id: i64,
        req: &CreateNotificationRequest,
        now: DateTime<Utc>,
    ) -> Result<Notification> {
        self.access.require_author(stream_id, user_id).await?;
        let scheduled_at =
            parse_optional_date("scheduledAt", req.scheduled_at.as_deref())?.unwrap_or(now);

        let notification = self
            .notifications
            .create(&NewNotification {
                stream_id,
                title: req.title.trim().to_string(),
                message: req.message.clone(),
                notification_type: req.notification_type,
                scheduled_at,
            })
            .await?;

        info!(notification_id = notification.id, stream_id, %scheduled_at, "Notification scheduled");
        Ok(notification)
    }

    pub async fn list(
        &self,
        user_id: i64,
        stream_id: i64,
        params: &PaginationParams,
    ) -> Result<PageResponse<Notification>> {
        self.access.require_author(stream_id, user_id).await?;
        let items = self
            .notifications
            .list_by_stream(stream_id, params.limit(), params.offset())
            .await?;
        let total = self.notifications.count_by_stream(stream_id).await?;
        Ok(PageResponse::new(items, total, params.page, params.limit()))
    }

    /// 课时开放时生成系统通知
    pub async fn enqueue_lesson_released(
        &self,
        stream: &Stream,
        lesson: &Lesson,
        now: DateTime<Utc>,
    ) -> Result<Notification> {
        self.notifications
            .create(&NewNotification {
                stream_id: stream.id,
                title: format!("新课时已开放：{}", lesson.title),
                message: format!("学习流「{}」的课时「{}」现在可以学习了。", stream.name, lesson.title),
                notification_type: NotificationType::LessonReleased,
                scheduled_at: now,
            })
            .await
    }

    /// 领取到期通知（状态改为 sending）
    pub async fn claim_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Notification>> {
        self.notifications.claim_due(now, limit).await
    }

    /// 向学习流全部学员投递一条已领取的通知
    ///
    /// 所有发送都因临时错误失败时按指数退避重新排期，达到 `max_attempts` 后标记为失败。
    /// 部分成功视为已发送，失败数记入 `failed_count`。
    #[instrument(skip(self, notification), fields(notification_id = notification.id))]
    pub async fn deliver(
        &self,
        notification: &Notification,
        max_attempts: i32,
        now: DateTime<Utc>,
    ) -> Result<DeliveryReport> {
        let recipients = self
            .streams
            .list_enrolled_user_ids(notification.stream_id)
            .await?;
        let html = notification.render_html();

        let results: Vec<_> = stream::iter(recipients)
            .map(|chat_id| {
                let sender = self.sender.clone();
                let html = html.as_str();
                async move { (chat_id, sender.send_message(chat_id, html).await) }
            })
            .buffer_unordered(SEND_CONCURRENCY)
            .collect()
            .await;

        let mut sent = 0;
        let mut failed = 0;
        let mut transient = 0;
        let mut last_error = None;
        for (chat_id, result) in results {
            match result {
                Ok(()) => sent += 1,
                Err(e) => {
                    failed += 1;
                    if e.is_retryable() {
                        transient += 1;
                    }
                    warn!(chat_id, error = %e, "Notification delivery to user failed");
                    last_error = Some(e.to_string());
                }
            }
        }

        let whole_batch_transient = sent == 0 && failed > 0 && transient == failed;
        let status = if whole_batch_transient {
            let error = last_error.unwrap_or_default();
            if notification.attempts >= max_attempts {
                self.notifications
                    .mark_failed(notification.id, &error, None)
                    .await?;
                warn!(attempts = notification.attempts, "Notification delivery gave up");
                NotificationStatus::Failed
            } else {
                let retry_at = now + retry_backoff(notification.attempts);
                self.notifications
                    .mark_failed(notification.id, &error, Some(retry_at))
                    .await?;
                info!(attempts = notification.attempts, %retry_at, "Notification delivery rescheduled");
                NotificationStatus::Pending
            }
        } else {
            self.notifications
                .mark_sent(notification.id, sent, failed)
                .await?;
            NotificationStatus::Sent
        };

        metrics::record_notification_delivery("sent", sent as u64);
        metrics::record_notification_delivery("failed", failed as u64);
        info!(sent, failed, status = ?status, "Notification delivered");

        Ok(DeliveryReport {
            sent,
            failed,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::models::{LessonType, NewCourse, NewStream};
    use crate::repository::memory::{
        MemoryCourseRepository, MemoryNotificationRepository, MemoryStreamRepository,
    };
    use crate::telegram::{MockMessageSender, SendError};

    const AUTHOR: i64 = 1;

    struct Fixture {
        service: NotificationService,
        streams: Arc<MemoryStreamRepository>,
        notifications: Arc<MemoryNotificationRepository>,
        stream: Stream,
    }

    async fn fixture(sender: MockMessageSender) -> Fixture {
        let courses = Arc::new(MemoryCourseRepository::new());
        let streams = Arc::new(MemoryStreamRepository::new());
        let notifications = Arc::new(MemoryNotificationRepository::new());
        let course = courses
            .create_course(&NewCourse {
                author_id: AUTHOR,
                title: "Rust".to_string(),
                description: None,
                cover_url: None,
                price: 0,
                currency: "RUB".to_string(),
            })
            .await
            .unwrap();
        let stream = streams
            .create_stream(&NewStream {
                course_id: course.id,
                name: "spring".to_string(),
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
        let service = NotificationService::new(
            courses,
            streams.clone(),
            notifications.clone(),
            Arc::new(sender),
        );
        Fixture {
            service,
            streams,
            notifications,
            stream,
        }
    }

    fn create_req(scheduled_at: Option<&str>) -> CreateNotificationRequest {
        CreateNotificationRequest {
            title: " Lesson <1> ".to_string(),
            message: "Starts & ends soon".to_string(),
            notification_type: NotificationType::Reminder,
            scheduled_at: scheduled_at.map(str::to_string),
        }
    }

    async fn claim_one(f: &Fixture) -> Notification {
        let mut claimed = f.service.claim_due(Utc::now(), 10).await.unwrap();
        assert_eq!(claimed.len(), 1);
        claimed.remove(0)
    }

    #[test]
    fn test_retry_backoff_grows_and_caps() {
        assert_eq!(retry_backoff(1), Duration::seconds(30));
        assert_eq!(retry_backoff(2), Duration::seconds(60));
        assert_eq!(retry_backoff(3), Duration::seconds(120));
        assert_eq!(retry_backoff(20), Duration::seconds(RETRY_MAX_SECS));
    }

    #[tokio::test]
    async fn test_create_requires_author() {
        let f = fixture(MockMessageSender::new()).await;
        let err = f
            .service
            .create(99, f.stream.id, &create_req(None), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));

        let created = f
            .service
            .create(AUTHOR, f.stream.id, &create_req(None), Utc::now())
            .await
            .unwrap();
        assert_eq!(created.title, "Lesson <1>");
        assert_eq!(created.status, NotificationStatus::Pending);

        let page = f
            .service
            .list(AUTHOR, f.stream.id, &PaginationParams { page: 1, page_size: 10 })
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_deliver_counts_partial_failures() {
        let mut sender = MockMessageSender::new();
        sender
            .expect_send_message()
            .times(3)
            .returning(|chat_id, html| {
                assert!(html.contains("<b>Lesson &lt;1&gt;</b>"));
                if chat_id == 12 {
                    Err(SendError::Rejected("bot was blocked by the user".to_string()))
                } else {
                    Ok(())
                }
            });
        let f = fixture(sender).await;
        for user in [11, 12, 13] {
            f.streams.enroll(f.stream.id, user, None).await.unwrap();
        }
        f.service
            .create(AUTHOR, f.stream.id, &create_req(None), Utc::now())
            .await
            .unwrap();

        let notification = claim_one(&f).await;
        let report = f.service.deliver(&notification, 5, Utc::now()).await.unwrap();
        assert_eq!(
            report,
            DeliveryReport {
                sent: 2,
                failed: 1,
                status: NotificationStatus::Sent
            }
        );

        let stored = f.notifications.get(notification.id).await.unwrap().unwrap();
        assert_eq!(stored.status, NotificationStatus::Sent);
        assert_eq!(stored.sent_count, 2);
        assert_eq!(stored.failed_count, 1);
    }

    #[tokio::test]
    async fn test_deliver_retries_then_fails() {
        let mut sender = MockMessageSender::new();
        sender
            .expect_send_message()
            .returning(|_, _| Err(SendError::Transient("429 Too Many Requests".to_string())));
        let f = fixture(sender).await;
        f.streams.enroll(f.stream.id, 11, None).await.unwrap();
        f.service
            .create(AUTHOR, f.stream.id, &create_req(None), Utc::now())
            .await
            .unwrap();

        let first = claim_one(&f).await;
        let now = Utc::now();
        let report = f.service.deliver(&first, 2, now).await.unwrap();
        assert_eq!(report.status, NotificationStatus::Pending);

        let stored = f.notifications.get(first.id).await.unwrap().unwrap();
        assert_eq!(stored.status, NotificationStatus::Pending);
        assert_eq!(stored.scheduled_at, now + retry_backoff(1));
        assert!(stored.last_error.is_some());

        let second = f
            .service
            .claim_due(now + Duration::minutes(5), 10)
            .await
            .unwrap()
            .remove(0);
        assert_eq!(second.attempts, 2);
        let report = f.service.deliver(&second, 2, now).await.unwrap();
        assert_eq!(report.status, NotificationStatus::Failed);

        let stored = f.notifications.get(first.id).await.unwrap().unwrap();
        assert_eq!(stored.status, NotificationStatus::Failed);
    }

    #[tokio::test]
    async fn test_enqueue_lesson_released() {
        let f = fixture(MockMessageSender::new()).await;
        let now = Utc::now();
        let lesson = Lesson {
            id: 7,
            course_id: 1,
            block_id: 1,
            title: "Ownership".to_string(),
            content: None,
            video_url: None,
            duration_minutes: None,
            lesson_type: LessonType::Text,
            position: 0,
            created_at: now,
            updated_at: now,
        };
        let notification = f
            .service
            .enqueue_lesson_released(&f.stream, &lesson, now)
            .await
            .unwrap();
        assert_eq!(notification.notification_type, NotificationType::LessonReleased);
        assert!(notification.title.contains("Ownership"));
        assert_eq!(notification.scheduled_at, now);
    }
}
