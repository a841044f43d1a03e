//! 通知仓储（PostgreSQL）

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::Result;
use crate::models::{NewNotification, Notification};
use crate::repository::traits::NotificationRepositoryTrait;

pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepositoryTrait for NotificationRepository {
    async fn create(&self, notification: &NewNotification) -> Result<Notification> {
        let created = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (stream_id, title, message, notification_type, scheduled_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(notification.stream_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.notification_type)
        .bind(notification.scheduled_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn get(&self, id: i64) -> Result<Option<Notification>> {
        let notification =
            sqlx::query_as::<_, Notification>("SELECT * FROM notifications WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(notification)
    }

    async fn list_by_stream(
        &self,
        stream_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE stream_id = $1
            ORDER BY id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(stream_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    async fn count_by_stream(&self, stream_id: i64) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE stream_id = $1")
                .bind(stream_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// 使用 `FOR UPDATE SKIP LOCKED` 领取，多实例部署时不会重复发送
    async fn claim_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Notification>> {
        let claimed = sqlx::query_as::<_, Notification>(
            r#"
            UPDATE notifications n
            SET status = 'sending', attempts = n.attempts + 1, updated_at = $1
            FROM (
                SELECT id
                FROM notifications
                WHERE status = 'pending' AND scheduled_at <= $1
                ORDER BY scheduled_at, id
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            ) due
            WHERE n.id = due.id
            RETURNING n.*
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(claimed)
    }

    async fn mark_sent(&self, id: i64, sent: i32, failed: i32) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE notifications
            SET status = 'sent', sent_count = $2, failed_count = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(sent)
        .bind(failed)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_failed(
        &self,
        id: i64,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE notifications SET
                status = CASE WHEN $3::TIMESTAMPTZ IS NULL THEN 'failed' ELSE 'pending' END,
                scheduled_at = COALESCE($3, scheduled_at),
                last_error = $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(retry_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
