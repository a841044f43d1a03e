//! 学习流仓储（PostgreSQL）
//!
//! 包含学习流、报名记录与课时排期

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::Result;
use crate::models::{Enrollment, LessonSchedule, NewStream, Stream, StreamChanges, StreamStatus};
use crate::repository::traits::StreamRepositoryTrait;

pub struct StreamRepository {
    pool: PgPool,
}

impl StreamRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StreamRepositoryTrait for StreamRepository {
    async fn create_stream(&self, stream: &NewStream) -> Result<Stream> {
        let created = sqlx::query_as::<_, Stream>(
            r#"
            INSERT INTO streams
                (course_id, name, start_date, end_date, price, currency, max_students,
                 notify_on_release, timezone)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(stream.course_id)
        .bind(&stream.name)
        .bind(stream.start_date)
        .bind(stream.end_date)
        .bind(stream.price)
        .bind(&stream.currency)
        .bind(stream.max_students)
        .bind(stream.notify_on_release)
        .bind(&stream.timezone)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn get_stream(&self, id: i64) -> Result<Option<Stream>> {
        let stream = sqlx::query_as::<_, Stream>("SELECT * FROM streams WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(stream)
    }

    async fn list_streams_by_course(&self, course_id: i64) -> Result<Vec<Stream>> {
        let streams = sqlx::query_as::<_, Stream>(
            "SELECT * FROM streams WHERE course_id = $1 ORDER BY start_date, id",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(streams)
    }

    async fn count_streams_by_course(&self, course_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM streams WHERE course_id = $1")
            .bind(course_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn update_stream(&self, id: i64, changes: &StreamChanges) -> Result<Option<Stream>> {
        let stream = sqlx::query_as::<_, Stream>(
            r#"
            UPDATE streams SET
                name = COALESCE($2, name),
                start_date = COALESCE($3, start_date),
                end_date = COALESCE($4, end_date),
                price = COALESCE($5, price),
                currency = COALESCE($6, currency),
                max_students = COALESCE($7, max_students),
                notify_on_release = COALESCE($8, notify_on_release),
                timezone = COALESCE($9, timezone),
                status = COALESCE($10, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&changes.name)
        .bind(changes.start_date)
        .bind(changes.end_date)
        .bind(changes.price)
        .bind(&changes.currency)
        .bind(changes.max_students)
        .bind(changes.notify_on_release)
        .bind(&changes.timezone)
        .bind(changes.status)
        .fetch_optional(&self.pool)
        .await?;

        Ok(stream)
    }

    async fn transition_status(
        &self,
        id: i64,
        from: StreamStatus,
        to: StreamStatus,
    ) -> Result<Option<Stream>> {
        let stream = sqlx::query_as::<_, Stream>(
            r#"
            UPDATE streams SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(&self.pool)
        .await?;

        Ok(stream)
    }

    async fn enroll(
        &self,
        stream_id: i64,
        user_id: i64,
        payment_id: Option<i64>,
    ) -> Result<Enrollment> {
        let inserted = sqlx::query_as::<_, Enrollment>(
            r#"
            INSERT INTO enrollments (stream_id, user_id, payment_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (stream_id, user_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(stream_id)
        .bind(user_id)
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(enrollment) = inserted {
            return Ok(enrollment);
        }

        let existing = sqlx::query_as::<_, Enrollment>(
            "SELECT * FROM enrollments WHERE stream_id = $1 AND user_id = $2",
        )
        .bind(stream_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(existing)
    }

    async fn remove_enrollment(&self, stream_id: i64, user_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM enrollments WHERE stream_id = $1 AND user_id = $2")
            .bind(stream_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn is_enrolled(&self, stream_id: i64, user_id: i64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM enrollments WHERE stream_id = $1 AND user_id = $2)",
        )
        .bind(stream_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn list_enrolled_user_ids(&self, stream_id: i64) -> Result<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT user_id FROM enrollments WHERE stream_id = $1 ORDER BY user_id",
        )
        .bind(stream_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn count_enrollments(&self, stream_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM enrollments WHERE stream_id = $1")
            .bind(stream_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn upsert_schedule(
        &self,
        stream_id: i64,
        lesson_id: i64,
        release_at: DateTime<Utc>,
    ) -> Result<LessonSchedule> {
        let schedule = sqlx::query_as::<_, LessonSchedule>(
            r#"
            INSERT INTO lesson_schedules (stream_id, lesson_id, release_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (stream_id, lesson_id) DO UPDATE SET
                release_at = EXCLUDED.release_at,
                released_at = CASE
                    WHEN lesson_schedules.release_at = EXCLUDED.release_at
                        THEN lesson_schedules.released_at
                    ELSE NULL
                END
            RETURNING *
            "#,
        )
        .bind(stream_id)
        .bind(lesson_id)
        .bind(release_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(schedule)
    }

    async fn list_schedules(&self, stream_id: i64) -> Result<Vec<LessonSchedule>> {
        let schedules = sqlx::query_as::<_, LessonSchedule>(
            "SELECT * FROM lesson_schedules WHERE stream_id = $1 ORDER BY release_at, lesson_id",
        )
        .bind(stream_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(schedules)
    }

    async fn delete_schedule(&self, stream_id: i64, lesson_id: i64) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM lesson_schedules WHERE stream_id = $1 AND lesson_id = $2")
                .bind(stream_id)
                .bind(lesson_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 使用 `FOR UPDATE SKIP LOCKED` 领取，多实例部署时同一排期只会被一个实例处理
    async fn claim_due_releases(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<LessonSchedule>> {
        let claimed = sqlx::query_as::<_, LessonSchedule>(
            r#"
            UPDATE lesson_schedules s
            SET released_at = $1
            FROM (
                SELECT stream_id, lesson_id
                FROM lesson_schedules
                WHERE released_at IS NULL AND release_at <= $1
                ORDER BY release_at
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            ) due
            WHERE s.stream_id = due.stream_id AND s.lesson_id = due.lesson_id
            RETURNING s.*
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(claimed)
    }
}
