//! 课程内容仓储（PostgreSQL）

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::{ApiError, Result};
use crate::models::{
    BlockChanges, Course, CourseBlock, CourseChanges, CourseOutline, Lesson, LessonChanges,
    NewBlock, NewCourse, NewLesson,
};
use crate::repository::traits::CourseRepositoryTrait;

pub struct CourseRepository {
    pool: PgPool,
}

impl CourseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CourseRepositoryTrait for CourseRepository {
    async fn create_course(&self, course: &NewCourse) -> Result<Course> {
        let created = sqlx::query_as::<_, Course>(
            r#"
            INSERT INTO courses (author_id, title, description, cover_url, price, currency)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(course.author_id)
        .bind(&course.title)
        .bind(&course.description)
        .bind(&course.cover_url)
        .bind(course.price)
        .bind(&course.currency)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn get_course(&self, id: i64) -> Result<Option<Course>> {
        let course = sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(course)
    }

    async fn list_courses_by_author(
        &self,
        author_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Course>> {
        let courses = sqlx::query_as::<_, Course>(
            r#"
            SELECT * FROM courses
            WHERE author_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(author_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(courses)
    }

    async fn count_courses_by_author(&self, author_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM courses WHERE author_id = $1")
            .bind(author_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn update_course(&self, id: i64, changes: &CourseChanges) -> Result<Option<Course>> {
        let course = sqlx::query_as::<_, Course>(
            r#"
            UPDATE courses SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                cover_url = COALESCE($4, cover_url),
                price = COALESCE($5, price),
                currency = COALESCE($6, currency),
                status = COALESCE($7, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&changes.title)
        .bind(&changes.description)
        .bind(&changes.cover_url)
        .bind(changes.price)
        .bind(&changes.currency)
        .bind(changes.status)
        .fetch_optional(&self.pool)
        .await?;

        Ok(course)
    }

    async fn delete_course(&self, id: i64) -> Result<bool> {
        // 模块与课时通过外键级联删除
        let result = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_block(&self, block: &NewBlock) -> Result<CourseBlock> {
        let created = sqlx::query_as::<_, CourseBlock>(
            r#"
            INSERT INTO course_blocks (course_id, title, description, position)
            SELECT c.id, $2, $3, COALESCE(
                $4,
                (SELECT COALESCE(MAX(position) + 1, 0) FROM course_blocks WHERE course_id = c.id)
            )
            FROM courses c
            WHERE c.id = $1
            RETURNING *
            "#,
        )
        .bind(block.course_id)
        .bind(&block.title)
        .bind(&block.description)
        .bind(block.position)
        .fetch_optional(&self.pool)
        .await?;

        created.ok_or(ApiError::CourseNotFound(block.course_id))
    }

    async fn get_block(&self, id: i64) -> Result<Option<CourseBlock>> {
        let block = sqlx::query_as::<_, CourseBlock>("SELECT * FROM course_blocks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(block)
    }

    async fn list_blocks(&self, course_id: i64) -> Result<Vec<CourseBlock>> {
        let blocks = sqlx::query_as::<_, CourseBlock>(
            "SELECT * FROM course_blocks WHERE course_id = $1 ORDER BY position, id",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(blocks)
    }

    async fn update_block(&self, id: i64, changes: &BlockChanges) -> Result<Option<CourseBlock>> {
        let block = sqlx::query_as::<_, CourseBlock>(
            r#"
            UPDATE course_blocks SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                position = COALESCE($4, position),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&changes.title)
        .bind(&changes.description)
        .bind(changes.position)
        .fetch_optional(&self.pool)
        .await?;

        Ok(block)
    }

    async fn delete_block(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM course_blocks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn reorder_blocks(&self, course_id: i64, ids: &[i64]) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE course_blocks b
            SET position = (o.ord - 1)::INT, updated_at = NOW()
            FROM UNNEST($2::BIGINT[]) WITH ORDINALITY AS o(id, ord)
            WHERE b.id = o.id AND b.course_id = $1
            "#,
        )
        .bind(course_id)
        .bind(ids)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_lesson(&self, lesson: &NewLesson) -> Result<Lesson> {
        let created = sqlx::query_as::<_, Lesson>(
            r#"
            INSERT INTO lessons
                (course_id, block_id, title, content, video_url, duration_minutes, lesson_type, position)
            SELECT b.course_id, b.id, $2, $3, $4, $5, $6, COALESCE(
                $7,
                (SELECT COALESCE(MAX(position) + 1, 0) FROM lessons WHERE block_id = b.id)
            )
            FROM course_blocks b
            WHERE b.id = $1
            RETURNING *
            "#,
        )
        .bind(lesson.block_id)
        .bind(&lesson.title)
        .bind(&lesson.content)
        .bind(&lesson.video_url)
        .bind(lesson.duration_minutes)
        .bind(lesson.lesson_type)
        .bind(lesson.position)
        .fetch_optional(&self.pool)
        .await?;

        created.ok_or(ApiError::BlockNotFound(lesson.block_id))
    }

    async fn get_lesson(&self, id: i64) -> Result<Option<Lesson>> {
        let lesson = sqlx::query_as::<_, Lesson>("SELECT * FROM lessons WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(lesson)
    }

    async fn list_lessons_by_block(&self, block_id: i64) -> Result<Vec<Lesson>> {
        let lessons = sqlx::query_as::<_, Lesson>(
            "SELECT * FROM lessons WHERE block_id = $1 ORDER BY position, id",
        )
        .bind(block_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lessons)
    }

    async fn list_lessons_by_course(&self, course_id: i64) -> Result<Vec<Lesson>> {
        let lessons = sqlx::query_as::<_, Lesson>(
            "SELECT * FROM lessons WHERE course_id = $1 ORDER BY position, id",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lessons)
    }

    async fn update_lesson(&self, id: i64, changes: &LessonChanges) -> Result<Option<Lesson>> {
        let lesson = sqlx::query_as::<_, Lesson>(
            r#"
            UPDATE lessons SET
                title = COALESCE($2, title),
                content = COALESCE($3, content),
                video_url = COALESCE($4, video_url),
                duration_minutes = COALESCE($5, duration_minutes),
                lesson_type = COALESCE($6, lesson_type),
                position = COALESCE($7, position),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&changes.title)
        .bind(&changes.content)
        .bind(&changes.video_url)
        .bind(changes.duration_minutes)
        .bind(changes.lesson_type)
        .bind(changes.position)
        .fetch_optional(&self.pool)
        .await?;

        Ok(lesson)
    }

    async fn delete_lesson(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM lessons WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn reorder_lessons(&self, block_id: i64, ids: &[i64]) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE lessons l
            SET position = (o.ord - 1)::INT, updated_at = NOW()
            FROM UNNEST($2::BIGINT[]) WITH ORDINALITY AS o(id, ord)
            WHERE l.id = o.id AND l.block_id = $1
            "#,
        )
        .bind(block_id)
        .bind(ids)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn course_outline(&self, course_id: i64) -> Result<Option<CourseOutline>> {
        let Some(course) = self.get_course(course_id).await? else {
            return Ok(None);
        };
        let blocks = self.list_blocks(course_id).await?;
        let lessons = self.list_lessons_by_course(course_id).await?;

        Ok(Some(CourseOutline::assemble(course, blocks, lessons)))
    }
}
