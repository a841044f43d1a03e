//! 课程内容服务
//!
//! 课程、模块、课时的管理。所有修改操作仅限课程作者。

use std::sync::Arc;

use tracing::{info, instrument};

use crate::dto::{
    CreateBlockRequest, CreateCourseRequest, CreateLessonRequest, PageResponse, PaginationParams,
    UpdateBlockRequest, UpdateCourseRequest, UpdateLessonRequest,
};
use crate::error::{ApiError, Result};
use crate::models::{
    BlockChanges, Course, CourseBlock, CourseChanges, CourseOutline, CourseStatus, Lesson,
    LessonChanges, NewBlock, NewCourse, NewLesson, is_permutation,
};
use crate::repository::{CourseRepositoryTrait, StreamRepositoryTrait};

const DEFAULT_CURRENCY: &str = "RUB";

pub struct CourseService {
    courses: Arc<dyn CourseRepositoryTrait>,
    streams: Arc<dyn StreamRepositoryTrait>,
}

impl CourseService {
    pub fn new(
        courses: Arc<dyn CourseRepositoryTrait>,
        streams: Arc<dyn StreamRepositoryTrait>,
    ) -> Self {
        Self { courses, streams }
    }

    async fn load_course(&self, id: i64) -> Result<Course> {
        self.courses
            .get_course(id)
            .await?
            .ok_or(ApiError::CourseNotFound(id))
    }

    /// 加载课程并校验作者身份
    async fn owned_course(&self, id: i64, user_id: i64) -> Result<Course> {
        let course = self.load_course(id).await?;
        if !course.is_author(user_id) {
            return Err(ApiError::Forbidden("仅课程作者可以修改课程".to_string()));
        }
        Ok(course)
    }

    async fn owned_block(&self, block_id: i64, user_id: i64) -> Result<CourseBlock> {
        let block = self
            .courses
            .get_block(block_id)
            .await?
            .ok_or(ApiError::BlockNotFound(block_id))?;
        self.owned_course(block.course_id, user_id).await?;
        Ok(block)
    }

    async fn owned_lesson(&self, lesson_id: i64, user_id: i64) -> Result<Lesson> {
        let lesson = self
            .courses
            .get_lesson(lesson_id)
            .await?
            .ok_or(ApiError::LessonNotFound(lesson_id))?;
        self.owned_course(lesson.course_id, user_id).await?;
        Ok(lesson)
    }

    // ==================== 课程 ====================

    #[instrument(skip(self, req))]
    pub async fn create_course(&self, author_id: i64, req: &CreateCourseRequest) -> Result<Course> {
        let course = self
            .courses
            .create_course(&NewCourse {
                author_id,
                title: req.title.trim().to_string(),
                description: req.description.clone(),
                cover_url: req.cover_url.clone(),
                price: req.price.unwrap_or(0),
                currency: req
                    .currency
                    .clone()
                    .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            })
            .await?;

        info!(course_id = course.id, author_id, "Course created");
        Ok(course)
    }

    /// 草稿与归档课程仅作者可见
    pub async fn get_course(&self, user_id: i64, id: i64) -> Result<Course> {
        let course = self.load_course(id).await?;
        if course.status != CourseStatus::Published && !course.is_author(user_id) {
            return Err(ApiError::CourseNotFound(id));
        }
        Ok(course)
    }

    pub async fn list_my_courses(
        &self,
        author_id: i64,
        params: &PaginationParams,
    ) -> Result<PageResponse<Course>> {
        let items = self
            .courses
            .list_courses_by_author(author_id, params.limit(), params.offset())
            .await?;
        let total = self.courses.count_courses_by_author(author_id).await?;
        Ok(PageResponse::new(items, total, params.page, params.limit()))
    }

    #[instrument(skip(self, req))]
    pub async fn update_course(
        &self,
        user_id: i64,
        id: i64,
        req: &UpdateCourseRequest,
    ) -> Result<Course> {
        self.owned_course(id, user_id).await?;
        let changes = CourseChanges {
            title: req.title.as_ref().map(|t| t.trim().to_string()),
            description: req.description.clone(),
            cover_url: req.cover_url.clone(),
            price: req.price,
            currency: req.currency.clone(),
            status: req.status,
        };
        let course = self
            .courses
            .update_course(id, &changes)
            .await?
            .ok_or(ApiError::CourseNotFound(id))?;

        info!(course_id = id, "Course updated");
        Ok(course)
    }

    /// 存在学习流的课程不可删除，与课程状态无关（学习流持有报名与支付记录）
    #[instrument(skip(self))]
    pub async fn delete_course(&self, user_id: i64, id: i64) -> Result<()> {
        self.owned_course(id, user_id).await?;
        if self.streams.count_streams_by_course(id).await? > 0 {
            return Err(ApiError::CourseHasStreams);
        }
        if !self.courses.delete_course(id).await? {
            return Err(ApiError::CourseNotFound(id));
        }

        info!(course_id = id, "Course deleted");
        Ok(())
    }

    /// 课程大纲
    ///
    /// 作者看到完整内容；其他用户仅能查看已发布课程，且不含课时正文
    pub async fn outline(&self, user_id: i64, course_id: i64) -> Result<CourseOutline> {
        let mut outline = self
            .courses
            .course_outline(course_id)
            .await?
            .ok_or(ApiError::CourseNotFound(course_id))?;

        if outline.course.is_author(user_id) {
            return Ok(outline);
        }
        if outline.course.status != CourseStatus::Published {
            return Err(ApiError::CourseNotFound(course_id));
        }
        for block in &mut outline.blocks {
            for lesson in &mut block.lessons {
                lesson.content = None;
                lesson.video_url = None;
            }
        }
        Ok(outline)
    }

    // ==================== 模块 ====================

    pub async fn create_block(
        &self,
        user_id: i64,
        course_id: i64,
        req: &CreateBlockRequest,
    ) -> Result<CourseBlock> {
        self.owned_course(course_id, user_id).await?;
        let block = self
            .courses
            .create_block(&NewBlock {
                course_id,
                title: req.title.trim().to_string(),
                description: req.description.clone(),
                position: req.position,
            })
            .await?;

        info!(course_id, block_id = block.id, "Block created");
        Ok(block)
    }

    pub async fn update_block(
        &self,
        user_id: i64,
        block_id: i64,
        req: &UpdateBlockRequest,
    ) -> Result<CourseBlock> {
        self.owned_block(block_id, user_id).await?;
        let changes = BlockChanges {
            title: req.title.as_ref().map(|t| t.trim().to_string()),
            description: req.description.clone(),
            position: req.position,
        };
        self.courses
            .update_block(block_id, &changes)
            .await?
            .ok_or(ApiError::BlockNotFound(block_id))
    }

    /// 删除模块会同时删除其下课时
    pub async fn delete_block(&self, user_id: i64, block_id: i64) -> Result<()> {
        let block = self.owned_block(block_id, user_id).await?;
        if !self.courses.delete_block(block_id).await? {
            return Err(ApiError::BlockNotFound(block_id));
        }

        info!(course_id = block.course_id, block_id, "Block deleted");
        Ok(())
    }

    pub async fn reorder_blocks(
        &self,
        user_id: i64,
        course_id: i64,
        ids: &[i64],
    ) -> Result<Vec<CourseBlock>> {
        self.owned_course(course_id, user_id).await?;
        let existing: Vec<i64> = self
            .courses
            .list_blocks(course_id)
            .await?
            .iter()
            .map(|b| b.id)
            .collect();
        if !is_permutation(&existing, ids) {
            return Err(ApiError::Validation(
                "排序列表必须恰好包含课程的全部模块".to_string(),
            ));
        }
        self.courses.reorder_blocks(course_id, ids).await?;
        self.courses.list_blocks(course_id).await
    }

    // ==================== 课时 ====================

    pub async fn create_lesson(
        &self,
        user_id: i64,
        block_id: i64,
        req: &CreateLessonRequest,
    ) -> Result<Lesson> {
        self.owned_block(block_id, user_id).await?;
        let lesson = self
            .courses
            .create_lesson(&NewLesson {
                block_id,
                title: req.title.trim().to_string(),
                content: req.content.clone(),
                video_url: req.video_url.clone(),
                duration_minutes: req.duration_minutes,
                lesson_type: req.lesson_type,
                position: req.position,
            })
            .await?;

        info!(block_id, lesson_id = lesson.id, "Lesson created");
        Ok(lesson)
    }

    /// 完整课时内容仅作者可直接读取，学员通过学习流课时列表访问
    pub async fn get_lesson(&self, user_id: i64, lesson_id: i64) -> Result<Lesson> {
        self.owned_lesson(lesson_id, user_id).await
    }

    pub async fn update_lesson(
        &self,
        user_id: i64,
        lesson_id: i64,
        req: &UpdateLessonRequest,
    ) -> Result<Lesson> {
        self.owned_lesson(lesson_id, user_id).await?;
        let changes = LessonChanges {
            title: req.title.as_ref().map(|t| t.trim().to_string()),
            content: req.content.clone(),
            video_url: req.video_url.clone(),
            duration_minutes: req.duration_minutes,
            lesson_type: req.lesson_type,
            position: req.position,
        };
        self.courses
            .update_lesson(lesson_id, &changes)
            .await?
            .ok_or(ApiError::LessonNotFound(lesson_id))
    }

    pub async fn delete_lesson(&self, user_id: i64, lesson_id: i64) -> Result<()> {
        self.owned_lesson(lesson_id, user_id).await?;
        if !self.courses.delete_lesson(lesson_id).await? {
            return Err(ApiError::LessonNotFound(lesson_id));
        }

        info!(lesson_id, "Lesson deleted");
        Ok(())
    }

    pub async fn reorder_lessons(
        &self,
        user_id: i64,
        block_id: i64,
        ids: &[i64],
    ) -> Result<Vec<Lesson>> {
        self.owned_block(block_id, user_id).await?;
        let existing: Vec<i64> = self
            .courses
            .list_lessons_by_block(block_id)
            .await?
            .iter()
            .map(|l| l.id)
            .collect();
        if !is_permutation(&existing, ids) {
            return Err(ApiError::Validation(
                "排序列表必须恰好包含模块的全部课时".to_string(),
            ));
        }
        self.courses.reorder_lessons(block_id, ids).await?;
        self.courses.list_lessons_by_block(block_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LessonType, NewStream};
    use crate::repository::MockCourseRepositoryTrait;
    use crate::repository::memory::{MemoryCourseRepository, MemoryStreamRepository};
    use chrono::Utc;

    const AUTHOR: i64 = 100;
    const STRANGER: i64 = 200;

    fn service() -> (CourseService, Arc<MemoryStreamRepository>) {
        let streams = Arc::new(MemoryStreamRepository::new());
        let service = CourseService::new(Arc::new(MemoryCourseRepository::new()), streams.clone());
        (service, streams)
    }

    fn create_req(title: &str) -> CreateCourseRequest {
        CreateCourseRequest {
            title: title.to_string(),
            description: None,
            cover_url: None,
            price: Some(5000),
            currency: None,
        }
    }

    fn lesson_req(title: &str) -> CreateLessonRequest {
        CreateLessonRequest {
            title: title.to_string(),
            content: Some("body".to_string()),
            video_url: None,
            duration_minutes: None,
            position: None,
            lesson_type: LessonType::Text,
        }
    }

    fn block_req(title: &str) -> CreateBlockRequest {
        CreateBlockRequest {
            title: title.to_string(),
            description: None,
            position: None,
        }
    }

    #[tokio::test]
    async fn test_create_course_defaults() {
        let (service, _) = service();
        let course = service.create_course(AUTHOR, &create_req("  Rust  ")).await.unwrap();
        assert_eq!(course.title, "Rust");
        assert_eq!(course.currency, "RUB");
        assert_eq!(course.status, CourseStatus::Draft);
    }

    #[tokio::test]
    async fn test_only_author_can_modify() {
        let (service, _) = service();
        let course = service.create_course(AUTHOR, &create_req("Rust")).await.unwrap();

        let err = service
            .update_course(STRANGER, course.id, &UpdateCourseRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));

        let err = service
            .create_block(STRANGER, course.id, &block_req("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_draft_course_hidden_from_others() {
        let (service, _) = service();
        let course = service.create_course(AUTHOR, &create_req("Rust")).await.unwrap();

        assert!(matches!(
            service.get_course(STRANGER, course.id).await,
            Err(ApiError::CourseNotFound(_))
        ));
        assert!(service.get_course(AUTHOR, course.id).await.is_ok());

        service
            .update_course(
                AUTHOR,
                course.id,
                &UpdateCourseRequest {
                    status: Some(CourseStatus::Published),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(service.get_course(STRANGER, course.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_course_with_streams_rejected() {
        let (service, streams) = service();
        let course = service.create_course(AUTHOR, &create_req("Rust")).await.unwrap();
        streams
            .create_stream(&NewStream {
                course_id: course.id,
                name: "s".to_string(),
                start_date: Utc::now(),
                end_date: None,
                price: 0,
                currency: "RUB".to_string(),
                max_students: None,
                notify_on_release: false,
                timezone: None,
            })
            .await
            .unwrap();

        // 草稿状态也不例外
        assert_eq!(course.status, CourseStatus::Draft);
        let err = service.delete_course(AUTHOR, course.id).await.unwrap_err();
        assert!(matches!(err, ApiError::CourseHasStreams));

        let empty = service.create_course(AUTHOR, &create_req("Empty")).await.unwrap();
        service
            .update_course(
                AUTHOR,
                empty.id,
                &UpdateCourseRequest {
                    status: Some(CourseStatus::Published),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        service.delete_course(AUTHOR, empty.id).await.unwrap();
        assert!(matches!(
            service.get_course(AUTHOR, empty.id).await,
            Err(ApiError::CourseNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reorder_requires_permutation() {
        let (service, _) = service();
        let course = service.create_course(AUTHOR, &create_req("Rust")).await.unwrap();
        let a = service.create_block(AUTHOR, course.id, &block_req("a")).await.unwrap();
        let b = service.create_block(AUTHOR, course.id, &block_req("b")).await.unwrap();

        let err = service
            .reorder_blocks(AUTHOR, course.id, &[a.id])
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let blocks = service
            .reorder_blocks(AUTHOR, course.id, &[b.id, a.id])
            .await
            .unwrap();
        let ids: Vec<i64> = blocks.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);

        let l1 = service.create_lesson(AUTHOR, a.id, &lesson_req("1")).await.unwrap();
        let l2 = service.create_lesson(AUTHOR, a.id, &lesson_req("2")).await.unwrap();
        let lessons = service
            .reorder_lessons(AUTHOR, a.id, &[l2.id, l1.id])
            .await
            .unwrap();
        assert_eq!(lessons[0].id, l2.id);
        assert!(
            service
                .reorder_lessons(AUTHOR, a.id, &[l2.id, l2.id])
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_outline_hides_content_from_non_authors() {
        let (service, _) = service();
        let course = service.create_course(AUTHOR, &create_req("Rust")).await.unwrap();
        let block = service.create_block(AUTHOR, course.id, &block_req("a")).await.unwrap();
        service.create_lesson(AUTHOR, block.id, &lesson_req("1")).await.unwrap();

        let full = service.outline(AUTHOR, course.id).await.unwrap();
        assert_eq!(full.blocks[0].lessons[0].content.as_deref(), Some("body"));

        assert!(service.outline(STRANGER, course.id).await.is_err());

        service
            .update_course(
                AUTHOR,
                course.id,
                &UpdateCourseRequest {
                    status: Some(CourseStatus::Published),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let preview = service.outline(STRANGER, course.id).await.unwrap();
        assert!(preview.blocks[0].lessons[0].content.is_none());
        assert_eq!(preview.blocks[0].lessons[0].title, "1");
    }

    #[tokio::test]
    async fn test_lesson_access_is_author_only() {
        let (service, _) = service();
        let course = service.create_course(AUTHOR, &create_req("Rust")).await.unwrap();
        let block = service.create_block(AUTHOR, course.id, &block_req("a")).await.unwrap();
        let lesson = service.create_lesson(AUTHOR, block.id, &lesson_req("1")).await.unwrap();

        assert!(service.get_lesson(AUTHOR, lesson.id).await.is_ok());
        assert!(matches!(
            service.get_lesson(STRANGER, lesson.id).await,
            Err(ApiError::Forbidden(_))
        ));

        service.delete_block(AUTHOR, block.id).await.unwrap();
        assert!(matches!(
            service.get_lesson(AUTHOR, lesson.id).await,
            Err(ApiError::LessonNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_repository_error_propagates() {
        let mut courses = MockCourseRepositoryTrait::new();
        courses
            .expect_get_course()
            .returning(|_| Err(ApiError::Internal("connection reset".to_string())));
        let service = CourseService::new(Arc::new(courses), Arc::new(MemoryStreamRepository::new()));

        let err = service.get_course(AUTHOR, 1).await.unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));
    }
}
