//! 学习流服务
//!
//! 学习流生命周期、免费报名、课时排期与学员课时视图。
//!
//! ## 课时可见性
//!
//! 课时对学员的开放时间取排期的 `release_at`；没有排期的课时随学习流开始时间开放。
//! 未开放课时只返回标题等元信息，不返回正文与视频地址。

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use course_shared::observability::metrics;
use tracing::{info, instrument, warn};

use crate::dto::{
    BulkScheduleRequest, CreateStreamRequest, ScheduleLessonRequest, StreamDetailDto,
    StudentBlockDto, StudentLessonDto, UpdateStreamRequest, parse_date_field,
    parse_optional_date,
};
use crate::error::{ApiError, Result};
use crate::models::{
    CourseStatus, Enrollment, Lesson, LessonSchedule, NewStream, Stream, StreamChanges, StreamStatus,
    lesson_open_at, sort_blocks,
};
use crate::repository::{CourseRepositoryTrait, StreamRepositoryTrait};

use super::access::{StreamAccess, StreamRole};

/// 检查用户当前能否报名该学习流（状态、重复报名、名额）
pub(crate) async fn check_enrollable(
    streams: &dyn StreamRepositoryTrait,
    stream: &Stream,
    user_id: i64,
) -> Result<()> {
    if !stream.status.accepts_enrollment() {
        return Err(ApiError::StreamNotOpen(stream.status));
    }
    if streams.is_enrolled(stream.id, user_id).await? {
        return Err(ApiError::AlreadyEnrolled);
    }
    let enrolled = streams.count_enrollments(stream.id).await?;
    if !stream.has_capacity(enrolled) {
        return Err(ApiError::StreamFull);
    }
    Ok(())
}

pub struct StreamService {
    courses: Arc<dyn CourseRepositoryTrait>,
    streams: Arc<dyn StreamRepositoryTrait>,
    access: StreamAccess,
}

impl StreamService {
    pub fn new(
        courses: Arc<dyn CourseRepositoryTrait>,
        streams: Arc<dyn StreamRepositoryTrait>,
    ) -> Self {
        let access = StreamAccess::new(courses.clone(), streams.clone());
        Self {
            courses,
            streams,
            access,
        }
    }

    #[instrument(skip(self, req))]
    pub async fn create_stream(
        &self,
        user_id: i64,
        course_id: i64,
        req: &CreateStreamRequest,
    ) -> Result<Stream> {
        let course = self
            .courses
            .get_course(course_id)
            .await?
            .ok_or(ApiError::CourseNotFound(course_id))?;
        if !course.is_author(user_id) {
            return Err(ApiError::Forbidden("仅课程作者可以创建学习流".to_string()));
        }

        let stream = self
            .streams
            .create_stream(&NewStream {
                course_id,
                name: req.name.trim().to_string(),
                start_date: parse_date_field("startDate", &req.start_date)?,
                end_date: parse_optional_date("endDate", req.end_date.as_deref())?,
                price: req.price.unwrap_or(course.price),
                currency: req.currency.clone().unwrap_or(course.currency),
                max_students: req.max_students,
                notify_on_release: req.notify_on_release.unwrap_or(true),
                timezone: req.timezone.clone(),
            })
            .await?;

        info!(stream_id = stream.id, course_id, "Stream created");
        Ok(stream)
    }

    #[instrument(skip(self, req))]
    pub async fn update_stream(
        &self,
        user_id: i64,
        stream_id: i64,
        req: &UpdateStreamRequest,
    ) -> Result<Stream> {
        let (stream, _) = self.access.require_author(stream_id, user_id).await?;
        if matches!(stream.status, StreamStatus::Finished | StreamStatus::Canceled) {
            return Err(ApiError::Validation("已结束或已取消的学习流不可修改".to_string()));
        }

        let changes = StreamChanges {
            name: req.name.as_ref().map(|n| n.trim().to_string()),
            start_date: parse_optional_date("startDate", req.start_date.as_deref())?,
            end_date: parse_optional_date("endDate", req.end_date.as_deref())?,
            price: req.price,
            currency: req.currency.clone(),
            max_students: req.max_students,
            notify_on_release: req.notify_on_release,
            timezone: req.timezone.clone(),
            status: None,
        };

        // 只改了其中一个日期时，与现有值比较
        let start = changes.start_date.unwrap_or(stream.start_date);
        let end = changes.end_date.or(stream.end_date);
        if end.is_some_and(|end| end < start) {
            return Err(ApiError::Validation("结束日期不能早于开始日期".to_string()));
        }

        let updated = self
            .streams
            .update_stream(stream_id, &changes)
            .await?
            .ok_or(ApiError::StreamNotFound(stream_id))?;

        info!(stream_id, "Stream updated");
        Ok(updated)
    }

    /// 学习流详情：作者可见全部，其他用户仅可见已开放招生的学习流
    pub async fn get_stream(&self, user_id: i64, stream_id: i64) -> Result<StreamDetailDto> {
        let (stream, course) = self.access.load(stream_id).await?;
        if !course.is_author(user_id) && stream.status == StreamStatus::Draft {
            return Err(ApiError::StreamNotFound(stream_id));
        }
        let enrolled_count = self.streams.count_enrollments(stream_id).await?;
        let is_enrolled = self.streams.is_enrolled(stream_id, user_id).await?;
        Ok(StreamDetailDto {
            stream,
            enrolled_count,
            is_enrolled,
        })
    }

    pub async fn list_streams(&self, user_id: i64, course_id: i64) -> Result<Vec<Stream>> {
        let course = self
            .courses
            .get_course(course_id)
            .await?
            .ok_or(ApiError::CourseNotFound(course_id))?;
        let streams = self.streams.list_streams_by_course(course_id).await?;
        if course.is_author(user_id) {
            return Ok(streams);
        }
        if course.status != CourseStatus::Published {
            return Err(ApiError::CourseNotFound(course_id));
        }
        Ok(streams
            .into_iter()
            .filter(|s| s.status != StreamStatus::Draft)
            .collect())
    }

    /// 状态迁移：draft -> open -> running -> finished，未结束的可取消
    #[instrument(skip(self))]
    pub async fn change_status(
        &self,
        user_id: i64,
        stream_id: i64,
        target: StreamStatus,
    ) -> Result<Stream> {
        let (stream, _) = self.access.require_author(stream_id, user_id).await?;
        if !stream.status.can_transition_to(target) {
            return Err(ApiError::InvalidStreamTransition {
                from: stream.status,
                to: target,
            });
        }

        match self
            .streams
            .transition_status(stream_id, stream.status, target)
            .await?
        {
            Some(updated) => {
                info!(
                    stream_id,
                    from = stream.status.as_str(),
                    to = target.as_str(),
                    "Stream status changed"
                );
                Ok(updated)
            }
            None => {
                // 并发修改：以最新状态报告冲突
                let current = self
                    .streams
                    .get_stream(stream_id)
                    .await?
                    .ok_or(ApiError::StreamNotFound(stream_id))?;
                warn!(stream_id, "Stream status changed concurrently");
                Err(ApiError::InvalidStreamTransition {
                    from: current.status,
                    to: target,
                })
            }
        }
    }

    /// 免费学习流报名，重复报名返回已有记录
    #[instrument(skip(self))]
    pub async fn enroll_free(&self, user_id: i64, stream_id: i64) -> Result<Enrollment> {
        let (stream, _) = self.access.load(stream_id).await?;
        if stream.price > 0 {
            return Err(ApiError::PaymentRequired);
        }
        match check_enrollable(self.streams.as_ref(), &stream, user_id).await {
            Err(ApiError::AlreadyEnrolled) => {}
            other => other?,
        }

        let enrollment = self.streams.enroll(stream_id, user_id, None).await?;
        info!(stream_id, user_id, "Student enrolled (free)");
        Ok(enrollment)
    }

    async fn validate_schedule_item(
        &self,
        stream: &Stream,
        item: &ScheduleLessonRequest,
    ) -> Result<DateTime<Utc>> {
        let lesson = self
            .courses
            .get_lesson(item.lesson_id)
            .await?
            .ok_or(ApiError::LessonNotFound(item.lesson_id))?;
        if lesson.course_id != stream.course_id {
            return Err(ApiError::Validation(format!(
                "课时 {} 不属于该学习流的课程",
                item.lesson_id
            )));
        }
        let release_at = parse_date_field("releaseAt", &item.release_at)?;
        if release_at < stream.start_date {
            return Err(ApiError::Validation(format!(
                "课时 {} 的开放时间早于学习流开始时间",
                item.lesson_id
            )));
        }
        Ok(release_at)
    }

    pub async fn schedule_lesson(
        &self,
        user_id: i64,
        stream_id: i64,
        req: &ScheduleLessonRequest,
    ) -> Result<LessonSchedule> {
        let (stream, _) = self.access.require_author(stream_id, user_id).await?;
        let release_at = self.validate_schedule_item(&stream, req).await?;
        let schedule = self
            .streams
            .upsert_schedule(stream_id, req.lesson_id, release_at)
            .await?;

        info!(stream_id, lesson_id = req.lesson_id, %release_at, "Lesson scheduled");
        Ok(schedule)
    }

    /// 批量排期：先校验全部条目，任一失败则不写入
    #[instrument(skip(self, req), fields(items = req.items.len()))]
    pub async fn bulk_schedule(
        &self,
        user_id: i64,
        stream_id: i64,
        req: &BulkScheduleRequest,
    ) -> Result<Vec<LessonSchedule>> {
        let (stream, _) = self.access.require_author(stream_id, user_id).await?;

        let mut validated = Vec::with_capacity(req.items.len());
        for item in &req.items {
            let release_at = self.validate_schedule_item(&stream, item).await?;
            validated.push((item.lesson_id, release_at));
        }

        let mut schedules = Vec::with_capacity(validated.len());
        for (lesson_id, release_at) in validated {
            schedules.push(
                self.streams
                    .upsert_schedule(stream_id, lesson_id, release_at)
                    .await?,
            );
        }

        info!(stream_id, count = schedules.len(), "Lessons scheduled");
        Ok(schedules)
    }

    pub async fn list_schedule(&self, user_id: i64, stream_id: i64) -> Result<Vec<LessonSchedule>> {
        self.access.require_member(stream_id, user_id).await?;
        self.streams.list_schedules(stream_id).await
    }

    pub async fn delete_schedule(&self, user_id: i64, stream_id: i64, lesson_id: i64) -> Result<()> {
        self.access.require_author(stream_id, user_id).await?;
        if !self.streams.delete_schedule(stream_id, lesson_id).await? {
            return Err(ApiError::NotFound(format!(
                "学习流 {} 中课时 {} 的排期",
                stream_id, lesson_id
            )));
        }
        Ok(())
    }

    /// 学员课时视图，按模块分组
    pub async fn student_lessons(
        &self,
        user_id: i64,
        stream_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<StudentBlockDto>> {
        let (stream, _, role) = self.access.require_member(stream_id, user_id).await?;

        let mut blocks = self.courses.list_blocks(stream.course_id).await?;
        sort_blocks(&mut blocks);
        let lessons = self.courses.list_lessons_by_course(stream.course_id).await?;
        let schedules: HashMap<i64, LessonSchedule> = self
            .streams
            .list_schedules(stream_id)
            .await?
            .into_iter()
            .map(|s| (s.lesson_id, s))
            .collect();

        let mut grouped: HashMap<i64, Vec<StudentLessonDto>> = HashMap::new();
        for lesson in lessons {
            let open_at = lesson_open_at(schedules.get(&lesson.id), stream.start_date);
            grouped
                .entry(lesson.block_id)
                .or_default()
                .push(StudentLessonDto::from_lesson(lesson, open_at, now));
        }

        let result = blocks
            .into_iter()
            .map(|block| {
                let mut lessons = grouped.remove(&block.id).unwrap_or_default();
                lessons.sort_by_key(|l| (l.position, l.id));
                StudentBlockDto {
                    id: block.id,
                    title: block.title,
                    description: block.description,
                    position: block.position,
                    lessons,
                }
            })
            .collect();

        if role == StreamRole::Author {
            info!(stream_id, "Author previewed student lesson view");
        }
        Ok(result)
    }

    /// 领取到期的排期并标记为已开放，返回开放的课时及所属学习流
    ///
    /// 每条排期只会被一个实例领取一次
    pub async fn release_due_lessons(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<(Stream, Lesson)>> {
        let claimed = self.streams.claim_due_releases(now, limit).await?;
        let mut released = Vec::with_capacity(claimed.len());
        for schedule in claimed {
            let stream = self.streams.get_stream(schedule.stream_id).await?;
            let lesson = self.courses.get_lesson(schedule.lesson_id).await?;
            match (stream, lesson) {
                (Some(stream), Some(lesson)) => {
                    info!(stream_id = stream.id, lesson_id = lesson.id, "Lesson released");
                    released.push((stream, lesson));
                }
                _ => warn!(
                    stream_id = schedule.stream_id,
                    lesson_id = schedule.lesson_id,
                    "Released schedule refers to a missing stream or lesson"
                ),
            }
        }
        metrics::record_lessons_released(released.len() as u64);
        Ok(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LessonType, NewBlock, NewCourse, NewLesson};
    use crate::repository::memory::{MemoryCourseRepository, MemoryStreamRepository};
    use chrono::Duration;

    const AUTHOR: i64 = 1;
    const STUDENT: i64 = 2;

    struct Fixture {
        service: StreamService,
        courses: Arc<MemoryCourseRepository>,
        streams: Arc<MemoryStreamRepository>,
        course_id: i64,
    }

    async fn fixture() -> Fixture {
        let courses = Arc::new(MemoryCourseRepository::new());
        let streams = Arc::new(MemoryStreamRepository::new());
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
        Fixture {
            service: StreamService::new(courses.clone(), streams.clone()),
            courses,
            streams,
            course_id: course.id,
        }
    }

    fn stream_req(start: &str, price: Option<i64>, max: Option<i32>) -> CreateStreamRequest {
        CreateStreamRequest {
            name: "Весна".to_string(),
            start_date: start.to_string(),
            end_date: None,
            price,
            currency: None,
            max_students: max,
            notify_on_release: None,
            timezone: None,
        }
    }

    async fn open_stream(f: &Fixture, req: &CreateStreamRequest) -> Stream {
        let stream = f.service.create_stream(AUTHOR, f.course_id, req).await.unwrap();
        f.service
            .change_status(AUTHOR, stream.id, StreamStatus::Open)
            .await
            .unwrap()
    }

    async fn add_lesson(f: &Fixture, block_id: i64, title: &str) -> i64 {
        f.courses
            .create_lesson(&NewLesson {
                block_id,
                title: title.to_string(),
                content: Some(format!("{title} body")),
                video_url: None,
                duration_minutes: None,
                lesson_type: LessonType::Text,
                position: None,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_create_stream_inherits_course_price() {
        let f = fixture().await;
        let stream = f
            .service
            .create_stream(AUTHOR, f.course_id, &stream_req("2026-03-01", None, None))
            .await
            .unwrap();
        assert_eq!(stream.price, 0);
        assert_eq!(stream.currency, "RUB");
        assert!(stream.notify_on_release);
        assert_eq!(stream.status, StreamStatus::Draft);

        let err = f
            .service
            .create_stream(STUDENT, f.course_id, &stream_req("2026-03-01", None, None))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let f = fixture().await;
        let stream = f
            .service
            .create_stream(AUTHOR, f.course_id, &stream_req("2026-03-01", None, None))
            .await
            .unwrap();

        let err = f
            .service
            .change_status(AUTHOR, stream.id, StreamStatus::Running)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::InvalidStreamTransition {
                from: StreamStatus::Draft,
                to: StreamStatus::Running
            }
        ));

        for target in [StreamStatus::Open, StreamStatus::Running, StreamStatus::Finished] {
            let updated = f.service.change_status(AUTHOR, stream.id, target).await.unwrap();
            assert_eq!(updated.status, target);
        }

        let err = f
            .service
            .change_status(AUTHOR, stream.id, StreamStatus::Canceled)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidStreamTransition { .. }));
    }

    #[tokio::test]
    async fn test_enroll_free_rules() {
        let f = fixture().await;
        let draft = f
            .service
            .create_stream(AUTHOR, f.course_id, &stream_req("2026-03-01", None, Some(1)))
            .await
            .unwrap();
        assert!(matches!(
            f.service.enroll_free(STUDENT, draft.id).await,
            Err(ApiError::StreamNotOpen(StreamStatus::Draft))
        ));

        let stream = f
            .service
            .change_status(AUTHOR, draft.id, StreamStatus::Open)
            .await
            .unwrap();
        f.service.enroll_free(STUDENT, stream.id).await.unwrap();
        // 重复报名幂等
        f.service.enroll_free(STUDENT, stream.id).await.unwrap();
        assert_eq!(f.streams.count_enrollments(stream.id).await.unwrap(), 1);

        assert!(matches!(
            f.service.enroll_free(3, stream.id).await,
            Err(ApiError::StreamFull)
        ));

        let paid = open_stream(&f, &stream_req("2026-03-01", Some(1000), None)).await;
        assert!(matches!(
            f.service.enroll_free(STUDENT, paid.id).await,
            Err(ApiError::PaymentRequired)
        ));
    }

    #[tokio::test]
    async fn test_schedule_validation() {
        let f = fixture().await;
        let stream = open_stream(&f, &stream_req("2026-03-01", None, None)).await;
        let block = f
            .courses
            .create_block(&NewBlock {
                course_id: f.course_id,
                title: "b".to_string(),
                description: None,
                position: None,
            })
            .await
            .unwrap();
        let lesson_id = add_lesson(&f, block.id, "l1").await;

        let before_start = ScheduleLessonRequest {
            lesson_id,
            release_at: "2026-02-28".to_string(),
        };
        assert!(matches!(
            f.service.schedule_lesson(AUTHOR, stream.id, &before_start).await,
            Err(ApiError::Validation(_))
        ));

        // 其他课程的课时
        let other = f
            .courses
            .create_course(&NewCourse {
                author_id: AUTHOR,
                title: "Other".to_string(),
                description: None,
                cover_url: None,
                price: 0,
                currency: "RUB".to_string(),
            })
            .await
            .unwrap();
        let other_block = f
            .courses
            .create_block(&NewBlock {
                course_id: other.id,
                title: "b".to_string(),
                description: None,
                position: None,
            })
            .await
            .unwrap();
        let foreign = add_lesson(&f, other_block.id, "foreign").await;

        let bulk = BulkScheduleRequest {
            items: vec![
                ScheduleLessonRequest {
                    lesson_id,
                    release_at: "2026-03-08".to_string(),
                },
                ScheduleLessonRequest {
                    lesson_id: foreign,
                    release_at: "2026-03-08".to_string(),
                },
            ],
        };
        assert!(f.service.bulk_schedule(AUTHOR, stream.id, &bulk).await.is_err());
        // 全部校验通过前不写入
        assert!(f.streams.list_schedules(stream.id).await.unwrap().is_empty());

        let ok = ScheduleLessonRequest {
            lesson_id,
            release_at: "2026-03-08T10:00:00Z".to_string(),
        };
        f.service.schedule_lesson(AUTHOR, stream.id, &ok).await.unwrap();
        assert_eq!(f.service.list_schedule(AUTHOR, stream.id).await.unwrap().len(), 1);

        f.service.delete_schedule(AUTHOR, stream.id, lesson_id).await.unwrap();
        assert!(matches!(
            f.service.delete_schedule(AUTHOR, stream.id, lesson_id).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_student_lessons_visibility() {
        let f = fixture().await;
        let now = Utc::now();
        let start = (now - Duration::days(1)).to_rfc3339();
        let stream = open_stream(&f, &stream_req(&start, None, None)).await;

        let block = f
            .courses
            .create_block(&NewBlock {
                course_id: f.course_id,
                title: "b".to_string(),
                description: None,
                position: None,
            })
            .await
            .unwrap();
        let unscheduled = add_lesson(&f, block.id, "intro").await;
        let future = add_lesson(&f, block.id, "later").await;
        f.streams
            .upsert_schedule(stream.id, future, now + Duration::days(3))
            .await
            .unwrap();

        assert!(matches!(
            f.service.student_lessons(STUDENT, stream.id, now).await,
            Err(ApiError::Forbidden(_))
        ));

        f.service.enroll_free(STUDENT, stream.id).await.unwrap();
        let blocks = f.service.student_lessons(STUDENT, stream.id, now).await.unwrap();
        assert_eq!(blocks.len(), 1);
        let lessons = &blocks[0].lessons;
        let intro = lessons.iter().find(|l| l.id == unscheduled).unwrap();
        assert!(intro.available);
        assert_eq!(intro.content.as_deref(), Some("intro body"));

        let later = lessons.iter().find(|l| l.id == future).unwrap();
        assert!(!later.available);
        assert!(later.content.is_none());

        let blocks = f
            .service
            .student_lessons(STUDENT, stream.id, now + Duration::days(4))
            .await
            .unwrap();
        assert!(blocks[0].lessons.iter().all(|l| l.available));
    }

    #[tokio::test]
    async fn test_update_stream_date_order() {
        let f = fixture().await;
        let stream = f
            .service
            .create_stream(AUTHOR, f.course_id, &stream_req("2026-03-01", None, None))
            .await
            .unwrap();
        let req = UpdateStreamRequest {
            end_date: Some("2026-02-01".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            f.service.update_stream(AUTHOR, stream.id, &req).await,
            Err(ApiError::Validation(_))
        ));

        let req = UpdateStreamRequest {
            name: Some("Осень".to_string()),
            end_date: Some("2026-06-01".to_string()),
            ..Default::default()
        };
        let updated = f.service.update_stream(AUTHOR, stream.id, &req).await.unwrap();
        assert_eq!(updated.name, "Осень");
        assert!(updated.end_date.is_some());
    }

    #[tokio::test]
    async fn test_draft_stream_hidden() {
        let f = fixture().await;
        let stream = f
            .service
            .create_stream(AUTHOR, f.course_id, &stream_req("2026-03-01", None, None))
            .await
            .unwrap();
        assert!(matches!(
            f.service.get_stream(STUDENT, stream.id).await,
            Err(ApiError::StreamNotFound(_))
        ));
        let detail = f.service.get_stream(AUTHOR, stream.id).await.unwrap();
        assert_eq!(detail.enrolled_count, 0);
        assert!(!detail.is_enrolled);
    }

    #[tokio::test]
    async fn test_release_due_lessons_once() {
        let f = fixture().await;
        let stream = open_stream(&f, &stream_req("2026-03-01", None, None)).await;
        let block = f
            .courses
            .create_block(&NewBlock {
                course_id: f.course_id,
                title: "b".to_string(),
                description: None,
                position: None,
            })
            .await
            .unwrap();
        let due = add_lesson(&f, block.id, "due").await;
        let later = add_lesson(&f, block.id, "later").await;
        for (lesson_id, release_at) in [(due, "2026-03-02"), (later, "2026-04-01")] {
            let req = ScheduleLessonRequest {
                lesson_id,
                release_at: release_at.to_string(),
            };
            f.service.schedule_lesson(AUTHOR, stream.id, &req).await.unwrap();
        }

        let now = parse_date_field("now", "2026-03-03").unwrap();
        let released = f.service.release_due_lessons(now, 10).await.unwrap();
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].0.id, stream.id);
        assert_eq!(released[0].1.id, due);

        assert!(f.service.release_due_lessons(now, 10).await.unwrap().is_empty());
    }
}
