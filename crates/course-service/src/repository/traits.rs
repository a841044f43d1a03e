//! 仓储 Trait 定义
//!
//! 服务层依赖这些接口而非具体实现：生产环境使用 PostgreSQL，
//! 本地开发与测试使用内存实现，单元测试可使用 mockall 生成的 Mock。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{
    BlockChanges, ChatMessage, Course, CourseBlock, CourseChanges, CourseOutline, Enrollment,
    Lesson, LessonChanges, LessonSchedule, NewBlock, NewChatMessage, NewCourse, NewLesson,
    NewNotification, NewPayment, NewPromoCode, NewStream, Notification, Payment,
    PaymentTransition, PromoCode, PromoCodeChanges, Stream, StreamChanges, StreamStatus,
};

/// 课程内容仓储接口（课程、模块、课时）
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CourseRepositoryTrait: Send + Sync {
    // 课程
    async fn create_course(&self, course: &NewCourse) -> Result<Course>;
    async fn get_course(&self, id: i64) -> Result<Option<Course>>;
    async fn list_courses_by_author(
        &self,
        author_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Course>>;
    async fn count_courses_by_author(&self, author_id: i64) -> Result<i64>;
    async fn update_course(&self, id: i64, changes: &CourseChanges) -> Result<Option<Course>>;
    /// 删除课程及其模块、课时
    async fn delete_course(&self, id: i64) -> Result<bool>;

    // 模块
    /// position 为空时追加到末尾
    async fn create_block(&self, block: &NewBlock) -> Result<CourseBlock>;
    async fn get_block(&self, id: i64) -> Result<Option<CourseBlock>>;
    async fn list_blocks(&self, course_id: i64) -> Result<Vec<CourseBlock>>;
    async fn update_block(&self, id: i64, changes: &BlockChanges) -> Result<Option<CourseBlock>>;
    async fn delete_block(&self, id: i64) -> Result<bool>;
    /// 按 `ids` 顺序重写 position，调用方保证 `ids` 是该课程全部模块的排列
    async fn reorder_blocks(&self, course_id: i64, ids: &[i64]) -> Result<()>;

    // 课时
    async fn create_lesson(&self, lesson: &NewLesson) -> Result<Lesson>;
    async fn get_lesson(&self, id: i64) -> Result<Option<Lesson>>;
    async fn list_lessons_by_block(&self, block_id: i64) -> Result<Vec<Lesson>>;
    async fn list_lessons_by_course(&self, course_id: i64) -> Result<Vec<Lesson>>;
    async fn update_lesson(&self, id: i64, changes: &LessonChanges) -> Result<Option<Lesson>>;
    async fn delete_lesson(&self, id: i64) -> Result<bool>;
    async fn reorder_lessons(&self, block_id: i64, ids: &[i64]) -> Result<()>;

    async fn course_outline(&self, course_id: i64) -> Result<Option<CourseOutline>>;
}

/// 学习流仓储接口（学习流、报名、课时排期）
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StreamRepositoryTrait: Send + Sync {
    async fn create_stream(&self, stream: &NewStream) -> Result<Stream>;
    async fn get_stream(&self, id: i64) -> Result<Option<Stream>>;
    async fn list_streams_by_course(&self, course_id: i64) -> Result<Vec<Stream>>;
    async fn count_streams_by_course(&self, course_id: i64) -> Result<i64>;
    async fn update_stream(&self, id: i64, changes: &StreamChanges) -> Result<Option<Stream>>;
    /// 仅当当前状态为 `from` 时更新，返回 None 表示状态已被并发修改
    async fn transition_status(
        &self,
        id: i64,
        from: StreamStatus,
        to: StreamStatus,
    ) -> Result<Option<Stream>>;

    // 报名
    /// 幂等：已报名时返回已有记录
    async fn enroll(
        &self,
        stream_id: i64,
        user_id: i64,
        payment_id: Option<i64>,
    ) -> Result<Enrollment>;
    async fn remove_enrollment(&self, stream_id: i64, user_id: i64) -> Result<bool>;
    async fn is_enrolled(&self, stream_id: i64, user_id: i64) -> Result<bool>;
    async fn list_enrolled_user_ids(&self, stream_id: i64) -> Result<Vec<i64>>;
    async fn count_enrollments(&self, stream_id: i64) -> Result<i64>;

    // 排期
    /// 修改开放时间会清除已开放标记，新时间到达后再次触发开放事件
    async fn upsert_schedule(
        &self,
        stream_id: i64,
        lesson_id: i64,
        release_at: DateTime<Utc>,
    ) -> Result<LessonSchedule>;
    async fn list_schedules(&self, stream_id: i64) -> Result<Vec<LessonSchedule>>;
    async fn delete_schedule(&self, stream_id: i64, lesson_id: i64) -> Result<bool>;
    /// 领取到期且未开放的排期并标记为已开放，每条排期只会被领取一次
    async fn claim_due_releases(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<LessonSchedule>>;
}

/// 支付订单仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentRepositoryTrait: Send + Sync {
    async fn create(&self, payment: &NewPayment) -> Result<Payment>;
    async fn get(&self, id: i64) -> Result<Option<Payment>>;
    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<Payment>>;
    /// 比较并设置：仅当当前状态为 `transition.from` 时生效
    async fn transition(&self, id: i64, transition: &PaymentTransition)
    -> Result<Option<Payment>>;
    async fn list_by_user(&self, user_id: i64, limit: i64, offset: i64) -> Result<Vec<Payment>>;
    async fn count_by_user(&self, user_id: i64) -> Result<i64>;
    /// 创建时间早于 `before` 的待支付订单
    async fn list_expired_pending(&self, before: DateTime<Utc>, limit: i64)
    -> Result<Vec<Payment>>;
}

/// 促销码仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PromoCodeRepositoryTrait: Send + Sync {
    /// 同一学习流内 code 唯一，冲突时返回 `DuplicatePromoCode`
    async fn create(&self, promo: &NewPromoCode) -> Result<PromoCode>;
    async fn get(&self, id: i64) -> Result<Option<PromoCode>>;
    async fn get_by_code(&self, stream_id: i64, code: &str) -> Result<Option<PromoCode>>;
    async fn list_by_stream(&self, stream_id: i64) -> Result<Vec<PromoCode>>;
    async fn update(&self, id: i64, changes: &PromoCodeChanges) -> Result<Option<PromoCode>>;
    /// 原子占用一次名额：仅当启用、未过期且未达上限时成功
    async fn try_reserve(&self, id: i64, now: DateTime<Utc>) -> Result<bool>;
    /// 归还一次名额，不会低于 0
    async fn release(&self, id: i64) -> Result<()>;
}

/// 通知仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationRepositoryTrait: Send + Sync {
    async fn create(&self, notification: &NewNotification) -> Result<Notification>;
    async fn get(&self, id: i64) -> Result<Option<Notification>>;
    async fn list_by_stream(
        &self,
        stream_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>>;
    async fn count_by_stream(&self, stream_id: i64) -> Result<i64>;
    /// 领取到期的待发送通知：状态改为 sending，尝试次数加一
    async fn claim_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Notification>>;
    async fn mark_sent(&self, id: i64, sent: i32, failed: i32) -> Result<()>;
    /// `retry_at` 为 Some 时回到 pending 等待重试，否则标记为 failed
    async fn mark_failed(
        &self,
        id: i64,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<()>;
}

/// 学习流聊天仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatRepositoryTrait: Send + Sync {
    async fn create(&self, message: &NewChatMessage) -> Result<ChatMessage>;
    async fn get(&self, id: i64) -> Result<Option<ChatMessage>>;
    /// 按 id 倒序返回，`before_id` 为游标
    async fn list(
        &self,
        stream_id: i64,
        before_id: Option<i64>,
        limit: i64,
    ) -> Result<Vec<ChatMessage>>;
}
