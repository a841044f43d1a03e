//! 学习流访问控制
//!
//! 作者：学习流所属课程的作者；成员：作者或已报名学员

use std::sync::Arc;

use crate::error::{ApiError, Result};
use crate::models::{Course, Stream};
use crate::repository::{CourseRepositoryTrait, StreamRepositoryTrait};

/// 调用者在学习流中的角色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamRole {
    Author,
    Student,
}

#[derive(Clone)]
pub struct StreamAccess {
    courses: Arc<dyn CourseRepositoryTrait>,
    streams: Arc<dyn StreamRepositoryTrait>,
}

impl StreamAccess {
    pub fn new(
        courses: Arc<dyn CourseRepositoryTrait>,
        streams: Arc<dyn StreamRepositoryTrait>,
    ) -> Self {
        Self { courses, streams }
    }

    pub async fn load(&self, stream_id: i64) -> Result<(Stream, Course)> {
        let stream = self
            .streams
            .get_stream(stream_id)
            .await?
            .ok_or(ApiError::StreamNotFound(stream_id))?;
        let course = self
            .courses
            .get_course(stream.course_id)
            .await?
            .ok_or(ApiError::CourseNotFound(stream.course_id))?;
        Ok((stream, course))
    }

    /// 要求调用者是课程作者
    pub async fn require_author(&self, stream_id: i64, user_id: i64) -> Result<(Stream, Course)> {
        let (stream, course) = self.load(stream_id).await?;
        if !course.is_author(user_id) {
            return Err(ApiError::Forbidden("仅课程作者可以执行此操作".to_string()));
        }
        Ok((stream, course))
    }

    /// 要求调用者是作者或已报名学员
    pub async fn require_member(
        &self,
        stream_id: i64,
        user_id: i64,
    ) -> Result<(Stream, Course, StreamRole)> {
        let (stream, course) = self.load(stream_id).await?;
        if course.is_author(user_id) {
            return Ok((stream, course, StreamRole::Author));
        }
        if self.streams.is_enrolled(stream_id, user_id).await? {
            return Ok((stream, course, StreamRole::Student));
        }
        Err(ApiError::Forbidden("未报名该学习流".to_string()))
    }
}
