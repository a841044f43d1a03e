//! 学习流 API 处理器
//!
//! 学习流管理、免费报名、课时排期与学员课时视图

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use chrono::Utc;
use validator::Validate;

use crate::{
    dto::{
        ApiResponse, BulkScheduleRequest, ChangeStreamStatusRequest, CreateStreamRequest,
        ScheduleLessonRequest, StreamDetailDto, StudentBlockDto, UpdateStreamRequest,
    },
    error::Result,
    models::{Enrollment, LessonSchedule, Stream, TelegramUser},
    state::AppState,
};

/// POST /api/v1/courses/{id}/streams
pub async fn create_stream(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Path(course_id): Path<i64>,
    Json(req): Json<CreateStreamRequest>,
) -> Result<Json<ApiResponse<Stream>>> {
    req.validate()?;
    let stream = state.streams.create_stream(user.id, course_id, &req).await?;
    Ok(Json(ApiResponse::success(stream)))
}

/// 课程下的学习流，非作者看不到草稿
///
/// GET /api/v1/courses/{id}/streams
pub async fn list_streams(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Path(course_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<Stream>>>> {
    let streams = state.streams.list_streams(user.id, course_id).await?;
    Ok(Json(ApiResponse::success(streams)))
}

/// GET /api/v1/streams/{id}
pub async fn get_stream(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<StreamDetailDto>>> {
    let detail = state.streams.get_stream(user.id, id).await?;
    Ok(Json(ApiResponse::success(detail)))
}

/// PUT /api/v1/streams/{id}
pub async fn update_stream(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateStreamRequest>,
) -> Result<Json<ApiResponse<Stream>>> {
    req.validate()?;
    let stream = state.streams.update_stream(user.id, id, &req).await?;
    Ok(Json(ApiResponse::success(stream)))
}

/// 学习流状态变更
///
/// POST /api/v1/streams/{id}/status
pub async fn change_status(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Path(id): Path<i64>,
    Json(req): Json<ChangeStreamStatusRequest>,
) -> Result<Json<ApiResponse<Stream>>> {
    req.validate()?;
    let stream = state.streams.change_status(user.id, id, req.status).await?;
    Ok(Json(ApiResponse::success(stream)))
}

/// 免费学习流报名，收费学习流需走支付流程
///
/// POST /api/v1/streams/{id}/enroll
pub async fn enroll(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Enrollment>>> {
    let enrollment = state.streams.enroll_free(user.id, id).await?;
    Ok(Json(ApiResponse::success(enrollment)))
}

/// 学员课时视图
///
/// GET /api/v1/streams/{id}/lessons
pub async fn student_lessons(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<StudentBlockDto>>>> {
    let blocks = state.streams.student_lessons(user.id, id, Utc::now()).await?;
    Ok(Json(ApiResponse::success(blocks)))
}

/// 批量设置课时开放时间
///
/// PUT /api/v1/streams/{id}/schedule
pub async fn bulk_schedule(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Path(id): Path<i64>,
    Json(req): Json<BulkScheduleRequest>,
) -> Result<Json<ApiResponse<Vec<LessonSchedule>>>> {
    req.validate()?;
    let schedules = state.streams.bulk_schedule(user.id, id, &req).await?;
    Ok(Json(ApiResponse::success(schedules)))
}

/// 设置单个课时开放时间
///
/// POST /api/v1/streams/{id}/schedule
pub async fn schedule_lesson(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Path(id): Path<i64>,
    Json(req): Json<ScheduleLessonRequest>,
) -> Result<Json<ApiResponse<LessonSchedule>>> {
    req.validate()?;
    let schedule = state.streams.schedule_lesson(user.id, id, &req).await?;
    Ok(Json(ApiResponse::success(schedule)))
}

/// GET /api/v1/streams/{id}/schedule
pub async fn list_schedule(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<LessonSchedule>>>> {
    let schedules = state.streams.list_schedule(user.id, id).await?;
    Ok(Json(ApiResponse::success(schedules)))
}

/// DELETE /api/v1/streams/{id}/schedule/{lesson_id}
pub async fn delete_schedule(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Path((id, lesson_id)): Path<(i64, i64)>,
) -> Result<Json<ApiResponse<()>>> {
    state.streams.delete_schedule(user.id, id, lesson_id).await?;
    Ok(Json(ApiResponse::<()>::success_empty()))
}
