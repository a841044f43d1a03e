//! 课程、模块与课时 API 处理器

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use validator::Validate;

use crate::{
    dto::{
        ApiResponse, CreateBlockRequest, CreateCourseRequest, CreateLessonRequest, PageResponse,
        PaginationParams, ReorderRequest, UpdateBlockRequest, UpdateCourseRequest,
        UpdateLessonRequest,
    },
    error::Result,
    models::{Course, CourseBlock, CourseOutline, Lesson, TelegramUser},
    state::AppState,
};

/// 创建课程
///
/// POST /api/v1/courses
pub async fn create_course(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Json(req): Json<CreateCourseRequest>,
) -> Result<Json<ApiResponse<Course>>> {
    req.validate()?;
    let course = state.courses.create_course(user.id, &req).await?;
    Ok(Json(ApiResponse::success(course)))
}

/// 我创建的课程
///
/// GET /api/v1/courses
pub async fn list_my_courses(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PageResponse<Course>>>> {
    let page = state.courses.list_my_courses(user.id, &params).await?;
    Ok(Json(ApiResponse::success(page)))
}

/// GET /api/v1/courses/{id}
pub async fn get_course(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Course>>> {
    let course = state.courses.get_course(user.id, id).await?;
    Ok(Json(ApiResponse::success(course)))
}

/// PUT /api/v1/courses/{id}
pub async fn update_course(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateCourseRequest>,
) -> Result<Json<ApiResponse<Course>>> {
    req.validate()?;
    let course = state.courses.update_course(user.id, id, &req).await?;
    Ok(Json(ApiResponse::success(course)))
}

/// 删除课程，已有学习流的课程不能删除
///
/// DELETE /api/v1/courses/{id}
pub async fn delete_course(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>> {
    state.courses.delete_course(user.id, id).await?;
    Ok(Json(ApiResponse::<()>::success_empty()))
}

/// 课程大纲（模块与课时）
///
/// GET /api/v1/courses/{id}/outline
pub async fn get_outline(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<CourseOutline>>> {
    let outline = state.courses.outline(user.id, id).await?;
    Ok(Json(ApiResponse::success(outline)))
}

// ==================== 模块 ====================

/// POST /api/v1/courses/{id}/blocks
pub async fn create_block(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Path(course_id): Path<i64>,
    Json(req): Json<CreateBlockRequest>,
) -> Result<Json<ApiResponse<CourseBlock>>> {
    req.validate()?;
    let block = state.courses.create_block(user.id, course_id, &req).await?;
    Ok(Json(ApiResponse::success(block)))
}

/// 调整模块顺序，`ids` 必须是课程全部模块的一个排列
///
/// PUT /api/v1/courses/{id}/blocks/order
pub async fn reorder_blocks(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Path(course_id): Path<i64>,
    Json(req): Json<ReorderRequest>,
) -> Result<Json<ApiResponse<Vec<CourseBlock>>>> {
    req.validate()?;
    let blocks = state
        .courses
        .reorder_blocks(user.id, course_id, &req.ids)
        .await?;
    Ok(Json(ApiResponse::success(blocks)))
}

/// PUT /api/v1/blocks/{id}
pub async fn update_block(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateBlockRequest>,
) -> Result<Json<ApiResponse<CourseBlock>>> {
    req.validate()?;
    let block = state.courses.update_block(user.id, id, &req).await?;
    Ok(Json(ApiResponse::success(block)))
}

/// DELETE /api/v1/blocks/{id}
pub async fn delete_block(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>> {
    state.courses.delete_block(user.id, id).await?;
    Ok(Json(ApiResponse::<()>::success_empty()))
}

// ==================== 课时 ====================

/// POST /api/v1/blocks/{id}/lessons
pub async fn create_lesson(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Path(block_id): Path<i64>,
    Json(req): Json<CreateLessonRequest>,
) -> Result<Json<ApiResponse<Lesson>>> {
    req.validate()?;
    let lesson = state.courses.create_lesson(user.id, block_id, &req).await?;
    Ok(Json(ApiResponse::success(lesson)))
}

/// PUT /api/v1/blocks/{id}/lessons/order
pub async fn reorder_lessons(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Path(block_id): Path<i64>,
    Json(req): Json<ReorderRequest>,
) -> Result<Json<ApiResponse<Vec<Lesson>>>> {
    req.validate()?;
    let lessons = state
        .courses
        .reorder_lessons(user.id, block_id, &req.ids)
        .await?;
    Ok(Json(ApiResponse::success(lessons)))
}

/// 课时完整内容（作者视图），学员通过学习流的课时视图访问
///
/// GET /api/v1/lessons/{id}
pub async fn get_lesson(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Lesson>>> {
    let lesson = state.courses.get_lesson(user.id, id).await?;
    Ok(Json(ApiResponse::success(lesson)))
}

/// PUT /api/v1/lessons/{id}
pub async fn update_lesson(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateLessonRequest>,
) -> Result<Json<ApiResponse<Lesson>>> {
    req.validate()?;
    let lesson = state.courses.update_lesson(user.id, id, &req).await?;
    Ok(Json(ApiResponse::success(lesson)))
}

/// DELETE /api/v1/lessons/{id}
pub async fn delete_lesson(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>> {
    state.courses.delete_lesson(user.id, id).await?;
    Ok(Json(ApiResponse::<()>::success_empty()))
}
