//! 学习流通知 API 处理器

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use validator::Validate;

use crate::{
    dto::{ApiResponse, CreateNotificationRequest, PageResponse, PaginationParams},
    error::Result,
    models::{Notification, TelegramUser},
    state::AppState,
};

/// 创建广播通知，`scheduledAt` 为空时立即进入发送队列
///
/// POST /api/v1/streams/{id}/notifications
pub async fn create_notification(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Path(stream_id): Path<i64>,
    Json(req): Json<CreateNotificationRequest>,
) -> Result<Json<ApiResponse<Notification>>> {
    req.validate()?;
    let notification = state
        .notifications
        .create(user.id, stream_id, &req, Utc::now())
        .await?;
    Ok(Json(ApiResponse::success(notification)))
}

/// GET /api/v1/streams/{id}/notifications
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Path(stream_id): Path<i64>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PageResponse<Notification>>>> {
    let page = state
        .notifications
        .list(user.id, stream_id, &params)
        .await?;
    Ok(Json(ApiResponse::success(page)))
}
