//! 学习流聊天 API 处理器

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use validator::Validate;

use crate::{
    dto::{ApiResponse, ChatHistoryQuery, SendChatMessageRequest},
    error::Result,
    models::{ChatMessage, TelegramUser},
    state::AppState,
};

/// POST /api/v1/streams/{id}/chat/messages
pub async fn send_message(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Path(stream_id): Path<i64>,
    Json(req): Json<SendChatMessageRequest>,
) -> Result<Json<ApiResponse<ChatMessage>>> {
    req.validate()?;
    let message = state.chat.send(user.id, stream_id, &req).await?;
    Ok(Json(ApiResponse::success(message)))
}

/// 历史消息，按时间倒序，`beforeId` 为游标
///
/// GET /api/v1/streams/{id}/chat/messages
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Path(stream_id): Path<i64>,
    Query(query): Query<ChatHistoryQuery>,
) -> Result<Json<ApiResponse<Vec<ChatMessage>>>> {
    query.validate()?;
    let messages = state.chat.history(user.id, stream_id, &query).await?;
    Ok(Json(ApiResponse::success(messages)))
}
