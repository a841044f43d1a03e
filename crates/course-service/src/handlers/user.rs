//! 当前用户

use axum::{Extension, Json};

use crate::dto::{ApiResponse, MeDto};
use crate::models::TelegramUser;

/// 获取当前用户
///
/// GET /api/v1/me
pub async fn me(Extension(user): Extension<TelegramUser>) -> Json<ApiResponse<MeDto>> {
    Json(ApiResponse::success(MeDto::from(user)))
}
