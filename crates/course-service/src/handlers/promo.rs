//! 促销码 API 处理器

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use validator::Validate;

use crate::{
    dto::{
        ApiResponse, CreatePromoCodeRequest, PromoCodeDto, PromoQuoteDto, UpdatePromoCodeRequest,
        ValidatePromoCodeQuery,
    },
    error::Result,
    models::TelegramUser,
    state::AppState,
};

/// POST /api/v1/streams/{id}/promo-codes
pub async fn create_promo_code(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Path(stream_id): Path<i64>,
    Json(req): Json<CreatePromoCodeRequest>,
) -> Result<Json<ApiResponse<PromoCodeDto>>> {
    req.validate()?;
    let promo = state.promos.create(user.id, stream_id, &req).await?;
    Ok(Json(ApiResponse::success(promo.into())))
}

/// GET /api/v1/streams/{id}/promo-codes
pub async fn list_promo_codes(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Path(stream_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<PromoCodeDto>>>> {
    let promos = state.promos.list(user.id, stream_id).await?;
    Ok(Json(ApiResponse::success(promos)))
}

/// PUT /api/v1/promo-codes/{id}
pub async fn update_promo_code(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Path(id): Path<i64>,
    Json(req): Json<UpdatePromoCodeRequest>,
) -> Result<Json<ApiResponse<PromoCodeDto>>> {
    req.validate()?;
    let promo = state.promos.update(user.id, id, &req).await?;
    Ok(Json(ApiResponse::success(promo.into())))
}

/// 校验促销码并返回折后价格，不占用名额
///
/// GET /api/v1/streams/{id}/promo-codes/check?code=
pub async fn check_promo_code(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Path(stream_id): Path<i64>,
    Query(query): Query<ValidatePromoCodeQuery>,
) -> Result<Json<ApiResponse<PromoQuoteDto>>> {
    query.validate()?;
    let quote = state
        .promos
        .check(user.id, stream_id, &query.code, Utc::now())
        .await?;
    Ok(Json(ApiResponse::success(quote)))
}
