//! 支付 API 处理器
//!
//! 回调接口不经过 Telegram 认证，使用 `X-Signature` 头中的 HMAC 签名校验，
//! 因此以原始字节接收请求体。

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::HeaderMap,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    dto::{ApiResponse, CreatePaymentRequest, PageResponse, PaginationParams, PaymentCreatedDto},
    error::{ApiError, Result},
    models::{Payment, TelegramUser},
    state::AppState,
};

pub const SIGNATURE_HEADER: &str = "x-signature";

/// 创建支付订单
///
/// POST /api/v1/payments
pub async fn create_payment(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<Json<ApiResponse<PaymentCreatedDto>>> {
    req.validate()?;
    let created = state
        .payments
        .create_payment(user.id, &req, Utc::now())
        .await?;
    Ok(Json(ApiResponse::success(created)))
}

/// 我的订单
///
/// GET /api/v1/payments
pub async fn list_my_payments(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PageResponse<Payment>>>> {
    let page = state.payments.list_my_payments(user.id, &params).await?;
    Ok(Json(ApiResponse::success(page)))
}

/// GET /api/v1/payments/{id}
pub async fn get_payment(
    State(state): State<AppState>,
    Extension(user): Extension<TelegramUser>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Payment>>> {
    let payment = state.payments.get_payment(user.id, id).await?;
    Ok(Json(ApiResponse::success(payment)))
}

/// 支付渠道回调
///
/// POST /api/v1/payments/callback
pub async fn payment_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<Payment>>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::InvalidSignature)?;
    let payment = state
        .payments
        .handle_callback(signature, &body, Utc::now())
        .await?;
    Ok(Json(ApiResponse::success(payment)))
}
