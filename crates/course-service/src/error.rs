//! 课程平台 API 错误类型定义

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::models::{PaymentStatus, PromoUnavailable, StreamStatus};

/// API 错误类型
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // 认证错误
    #[error("未授权: {0}")]
    Unauthorized(String),
    #[error("禁止访问: {0}")]
    Forbidden(String),
    #[error("支付回调签名无效")]
    InvalidSignature,

    // 验证错误
    #[error("参数验证失败: {0}")]
    Validation(String),

    // 资源不存在
    #[error("课程不存在: {0}")]
    CourseNotFound(i64),
    #[error("课程模块不存在: {0}")]
    BlockNotFound(i64),
    #[error("课时不存在: {0}")]
    LessonNotFound(i64),
    #[error("学习流不存在: {0}")]
    StreamNotFound(i64),
    #[error("支付订单不存在: {0}")]
    PaymentNotFound(i64),
    #[error("促销码不存在: {0}")]
    PromoCodeNotFound(String),
    #[error("消息不存在: {0}")]
    MessageNotFound(i64),
    #[error("资源不存在: {0}")]
    NotFound(String),

    // 业务错误
    #[error("课程下存在学习流，无法删除")]
    CourseHasStreams,
    #[error("学习流状态不允许此操作: {from:?} -> {to:?}")]
    InvalidStreamTransition { from: StreamStatus, to: StreamStatus },
    #[error("学习流当前不接受报名: {0:?}")]
    StreamNotOpen(StreamStatus),
    #[error("学习流名额已满")]
    StreamFull,
    #[error("已报名该学习流")]
    AlreadyEnrolled,
    #[error("该学习流需要付费报名")]
    PaymentRequired,
    #[error("促销码已停用")]
    PromoCodeInactive,
    #[error("促销码已过期")]
    PromoCodeExpired,
    #[error("促销码使用次数已达上限")]
    PromoCodeExhausted,
    #[error("促销码已存在: {0}")]
    DuplicatePromoCode(String),
    #[error("支付状态不允许此操作: {from:?} -> {to:?}")]
    InvalidPaymentTransition { from: PaymentStatus, to: PaymentStatus },
    #[error("支付订单冲突: {0}")]
    PaymentConflict(String),

    // 系统错误
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Telegram 接口错误: {0}")]
    Telegram(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

impl ApiError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) | Self::InvalidSignature => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,

            Self::Validation(_) => StatusCode::BAD_REQUEST,

            Self::CourseNotFound(_)
            | Self::BlockNotFound(_)
            | Self::LessonNotFound(_)
            | Self::StreamNotFound(_)
            | Self::PaymentNotFound(_)
            | Self::PromoCodeNotFound(_)
            | Self::MessageNotFound(_)
            | Self::NotFound(_) => StatusCode::NOT_FOUND,

            Self::CourseHasStreams
            | Self::InvalidStreamTransition { .. }
            | Self::StreamNotOpen(_)
            | Self::StreamFull
            | Self::AlreadyEnrolled
            | Self::DuplicatePromoCode(_)
            | Self::InvalidPaymentTransition { .. }
            | Self::PaymentConflict(_) => StatusCode::CONFLICT,

            Self::PaymentRequired => StatusCode::PAYMENT_REQUIRED,

            Self::PromoCodeInactive | Self::PromoCodeExpired | Self::PromoCodeExhausted => {
                StatusCode::UNPROCESSABLE_ENTITY
            }

            Self::Telegram(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 返回错误码（API 契约的一部分，客户端据此分支）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::CourseNotFound(_) => "COURSE_NOT_FOUND",
            Self::BlockNotFound(_) => "BLOCK_NOT_FOUND",
            Self::LessonNotFound(_) => "LESSON_NOT_FOUND",
            Self::StreamNotFound(_) => "STREAM_NOT_FOUND",
            Self::PaymentNotFound(_) => "PAYMENT_NOT_FOUND",
            Self::PromoCodeNotFound(_) => "PROMO_CODE_NOT_FOUND",
            Self::MessageNotFound(_) => "MESSAGE_NOT_FOUND",
            Self::NotFound(_) => "NOT_FOUND",
            Self::CourseHasStreams => "COURSE_HAS_STREAMS",
            Self::InvalidStreamTransition { .. } => "INVALID_STREAM_TRANSITION",
            Self::StreamNotOpen(_) => "STREAM_NOT_OPEN",
            Self::StreamFull => "STREAM_FULL",
            Self::AlreadyEnrolled => "ALREADY_ENROLLED",
            Self::PaymentRequired => "PAYMENT_REQUIRED",
            Self::PromoCodeInactive => "PROMO_CODE_INACTIVE",
            Self::PromoCodeExpired => "PROMO_CODE_EXPIRED",
            Self::PromoCodeExhausted => "PROMO_CODE_EXHAUSTED",
            Self::DuplicatePromoCode(_) => "DUPLICATE_PROMO_CODE",
            Self::InvalidPaymentTransition { .. } => "INVALID_PAYMENT_TRANSITION",
            Self::PaymentConflict(_) => "PAYMENT_CONFLICT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Telegram(_) => "TELEGRAM_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为可重试的系统错误
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Telegram(_))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志
        let message = match &self {
            Self::Database(e) => {
                tracing::error!(error = %e, "数据库操作失败");
                "服务内部错误，请稍后重试".to_string()
            }
            Self::Internal(e) => {
                tracing::error!(error = %e, "内部错误");
                "服务内部错误，请稍后重试".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "message": message,
            "data": serde_json::Value::Null
        });

        (status, axum::Json(body)).into_response()
    }
}

/// 从 validator 错误转换
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON 处理错误: {}", err))
    }
}

impl From<PromoUnavailable> for ApiError {
    fn from(reason: PromoUnavailable) -> Self {
        match reason {
            PromoUnavailable::Inactive => Self::PromoCodeInactive,
            PromoUnavailable::Expired => Self::PromoCodeExpired,
            PromoUnavailable::Exhausted => Self::PromoCodeExhausted,
        }
    }
}

impl From<course_shared::error::SharedError> for ApiError {
    fn from(err: course_shared::error::SharedError) -> Self {
        match err {
            course_shared::error::SharedError::Database(e) => Self::Database(e),
            other => Self::Internal(other.to_string()),
        }
    }
}

/// 服务层 Result 类型别名
pub type Result<T> = std::result::Result<T, ApiError>;
