//! 响应 DTO 定义
//!
//! 统一响应包装与需要聚合多个实体的视图结构，单个实体直接序列化模型

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Lesson, LessonType, Payment, PriceQuote, PromoCode, Stream, TelegramUser};

/// 分页响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

impl<T> PageResponse<T> {
    pub fn new(items: Vec<T>, total: i64, page: i64, page_size: i64) -> Self {
        let total_pages = if page_size > 0 {
            (total + page_size - 1) / page_size
        } else {
            0
        };

        Self {
            items,
            total,
            page,
            page_size,
            total_pages,
        }
    }
}

/// API 统一响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub code: String,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// 创建成功响应
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            code: "SUCCESS".to_string(),
            message: "操作成功".to_string(),
            data: Some(data),
        }
    }

    /// 创建成功响应（无数据）
    pub fn success_empty() -> ApiResponse<()> {
        ApiResponse {
            success: true,
            code: "SUCCESS".to_string(),
            message: "操作成功".to_string(),
            data: None,
        }
    }

    /// 创建成功响应（自定义消息）
    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            code: "SUCCESS".to_string(),
            message: message.into(),
            data: Some(data),
        }
    }
}

/// 当前用户信息
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeDto {
    pub id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub language_code: Option<String>,
}

impl From<TelegramUser> for MeDto {
    fn from(user: TelegramUser) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            username: user.username,
            language_code: user.language_code,
        }
    }
}

/// 学习流详情（带报名人数）
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamDetailDto {
    #[serde(flatten)]
    pub stream: Stream,
    pub enrolled_count: i64,
    /// 当前用户是否已报名
    pub is_enrolled: bool,
}

/// 学员视角的课时
///
/// 未开放的课时不返回正文与视频地址
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentLessonDto {
    pub id: i64,
    pub block_id: i64,
    pub title: String,
    pub lesson_type: LessonType,
    pub duration_minutes: Option<i32>,
    pub position: i32,
    pub open_at: DateTime<Utc>,
    pub available: bool,
    pub content: Option<String>,
    pub video_url: Option<String>,
}

impl StudentLessonDto {
    pub fn from_lesson(lesson: Lesson, open_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let available = open_at <= now;
        Self {
            id: lesson.id,
            block_id: lesson.block_id,
            title: lesson.title,
            lesson_type: lesson.lesson_type,
            duration_minutes: lesson.duration_minutes,
            position: lesson.position,
            open_at,
            available,
            content: if available { lesson.content } else { None },
            video_url: if available { lesson.video_url } else { None },
        }
    }
}

/// 学员视角的模块
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentBlockDto {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub position: i32,
    pub lessons: Vec<StudentLessonDto>,
}

/// 促销码校验结果（不占用名额）
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoQuoteDto {
    pub code: String,
    pub currency: String,
    #[serde(flatten)]
    pub quote: PriceQuote,
    pub remaining_uses: Option<i32>,
}

/// 促销码列表项
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoCodeDto {
    #[serde(flatten)]
    pub promo: PromoCode,
    pub remaining_uses: Option<i32>,
}

impl From<PromoCode> for PromoCodeDto {
    fn from(promo: PromoCode) -> Self {
        let remaining_uses = promo.remaining_uses();
        Self {
            promo,
            remaining_uses,
        }
    }
}

/// 创建支付订单的结果
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCreatedDto {
    pub payment: Payment,
    /// 是否已直接完成报名（免费或全额折扣）
    pub enrolled: bool,
    pub return_url: Option<String>,
}
