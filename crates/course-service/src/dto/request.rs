//! 请求 DTO 定义
//!
//! 所有 REST API 的请求参数和请求体结构。字段级约束通过 validator 声明，
//! handler 在处理前统一调用 `validate()`。

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::models::{
    CourseStatus, DiscountType, LessonType, NotificationType, PaymentStatus, StreamStatus,
};

use super::date::{parse_date_string, validate_date_string};

/// 促销码字符集
static PROMO_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid promo code regex"));

const MAX_CHAT_TEXT_CHARS: usize = 4096;

/// ISO 4217 风格的三位大写字母货币代码
fn validate_currency(value: &str) -> Result<(), ValidationError> {
    if value.len() == 3 && value.bytes().all(|b| b.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(ValidationError::new("currency").with_message("货币代码必须是3位大写字母".into()))
    }
}

/// 去除首尾空白后长度必须在 1-4096 个字符之间
fn validate_chat_text(value: &str) -> Result<(), ValidationError> {
    let len = value.trim().chars().count();
    if len == 0 {
        return Err(ValidationError::new("blank").with_message("内容不能为空白".into()));
    }
    if len > MAX_CHAT_TEXT_CHARS {
        return Err(ValidationError::new("length").with_message("消息长度必须在1-4096个字符之间".into()));
    }
    Ok(())
}

// ==================== 课程 ====================

/// 创建课程请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCourseRequest {
    #[validate(length(min = 1, max = 255, message = "课程标题长度必须在1-255个字符之间"))]
    pub title: String,
    #[validate(length(max = 5000, message = "课程描述不能超过5000字符"))]
    pub description: Option<String>,
    #[validate(url(message = "封面地址必须是有效的URL"))]
    pub cover_url: Option<String>,
    #[validate(range(min = 0, max = 100000000, message = "价格必须在0-100000000之间"))]
    pub price: Option<i64>,
    #[validate(custom(function = "validate_currency"))]
    pub currency: Option<String>,
}

/// 更新课程请求
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCourseRequest {
    #[validate(length(min = 1, max = 255, message = "课程标题长度必须在1-255个字符之间"))]
    pub title: Option<String>,
    #[validate(length(max = 5000, message = "课程描述不能超过5000字符"))]
    pub description: Option<String>,
    #[validate(url(message = "封面地址必须是有效的URL"))]
    pub cover_url: Option<String>,
    #[validate(range(min = 0, max = 100000000, message = "价格必须在0-100000000之间"))]
    pub price: Option<i64>,
    #[validate(custom(function = "validate_currency"))]
    pub currency: Option<String>,
    pub status: Option<CourseStatus>,
}

// ==================== 模块 ====================

/// 创建课程模块请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBlockRequest {
    #[validate(length(min = 1, max = 255, message = "模块标题长度必须在1-255个字符之间"))]
    pub title: String,
    #[validate(length(max = 2000, message = "模块描述不能超过2000字符"))]
    pub description: Option<String>,
    #[validate(range(min = 0, message = "排序位置不能为负数"))]
    pub position: Option<i32>,
}

/// 更新课程模块请求
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBlockRequest {
    #[validate(length(min = 1, max = 255, message = "模块标题长度必须在1-255个字符之间"))]
    pub title: Option<String>,
    #[validate(length(max = 2000, message = "模块描述不能超过2000字符"))]
    pub description: Option<String>,
    #[validate(range(min = 0, message = "排序位置不能为负数"))]
    pub position: Option<i32>,
}

/// 重新排序请求（模块或课时）
///
/// `ids` 必须恰好是父级下全部子项的一个排列，由服务层校验
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRequest {
    #[validate(length(min = 1, max = 500, message = "排序列表长度必须在1-500之间"))]
    pub ids: Vec<i64>,
}

// ==================== 课时 ====================

/// 创建课时请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateLessonRequest {
    #[validate(length(min = 1, max = 255, message = "课时标题长度必须在1-255个字符之间"))]
    pub title: String,
    #[validate(length(max = 100000, message = "课时内容不能超过100000字符"))]
    pub content: Option<String>,
    #[validate(url(message = "视频地址必须是有效的URL"))]
    pub video_url: Option<String>,
    #[validate(range(min = 1, max = 1440, message = "课时时长必须在1-1440分钟之间"))]
    pub duration_minutes: Option<i32>,
    #[validate(range(min = 0, message = "排序位置不能为负数"))]
    pub position: Option<i32>,
    #[serde(default)]
    pub lesson_type: LessonType,
}

/// 更新课时请求
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLessonRequest {
    #[validate(length(min = 1, max = 255, message = "课时标题长度必须在1-255个字符之间"))]
    pub title: Option<String>,
    #[validate(length(max = 100000, message = "课时内容不能超过100000字符"))]
    pub content: Option<String>,
    #[validate(url(message = "视频地址必须是有效的URL"))]
    pub video_url: Option<String>,
    #[validate(range(min = 1, max = 1440, message = "课时时长必须在1-1440分钟之间"))]
    pub duration_minutes: Option<i32>,
    #[validate(range(min = 0, message = "排序位置不能为负数"))]
    pub position: Option<i32>,
    pub lesson_type: Option<LessonType>,
}

// ==================== 学习流 ====================

/// 创建学习流请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_create_stream_dates", skip_on_field_errors = true))]
pub struct CreateStreamRequest {
    #[validate(length(min = 1, max = 255, message = "学习流名称长度必须在1-255个字符之间"))]
    pub name: String,
    #[validate(custom(function = "validate_date_string"))]
    pub start_date: String,
    #[validate(custom(function = "validate_date_string"))]
    pub end_date: Option<String>,
    /// 为空时使用课程默认价格
    #[validate(range(min = 0, max = 100000000, message = "价格必须在0-100000000之间"))]
    pub price: Option<i64>,
    #[validate(custom(function = "validate_currency"))]
    pub currency: Option<String>,
    #[validate(range(min = 1, max = 100000, message = "学员上限必须在1-100000之间"))]
    pub max_students: Option<i32>,
    pub notify_on_release: Option<bool>,
    #[validate(length(min = 1, max = 64, message = "时区标签长度必须在1-64个字符之间"))]
    pub timezone: Option<String>,
}

fn validate_create_stream_dates(req: &CreateStreamRequest) -> Result<(), ValidationError> {
    check_date_order(Some(req.start_date.as_str()), req.end_date.as_deref())
}

/// 更新学习流请求
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_update_stream_dates", skip_on_field_errors = true))]
pub struct UpdateStreamRequest {
    #[validate(length(min = 1, max = 255, message = "学习流名称长度必须在1-255个字符之间"))]
    pub name: Option<String>,
    #[validate(custom(function = "validate_date_string"))]
    pub start_date: Option<String>,
    #[validate(custom(function = "validate_date_string"))]
    pub end_date: Option<String>,
    #[validate(range(min = 0, max = 100000000, message = "价格必须在0-100000000之间"))]
    pub price: Option<i64>,
    #[validate(custom(function = "validate_currency"))]
    pub currency: Option<String>,
    #[validate(range(min = 1, max = 100000, message = "学员上限必须在1-100000之间"))]
    pub max_students: Option<i32>,
    pub notify_on_release: Option<bool>,
    #[validate(length(min = 1, max = 64, message = "时区标签长度必须在1-64个字符之间"))]
    pub timezone: Option<String>,
}

fn validate_update_stream_dates(req: &UpdateStreamRequest) -> Result<(), ValidationError> {
    check_date_order(req.start_date.as_deref(), req.end_date.as_deref())
}

/// 两个日期都给出时，结束日期不得早于开始日期
fn check_date_order(start: Option<&str>, end: Option<&str>) -> Result<(), ValidationError> {
    let (Some(start), Some(end)) = (start.and_then(parse_date_string), end.and_then(parse_date_string))
    else {
        return Ok(());
    };
    if end < start {
        return Err(ValidationError::new("date_order").with_message("结束日期不能早于开始日期".into()));
    }
    Ok(())
}

/// 学习流状态变更请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangeStreamStatusRequest {
    pub status: StreamStatus,
}

/// 单个课时排期
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleLessonRequest {
    #[validate(range(min = 1, message = "课时ID无效"))]
    pub lesson_id: i64,
    #[validate(custom(function = "validate_date_string"))]
    pub release_at: String,
}

/// 批量排期请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BulkScheduleRequest {
    #[validate(length(min = 1, max = 500, message = "排期条目数量必须在1-500之间"), nested)]
    pub items: Vec<ScheduleLessonRequest>,
}

// ==================== 支付 ====================

/// 创建支付订单请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    #[validate(range(min = 1, message = "学习流ID无效"))]
    pub stream_id: i64,
    #[validate(
        length(min = 3, max = 32, message = "促销码长度必须在3-32个字符之间"),
        regex(path = *PROMO_CODE_RE, message = "促销码只能包含字母、数字、下划线和连字符")
    )]
    pub promo_code: Option<String>,
    #[validate(url(message = "返回地址必须是有效的URL"))]
    pub return_url: Option<String>,
}

/// 支付渠道回调的目标状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackStatus {
    Succeeded,
    Failed,
    Canceled,
    Refunded,
}

impl From<CallbackStatus> for PaymentStatus {
    fn from(status: CallbackStatus) -> Self {
        match status {
            CallbackStatus::Succeeded => PaymentStatus::Succeeded,
            CallbackStatus::Failed => PaymentStatus::Failed,
            CallbackStatus::Canceled => PaymentStatus::Canceled,
            CallbackStatus::Refunded => PaymentStatus::Refunded,
        }
    }
}

/// 支付回调请求体（原始字节用于验签）
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCallbackRequest {
    #[validate(length(min = 1, max = 128, message = "交易号长度必须在1-128个字符之间"))]
    pub external_id: String,
    #[validate(range(min = 1, message = "订单ID无效"))]
    pub payment_id: i64,
    pub status: CallbackStatus,
    #[validate(range(min = 0, message = "金额不能为负数"))]
    pub amount: i64,
    #[validate(custom(function = "validate_currency"))]
    pub currency: String,
    #[validate(custom(function = "validate_date_string"))]
    pub paid_at: Option<String>,
    /// 失败原因（渠道侧描述）
    #[validate(length(max = 500, message = "失败原因不能超过500字符"))]
    pub reason: Option<String>,
}

// ==================== 促销码 ====================

/// 创建促销码请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_discount", skip_on_field_errors = true))]
pub struct CreatePromoCodeRequest {
    /// 为空时自动生成
    #[validate(
        length(min = 3, max = 32, message = "促销码长度必须在3-32个字符之间"),
        regex(path = *PROMO_CODE_RE, message = "促销码只能包含字母、数字、下划线和连字符")
    )]
    pub code: Option<String>,
    pub discount_type: DiscountType,
    #[validate(range(min = 1, message = "折扣值必须大于0"))]
    pub discount_value: i64,
    #[validate(range(min = 1, max = 1000000, message = "使用次数上限必须在1-1000000之间"))]
    pub max_uses: Option<i32>,
    #[validate(custom(function = "validate_date_string"))]
    pub expires_at: Option<String>,
}

fn validate_discount(req: &CreatePromoCodeRequest) -> Result<(), ValidationError> {
    if req.discount_type == DiscountType::Percent && req.discount_value > 100 {
        return Err(ValidationError::new("discount_percent").with_message("百分比折扣不能超过100".into()));
    }
    Ok(())
}

/// 更新促销码请求
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePromoCodeRequest {
    #[validate(range(min = 1, max = 1000000, message = "使用次数上限必须在1-1000000之间"))]
    pub max_uses: Option<i32>,
    #[validate(custom(function = "validate_date_string"))]
    pub expires_at: Option<String>,
    pub active: Option<bool>,
}

/// 促销码校验查询
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ValidatePromoCodeQuery {
    #[validate(
        length(min = 3, max = 32, message = "促销码长度必须在3-32个字符之间"),
        regex(path = *PROMO_CODE_RE, message = "促销码只能包含字母、数字、下划线和连字符")
    )]
    pub code: String,
}

// ==================== 通知 ====================

/// 创建学习流广播通知请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationRequest {
    #[validate(length(min = 1, max = 255, message = "通知标题长度必须在1-255个字符之间"))]
    pub title: String,
    #[validate(length(min = 1, max = 4096, message = "通知内容长度必须在1-4096个字符之间"))]
    pub message: String,
    #[serde(default)]
    pub notification_type: NotificationType,
    /// 为空时立即发送
    #[validate(custom(function = "validate_date_string"))]
    pub scheduled_at: Option<String>,
}

// ==================== 聊天 ====================

/// 发送聊天消息请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendChatMessageRequest {
    #[validate(custom(function = "validate_chat_text"))]
    pub text: String,
    #[validate(range(min = 1, message = "回复的消息ID无效"))]
    pub reply_to_id: Option<i64>,
}

/// 聊天记录查询（游标分页，按时间倒序）
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistoryQuery {
    pub before_id: Option<i64>,
    #[serde(default = "default_chat_limit")]
    #[validate(range(min = 1, max = 100, message = "每页条数必须在1-100之间"))]
    pub limit: i64,
}

fn default_chat_limit() -> i64 {
    50
}

// ==================== 通用 ====================

/// 分页查询参数
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

impl PaginationParams {
    /// 计算查询的 offset
    pub fn offset(&self) -> i64 {
        (self.page - 1).max(0) * self.limit()
    }

    /// 获取限制条数（1-100）
    pub fn limit(&self) -> i64 {
        self.page_size.clamp(1, 100)
    }
}
