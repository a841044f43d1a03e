//! 支付订单实体

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::PaymentStatus;

/// 学习流报名支付订单
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: i64,
    pub user_id: i64,
    pub stream_id: i64,
    #[sqlx(default)]
    pub promo_code_id: Option<i64>,
    pub original_amount: i64,
    pub discount_amount: i64,
    /// 实付金额
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    /// 支付渠道侧的交易号，首次回调时绑定
    #[sqlx(default)]
    pub external_id: Option<String>,
    #[sqlx(default)]
    pub failure_reason: Option<String>,
    #[sqlx(default)]
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 新建支付订单
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: i64,
    pub stream_id: i64,
    pub promo_code_id: Option<i64>,
    pub original_amount: i64,
    pub discount_amount: i64,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
}

/// 状态迁移参数（compare-and-set，from 不匹配时不更新）
#[derive(Debug, Clone)]
pub struct PaymentTransition {
    pub from: PaymentStatus,
    pub to: PaymentStatus,
    pub external_id: Option<String>,
    pub failure_reason: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}
