//! 促销码实体与折扣计算

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::DiscountType;

/// 促销码，作用于单个学习流
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PromoCode {
    pub id: i64,
    pub stream_id: i64,
    /// 统一大写存储
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    /// None 表示不限次数
    #[sqlx(default)]
    pub max_uses: Option<i32>,
    /// 已占用次数（含待支付订单的预占）
    pub used_count: i32,
    #[sqlx(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 促销码不可用的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromoUnavailable {
    Inactive,
    Expired,
    Exhausted,
}

impl PromoCode {
    /// 检查促销码当前是否可以被占用
    pub fn check_available(&self, now: DateTime<Utc>) -> Result<(), PromoUnavailable> {
        if !self.active {
            return Err(PromoUnavailable::Inactive);
        }
        if self.expires_at.is_some_and(|at| at <= now) {
            return Err(PromoUnavailable::Expired);
        }
        if self.max_uses.is_some_and(|max| self.used_count >= max) {
            return Err(PromoUnavailable::Exhausted);
        }
        Ok(())
    }

    /// 计算使用该促销码后的价格
    pub fn quote(&self, price: i64) -> PriceQuote {
        let discount = match self.discount_type {
            // i128 中间结果不会溢出，商的绝对值不超过 price
            DiscountType::Percent => {
                (i128::from(price) * i128::from(self.discount_value.clamp(0, 100)) / 100) as i64
            }
            DiscountType::Fixed => self.discount_value.max(0),
        };
        PriceQuote::with_discount(price, discount)
    }

    /// 剩余可用次数
    pub fn remaining_uses(&self) -> Option<i32> {
        self.max_uses.map(|max| (max - self.used_count).max(0))
    }
}

/// 价格报价（均为最小货币单位）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub original_amount: i64,
    pub discount_amount: i64,
    pub amount: i64,
}

impl PriceQuote {
    /// 无折扣
    pub fn full(price: i64) -> Self {
        Self {
            original_amount: price,
            discount_amount: 0,
            amount: price,
        }
    }

    /// 折扣不超过原价，最终价格不为负
    pub fn with_discount(price: i64, discount: i64) -> Self {
        let discount = discount.clamp(0, price.max(0));
        Self {
            original_amount: price,
            discount_amount: discount,
            amount: price - discount,
        }
    }
}

/// 新建促销码
#[derive(Debug, Clone)]
pub struct NewPromoCode {
    pub stream_id: i64,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub max_uses: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct PromoCodeChanges {
    pub max_uses: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
    pub active: Option<bool>,
}
