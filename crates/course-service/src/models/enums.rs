//! 领域枚举类型定义
//!
//! 所有枚举都支持数据库（sqlx，存为 varchar）和 JSON（serde）序列化

use serde::{Deserialize, Serialize};

/// 课程状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum CourseStatus {
    /// 草稿 - 编辑中，学员不可见
    #[default]
    Draft,
    /// 已发布 - 可创建并售卖学习流
    Published,
    /// 已归档 - 停止售卖，历史学习流不受影响
    Archived,
}

/// 课时类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum LessonType {
    Video,
    #[default]
    Text,
    Quiz,
    Homework,
}

/// 学习流状态
///
/// 正常流转：draft -> open -> running -> finished；
/// 未结束的学习流可随时取消。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum StreamStatus {
    /// 草稿 - 配置中，不可报名
    #[default]
    Draft,
    /// 招生中
    Open,
    /// 进行中（仍可报名）
    Running,
    Finished,
    Canceled,
}

impl StreamStatus {
    /// 是否允许从当前状态迁移到目标状态
    pub fn can_transition_to(self, target: StreamStatus) -> bool {
        use StreamStatus::*;
        matches!(
            (self, target),
            (Draft, Open)
                | (Open, Running)
                | (Running, Finished)
                | (Draft | Open | Running, Canceled)
        )
    }

    /// 是否接受报名与支付
    pub fn accepts_enrollment(self) -> bool {
        matches!(self, StreamStatus::Open | StreamStatus::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StreamStatus::Draft => "draft",
            StreamStatus::Open => "open",
            StreamStatus::Running => "running",
            StreamStatus::Finished => "finished",
            StreamStatus::Canceled => "canceled",
        }
    }
}

/// 支付状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum PaymentStatus {
    /// 待支付 - 已占用促销码名额
    #[default]
    Pending,
    Succeeded,
    Failed,
    Canceled,
    /// 已退款 - 报名资格被撤销
    Refunded,
}

impl PaymentStatus {
    /// 支付状态机：pending -> succeeded | failed | canceled，succeeded -> refunded
    pub fn can_transition_to(self, target: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, target),
            (Pending, Succeeded) | (Pending, Failed) | (Pending, Canceled) | (Succeeded, Refunded)
        )
    }

    /// 终态不再接受任何迁移
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PaymentStatus::Failed | PaymentStatus::Canceled | PaymentStatus::Refunded
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Canceled => "canceled",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

/// 折扣类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum DiscountType {
    /// 百分比折扣，取值 1-100
    Percent,
    /// 固定金额折扣（最小货币单位）
    Fixed,
}

/// 通知类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum NotificationType {
    #[default]
    Info,
    Reminder,
    Announcement,
    /// 课时开放时由系统自动生成
    LessonReleased,
}

/// 通知投递状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum NotificationStatus {
    #[default]
    Pending,
    /// 已被 Worker 领取，投递中
    Sending,
    Sent,
    Failed,
}
