//! 学习流广播通知

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{NotificationStatus, NotificationType};

/// 面向学习流全体学员的通知
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub stream_id: i64,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub status: NotificationStatus,
    /// 计划发送时间，重试时会被推迟
    pub scheduled_at: DateTime<Utc>,
    pub attempts: i32,
    pub sent_count: i32,
    pub failed_count: i32,
    #[sqlx(default)]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Notification {
    /// 渲染为 Telegram HTML 消息
    pub fn render_html(&self) -> String {
        format!(
            "<b>{}</b>\n\n{}",
            escape_html(&self.title),
            escape_html(&self.message)
        )
    }
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub stream_id: i64,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub scheduled_at: DateTime<Utc>,
}

/// Telegram HTML parse mode 只需转义这三个字符
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
