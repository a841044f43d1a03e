//! 学习流聊天消息

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: i64,
    pub stream_id: i64,
    pub user_id: i64,
    pub text: String,
    #[sqlx(default)]
    pub reply_to_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewChatMessage {
    pub stream_id: i64,
    pub user_id: i64,
    pub text: String,
    pub reply_to_id: Option<i64>,
}
