//! Telegram 集成
//!
//! Web App initData 校验与 Bot API 消息发送

mod bot_client;
pub mod init_data;

pub use bot_client::BotClient;

use async_trait::async_trait;
use thiserror::Error;

/// 消息发送错误
#[derive(Debug, Error)]
pub enum SendError {
    /// 限流、网络或服务端错误，稍后可重试
    #[error("临时发送失败: {0}")]
    Transient(String),
    /// 用户屏蔽了机器人、聊天不存在等
    #[error("发送被拒绝: {0}")]
    Rejected(String),
}

impl SendError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// 向 Telegram 聊天发送 HTML 消息
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_message(&self, chat_id: i64, html: &str) -> Result<(), SendError>;
}
