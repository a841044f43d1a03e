//! Telegram 用户

use serde::{Deserialize, Serialize};

/// 从 Web App initData 的 `user` 字段解析出的用户信息
///
/// 作为请求扩展注入，handler 通过 `Extension<TelegramUser>` 获取当前用户。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
}

impl TelegramUser {
    /// 仅有 ID 的用户（开发模式调试头使用）
    pub fn with_id(id: i64) -> Self {
        Self {
            id,
            first_name: String::new(),
            last_name: None,
            username: None,
            language_code: None,
        }
    }
}
