//! Telegram Bot API 客户端（sendMessage）

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{MessageSender, SendError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct SendMessageBody<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Deserialize)]
struct BotResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BotClient {
    client: Client,
    base_url: String,
    token: String,
}

impl BotClient {
    pub fn new(api_base_url: &str, token: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: api_base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }
}

/// 429 与 5xx 可重试，其余非 2xx 视为拒绝
fn classify_status(status: StatusCode, description: String) -> SendError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        SendError::Transient(format!("{}: {}", status, description))
    } else {
        SendError::Rejected(format!("{}: {}", status, description))
    }
}

#[async_trait]
impl MessageSender for BotClient {
    async fn send_message(&self, chat_id: i64, html: &str) -> Result<(), SendError> {
        let body = SendMessageBody {
            chat_id,
            text: html,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| SendError::Transient(e.without_url().to_string()))?;

        let status = response.status();
        let parsed: Option<BotResponse> = response.json().await.ok();
        let description = parsed
            .as_ref()
            .and_then(|r| r.description.clone())
            .unwrap_or_default();

        if !status.is_success() {
            warn!(chat_id, %status, description = %description, "Telegram sendMessage failed");
            return Err(classify_status(status, description));
        }
        match parsed {
            Some(r) if r.ok => {
                debug!(chat_id, "Telegram message sent");
                Ok(())
            }
            _ => Err(SendError::Rejected(description)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_url() {
        let client = BotClient::new("https://api.telegram.org/", "123:ABC").unwrap();
        assert_eq!(
            client.method_url("sendMessage"),
            "https://api.telegram.org/bot123:ABC/sendMessage"
        );
    }

    #[test]
    fn test_classify_status() {
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, String::new()).is_retryable());
        assert!(classify_status(StatusCode::BAD_GATEWAY, String::new()).is_retryable());
        assert!(!classify_status(StatusCode::FORBIDDEN, "bot was blocked".into()).is_retryable());
    }
}
