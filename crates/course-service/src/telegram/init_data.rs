//! Telegram Web App initData 校验
//!
//! 校验流程：
//! 1. 按 query string 解析并 URL 解码，取出 `hash`
//! 2. 其余字段按 key 排序拼成 `key=value`，以换行连接得到 data_check_string
//! 3. secret = HMAC_SHA256(key = "WebAppData", msg = bot_token)
//! 4. hex(HMAC_SHA256(secret, data_check_string)) 与 `hash` 常量时间比较
//! 5. 检查 `auth_date` 是否过期，解析 `user` 字段

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use crate::models::TelegramUser;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InitDataError {
    #[error("缺少字段: {0}")]
    MissingField(&'static str),
    #[error("签名无效")]
    InvalidHash,
    #[error("initData 已过期")]
    Expired,
    #[error("字段格式错误: {0}")]
    Malformed(String),
}

fn parse_pairs(init_data: &str) -> Result<BTreeMap<String, String>, InitDataError> {
    let mut params = BTreeMap::new();
    for pair in init_data.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| InitDataError::Malformed(pair.to_string()))?;
        let value = urlencoding::decode(value)
            .map_err(|e| InitDataError::Malformed(e.to_string()))?;
        params.insert(key.to_string(), value.into_owned());
    }
    Ok(params)
}

fn data_check_string(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .filter(|(key, _)| key.as_str() != "hash")
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("\n")
}

fn secret_key(bot_token: &str) -> Result<Vec<u8>, InitDataError> {
    let mut mac = HmacSha256::new_from_slice(b"WebAppData")
        .map_err(|e| InitDataError::Malformed(e.to_string()))?;
    mac.update(bot_token.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// 校验 initData 并返回其中的用户
pub fn verify(
    init_data: &str,
    bot_token: &str,
    max_age_secs: i64,
    now: DateTime<Utc>,
) -> Result<TelegramUser, InitDataError> {
    let params = parse_pairs(init_data)?;
    let received = params
        .get("hash")
        .ok_or(InitDataError::MissingField("hash"))?;
    let received = hex::decode(received).map_err(|_| InitDataError::InvalidHash)?;

    let mut mac = HmacSha256::new_from_slice(&secret_key(bot_token)?)
        .map_err(|e| InitDataError::Malformed(e.to_string()))?;
    mac.update(data_check_string(&params).as_bytes());
    mac.verify_slice(&received)
        .map_err(|_| InitDataError::InvalidHash)?;

    let auth_date: i64 = params
        .get("auth_date")
        .ok_or(InitDataError::MissingField("auth_date"))?
        .parse()
        .map_err(|_| InitDataError::Malformed("auth_date".to_string()))?;
    if now.timestamp() - auth_date > max_age_secs {
        return Err(InitDataError::Expired);
    }

    let user_json = params
        .get("user")
        .ok_or(InitDataError::MissingField("user"))?;
    serde_json::from_str(user_json).map_err(|e| InitDataError::Malformed(e.to_string()))
}

/// 用 bot token 对字段签名，生成合法的 initData（测试与本地调试使用）
pub fn sign(fields: &[(&str, &str)], bot_token: &str) -> Result<String, InitDataError> {
    let params: BTreeMap<String, String> = fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let mut mac = HmacSha256::new_from_slice(&secret_key(bot_token)?)
        .map_err(|e| InitDataError::Malformed(e.to_string()))?;
    mac.update(data_check_string(&params).as_bytes());
    let hash = hex::encode(mac.finalize().into_bytes());

    let mut query: Vec<String> = fields
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect();
    query.push(format!("hash={}", hash));
    Ok(query.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "123456:TEST-TOKEN";
    const USER: &str = r#"{"id":42,"first_name":"Ivan","username":"ivan"}"#;

    fn signed(auth_date: i64) -> String {
        let auth_date = auth_date.to_string();
        sign(
            &[("auth_date", auth_date.as_str()), ("query_id", "AAH"), ("user", USER)],
            TOKEN,
        )
        .unwrap()
    }

    #[test]
    fn test_verify_valid_init_data() {
        let now = Utc::now();
        let user = verify(&signed(now.timestamp()), TOKEN, 3600, now).unwrap();
        assert_eq!(user.id, 42);
        assert_eq!(user.first_name, "Ivan");
        assert_eq!(user.username.as_deref(), Some("ivan"));
    }

    #[test]
    fn test_verify_rejects_wrong_token() {
        let now = Utc::now();
        let result = verify(&signed(now.timestamp()), "other-token", 3600, now);
        assert_eq!(result.unwrap_err(), InitDataError::InvalidHash);
    }

    #[test]
    fn test_verify_rejects_tampered_field() {
        let now = Utc::now();
        let tampered = signed(now.timestamp()).replace("query_id=AAH", "query_id=BBB");
        assert_eq!(
            verify(&tampered, TOKEN, 3600, now).unwrap_err(),
            InitDataError::InvalidHash
        );
    }

    #[test]
    fn test_verify_rejects_expired() {
        let now = Utc::now();
        let old = signed(now.timestamp() - 7200);
        assert_eq!(verify(&old, TOKEN, 3600, now).unwrap_err(), InitDataError::Expired);
    }

    #[test]
    fn test_verify_missing_hash() {
        let init_data = "auth_date=1&user=%7B%22id%22%3A1%7D";
        assert_eq!(
            verify(init_data, TOKEN, 3600, Utc::now()).unwrap_err(),
            InitDataError::MissingField("hash")
        );
    }
}
