//! 日期字段解析
//!
//! 接受 RFC 3339 时间戳，或 `YYYY-MM-DD` 形式的日期（按 UTC 零点解释）

use chrono::{DateTime, NaiveDate, Utc};
use validator::ValidationError;

use crate::error::ApiError;

/// 解析日期字符串，无法识别时返回 None
pub fn parse_date_string(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

pub fn validate_date_string(value: &str) -> Result<(), ValidationError> {
    match parse_date_string(value) {
        Some(_) => Ok(()),
        None => Err(ValidationError::new("date")
            .with_message("日期格式无效，应为 RFC3339 或 YYYY-MM-DD".into())),
    }
}

/// 服务层使用：解析必填日期字段
pub fn parse_date_field(field: &str, value: &str) -> Result<DateTime<Utc>, ApiError> {
    parse_date_string(value)
        .ok_or_else(|| ApiError::Validation(format!("{}: 日期格式无效", field)))
}

/// 服务层使用：解析可选日期字段
pub fn parse_optional_date(
    field: &str,
    value: Option<&str>,
) -> Result<Option<DateTime<Utc>>, ApiError> {
    value.map(|v| parse_date_field(field, v)).transpose()
}
