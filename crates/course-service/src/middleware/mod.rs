//! 中间件模块
//!
//! 提供 Telegram 认证与安全响应头中间件

mod auth;
mod security;

pub use auth::{DEBUG_USER_HEADER, auth_middleware};
pub use security::security_headers;
