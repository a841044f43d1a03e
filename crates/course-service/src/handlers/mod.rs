//! HTTP 请求处理器模块
//!
//! 处理器只做参数提取与校验，业务逻辑在 service 层

pub mod chat;
pub mod course;
pub mod health;
pub mod notification;
pub mod payment;
pub mod promo;
pub mod stream;
pub mod user;
