//! Telegram 课程平台服务
//!
//! 作者在 Telegram Mini App 中创建课程并按学习流（stream）开课，
//! 学员支付后报名，课时按排期逐步开放，开放提醒与作者广播通过 Bot 推送。
//!
//! ## 核心功能
//!
//! - **课程管理**：课程、模块、课时的 CRUD 与排序
//! - **学习流**：开课批次的生命周期、名额与课时排期
//! - **支付**：订单状态机、签名回调、促销码名额占用
//! - **通知**：广播与课时开放提醒，失败按指数退避重试
//! - **聊天**：学习流内的成员讨论
//!
//! ## 模块结构
//!
//! - `dto`: 请求和响应的数据传输对象
//! - `models`: 领域实体
//! - `repository`: 仓储 trait 及 PostgreSQL / 内存实现
//! - `service`: 业务逻辑
//! - `telegram`: initData 校验与 Bot API 客户端
//! - `handlers` / `routes` / `middleware`: HTTP 层
//! - `worker`: 后台任务
//!
//! ## 技术栈
//!
//! - Web 框架：Axum
//! - 数据访问：sqlx (PostgreSQL)
//! - 数据验证：validator
//! - 序列化：serde (camelCase)

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod service;
pub mod state;
pub mod telegram;
pub mod worker;

pub use error::{ApiError, Result};
pub use repository::Repositories;
pub use state::AppState;
