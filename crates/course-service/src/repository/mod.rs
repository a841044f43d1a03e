//! 仓储层
//!
//! 提供所有实体的数据访问接口，封装存储细节。
//!
//! - 仓储只负责数据持久化，不包含业务逻辑
//! - 并发敏感的操作（状态迁移、名额占用、任务领取）以单条条件更新实现
//! - 定义 trait 接口，PostgreSQL 与内存两种实现可互换

pub mod memory;
pub mod postgres;
mod traits;

use std::sync::Arc;

use course_shared::database::Database;

use crate::error::Result;

pub use traits::*;

/// 仓储集合，按存储后端装配
#[derive(Clone)]
pub struct Repositories {
    pub courses: Arc<dyn CourseRepositoryTrait>,
    pub streams: Arc<dyn StreamRepositoryTrait>,
    pub payments: Arc<dyn PaymentRepositoryTrait>,
    pub promo_codes: Arc<dyn PromoCodeRepositoryTrait>,
    pub notifications: Arc<dyn NotificationRepositoryTrait>,
    pub chat: Arc<dyn ChatRepositoryTrait>,
    database: Option<Database>,
}

impl Repositories {
    /// PostgreSQL 后端
    pub fn postgres(db: Database) -> Self {
        let pool = db.pool().clone();
        Self {
            courses: Arc::new(postgres::CourseRepository::new(pool.clone())),
            streams: Arc::new(postgres::StreamRepository::new(pool.clone())),
            payments: Arc::new(postgres::PaymentRepository::new(pool.clone())),
            promo_codes: Arc::new(postgres::PromoCodeRepository::new(pool.clone())),
            notifications: Arc::new(postgres::NotificationRepository::new(pool.clone())),
            chat: Arc::new(postgres::ChatRepository::new(pool)),
            database: Some(db),
        }
    }

    /// 内存后端
    pub fn memory() -> Self {
        Self {
            courses: Arc::new(memory::MemoryCourseRepository::new()),
            streams: Arc::new(memory::MemoryStreamRepository::new()),
            payments: Arc::new(memory::MemoryPaymentRepository::new()),
            promo_codes: Arc::new(memory::MemoryPromoCodeRepository::new()),
            notifications: Arc::new(memory::MemoryNotificationRepository::new()),
            chat: Arc::new(memory::MemoryChatRepository::new()),
            database: None,
        }
    }

    /// 存储可用性检查（就绪探针使用）
    pub async fn ping(&self) -> Result<()> {
        if let Some(db) = &self.database {
            db.health_check().await?;
        }
        Ok(())
    }
}
