//! 应用状态定义
//!
//! 包含 Axum 路由共享的应用状态

use std::sync::Arc;

use course_shared::config::AppConfig;

use crate::repository::Repositories;
use crate::service::{
    ChatService, CourseService, NotificationService, PaymentService, PromoService, StreamService,
};
use crate::telegram::MessageSender;

/// 鉴权相关配置
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub bot_token: String,
    pub init_data_max_age_secs: i64,
    /// 接受 `X-Debug-User-Id` 调试头
    pub skip_auth: bool,
}

/// Axum 应用共享状态
///
/// 服务与仓储都通过 Arc 共享，clone 开销很小
#[derive(Clone)]
pub struct AppState {
    pub repositories: Repositories,
    pub courses: Arc<CourseService>,
    pub streams: Arc<StreamService>,
    pub promos: Arc<PromoService>,
    pub payments: Arc<PaymentService>,
    pub notifications: Arc<NotificationService>,
    pub chat: Arc<ChatService>,
    pub auth: AuthSettings,
}

impl AppState {
    /// 按存储后端和消息发送器装配所有服务
    pub fn new(
        config: &AppConfig,
        repositories: Repositories,
        sender: Arc<dyn MessageSender>,
    ) -> Self {
        let repos = &repositories;
        let promos = Arc::new(PromoService::new(
            repos.courses.clone(),
            repos.streams.clone(),
            repos.promo_codes.clone(),
        ));

        Self {
            courses: Arc::new(CourseService::new(
                repos.courses.clone(),
                repos.streams.clone(),
            )),
            streams: Arc::new(StreamService::new(
                repos.courses.clone(),
                repos.streams.clone(),
            )),
            payments: Arc::new(PaymentService::new(
                repos.courses.clone(),
                repos.streams.clone(),
                repos.payments.clone(),
                promos.clone(),
                &config.payments,
            )),
            notifications: Arc::new(NotificationService::new(
                repos.courses.clone(),
                repos.streams.clone(),
                repos.notifications.clone(),
                sender,
            )),
            chat: Arc::new(ChatService::new(
                repos.courses.clone(),
                repos.streams.clone(),
                repos.chat.clone(),
            )),
            promos,
            auth: AuthSettings {
                bot_token: config.telegram.bot_token.clone(),
                init_data_max_age_secs: config.telegram.init_data_max_age_secs,
                skip_auth: config.telegram.skip_auth && !config.is_production(),
            },
            repositories,
        }
    }
}
