//! 业务服务层
//!
//! 服务只依赖仓储 trait，Postgres 与内存两种存储共用同一套业务逻辑。

mod access;
mod chat_service;
mod course_service;
mod notification_service;
mod payment_service;
mod promo_service;
mod stream_service;

pub use access::{StreamAccess, StreamRole};
pub use chat_service::ChatService;
pub use course_service::CourseService;
pub use notification_service::{DeliveryReport, NotificationService, retry_backoff};
pub use payment_service::{PaymentService, sign_callback};
pub use promo_service::{PromoService, normalize_code};
pub use stream_service::StreamService;
