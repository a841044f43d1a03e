//! 后台 Worker
//!
//! 所有 Worker 都以固定间隔轮询存储，依赖条件更新领取任务，可多实例并行运行。

mod lesson_release_worker;
mod notification_worker;
mod payment_expiry_worker;

pub use lesson_release_worker::LessonReleaseWorker;
pub use notification_worker::NotificationWorker;
pub use payment_expiry_worker::PaymentExpiryWorker;
