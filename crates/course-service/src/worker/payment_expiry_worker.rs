//! 待支付订单超时 Worker
//!
//! 定期取消超过保留时长仍未支付的订单，并归还其占用的促销码名额

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use course_shared::observability::metrics;
use tracing::{error, info};

use crate::service::PaymentService;

pub struct PaymentExpiryWorker {
    payments: Arc<PaymentService>,
    poll_interval: Duration,
}

impl PaymentExpiryWorker {
    pub fn new(payments: Arc<PaymentService>, poll_interval_secs: u64) -> Self {
        Self {
            payments,
            poll_interval: Duration::from_secs(poll_interval_secs),
        }
    }

    pub async fn run(&self) {
        info!(poll_interval = ?self.poll_interval, "PaymentExpiryWorker 已启动");

        loop {
            if let Err(e) = self.payments.expire_stale_pending(Utc::now()).await {
                error!(error = %e, "取消超时订单出错");
            }
            metrics::set_worker_last_run("payment_expiry_worker");
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
