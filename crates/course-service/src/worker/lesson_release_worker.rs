//! 课时开放 Worker
//!
//! 定期领取到期的课时排期并标记为已开放；学习流开启了开放提醒时，
//! 为每个开放的课时生成一条 `lesson_released` 通知，由通知 Worker 投递。

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use course_shared::observability::metrics;
use tracing::{error, info};

use crate::error::Result;
use crate::service::{NotificationService, StreamService};

const BATCH_SIZE: i64 = 100;

pub struct LessonReleaseWorker {
    streams: Arc<StreamService>,
    notifications: Arc<NotificationService>,
    poll_interval: Duration,
}

impl LessonReleaseWorker {
    pub fn new(
        streams: Arc<StreamService>,
        notifications: Arc<NotificationService>,
        poll_interval_secs: u64,
    ) -> Self {
        Self {
            streams,
            notifications,
            poll_interval: Duration::from_secs(poll_interval_secs),
        }
    }

    /// 主循环：持续处理直到进程退出
    pub async fn run(&self) {
        info!(poll_interval = ?self.poll_interval, "LessonReleaseWorker 已启动");

        loop {
            if let Err(e) = self.run_once(Utc::now()).await {
                error!(error = %e, "课时开放处理出错");
            }
            metrics::set_worker_last_run("lesson_release_worker");
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// 处理一轮，返回开放的课时数
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<usize> {
        let released = self.streams.release_due_lessons(now, BATCH_SIZE).await?;

        for (stream, lesson) in &released {
            if !stream.notify_on_release {
                continue;
            }
            // 单条通知失败不影响其他课时，排期已标记为开放
            if let Err(e) = self
                .notifications
                .enqueue_lesson_released(stream, lesson, now)
                .await
            {
                error!(
                    stream_id = stream.id,
                    lesson_id = lesson.id,
                    error = %e,
                    "创建课时开放通知失败"
                );
            }
        }

        if !released.is_empty() {
            info!(count = released.len(), "课时已开放");
        }
        Ok(released.len())
    }
}
