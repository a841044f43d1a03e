//! Telegram 课程平台 API 服务

use std::sync::Arc;

use axum::{Router, http::HeaderValue, middleware};
use course_service::{
    Repositories, routes,
    state::AppState,
    telegram::{BotClient, MessageSender},
    worker::{LessonReleaseWorker, NotificationWorker, PaymentExpiryWorker},
};
use course_shared::{
    config::{AppConfig, StorageBackend},
    database::Database,
    observability::{self, middleware as obs_middleware},
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

const SERVICE_NAME: &str = "course-api";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load(SERVICE_NAME)?;

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!("Starting {} on {}", SERVICE_NAME, config.server_addr());

    if config.telegram.bot_token.is_empty() {
        if config.is_production() {
            anyhow::bail!("telegram.bot_token must be set in production environment");
        }
        warn!("telegram.bot_token is empty - init data verification and bot messages will fail");
    }
    if config.telegram.skip_auth {
        if config.is_production() {
            warn!("telegram.skip_auth is ignored in production environment");
        } else {
            warn!("telegram.skip_auth enabled - X-Debug-User-Id header is accepted");
        }
    }
    if config.payments.callback_secret.is_empty() {
        warn!("payments.callback_secret is empty - payment callbacks will be rejected");
    }

    let repositories = match config.storage.backend {
        StorageBackend::Postgres => {
            let db = Database::connect(&config.database).await?;
            db.run_migrations().await?;
            Repositories::postgres(db)
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage - data is lost on restart");
            Repositories::memory()
        }
    };

    let sender: Arc<dyn MessageSender> = Arc::new(BotClient::new(
        &config.telegram.api_base_url,
        &config.telegram.bot_token,
    )?);
    let state = AppState::new(&config, repositories, sender);

    spawn_workers(&config, &state);

    let app: Router = routes::app(state)
        .layer(cors_layer(&config))
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id));

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// 启动后台 Worker，进程退出时随运行时一起结束
fn spawn_workers(config: &AppConfig, state: &AppState) {
    let workers = &config.workers;

    let release = LessonReleaseWorker::new(
        state.streams.clone(),
        state.notifications.clone(),
        workers.release_poll_secs,
    );
    tokio::spawn(async move { release.run().await });

    let notification = NotificationWorker::new(state.notifications.clone(), workers);
    tokio::spawn(async move { notification.run().await });

    let expiry = PaymentExpiryWorker::new(state.payments.clone(), workers.reservation_sweep_secs);
    tokio::spawn(async move { expiry.run().await });
}

/// CORS：`COURSE_CORS_ORIGINS` 为逗号分隔的来源列表，`*` 表示允许所有来源
fn cors_layer(config: &AppConfig) -> CorsLayer {
    let allowed_origins = std::env::var("COURSE_CORS_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:5173".to_string());

    if allowed_origins == "*" {
        if config.is_production() {
            warn!("COURSE_CORS_ORIGINS=\"*\" 在生产环境中不安全，请设置为具体域名");
        }
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    info!("CORS allowed_origins: {}", allowed_origins);
    let origins: Vec<_> = allowed_origins
        .split(',')
        .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// 监听关闭信号（SIGTERM 或 Ctrl+C）
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "注册 Ctrl+C 处理器失败");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "注册 SIGTERM 处理器失败");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
