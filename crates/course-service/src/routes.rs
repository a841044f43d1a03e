//! 路由配置模块
//!
//! 定义所有 REST API 端点的路由映射。
//! 除探针与支付回调外，`/api/v1` 下的路由都经过 Telegram 认证中间件。

use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};

use crate::{handlers, middleware::auth_middleware, state::AppState};

/// 课程、模块与课时
fn course_routes() -> Router<AppState> {
    Router::new()
        .route("/courses", post(handlers::course::create_course))
        .route("/courses", get(handlers::course::list_my_courses))
        .route("/courses/{id}", get(handlers::course::get_course))
        .route("/courses/{id}", put(handlers::course::update_course))
        .route("/courses/{id}", delete(handlers::course::delete_course))
        .route("/courses/{id}/outline", get(handlers::course::get_outline))
        // 模块
        .route("/courses/{id}/blocks", post(handlers::course::create_block))
        .route(
            "/courses/{id}/blocks/order",
            put(handlers::course::reorder_blocks),
        )
        .route("/blocks/{id}", put(handlers::course::update_block))
        .route("/blocks/{id}", delete(handlers::course::delete_block))
        // 课时
        .route("/blocks/{id}/lessons", post(handlers::course::create_lesson))
        .route(
            "/blocks/{id}/lessons/order",
            put(handlers::course::reorder_lessons),
        )
        .route("/lessons/{id}", get(handlers::course::get_lesson))
        .route("/lessons/{id}", put(handlers::course::update_lesson))
        .route("/lessons/{id}", delete(handlers::course::delete_lesson))
}

/// 学习流、报名与排期
fn stream_routes() -> Router<AppState> {
    Router::new()
        .route("/courses/{id}/streams", post(handlers::stream::create_stream))
        .route("/courses/{id}/streams", get(handlers::stream::list_streams))
        .route("/streams/{id}", get(handlers::stream::get_stream))
        .route("/streams/{id}", put(handlers::stream::update_stream))
        .route("/streams/{id}/status", post(handlers::stream::change_status))
        .route("/streams/{id}/enroll", post(handlers::stream::enroll))
        .route(
            "/streams/{id}/lessons",
            get(handlers::stream::student_lessons),
        )
        .route("/streams/{id}/schedule", put(handlers::stream::bulk_schedule))
        .route(
            "/streams/{id}/schedule",
            post(handlers::stream::schedule_lesson),
        )
        .route("/streams/{id}/schedule", get(handlers::stream::list_schedule))
        .route(
            "/streams/{id}/schedule/{lesson_id}",
            delete(handlers::stream::delete_schedule),
        )
}

/// 促销码与支付
fn commerce_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/streams/{id}/promo-codes",
            post(handlers::promo::create_promo_code),
        )
        .route(
            "/streams/{id}/promo-codes",
            get(handlers::promo::list_promo_codes),
        )
        .route(
            "/streams/{id}/promo-codes/check",
            get(handlers::promo::check_promo_code),
        )
        .route(
            "/promo-codes/{id}",
            put(handlers::promo::update_promo_code),
        )
        .route("/payments", post(handlers::payment::create_payment))
        .route("/payments", get(handlers::payment::list_my_payments))
        .route("/payments/{id}", get(handlers::payment::get_payment))
}

/// 通知与聊天
fn community_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/streams/{id}/notifications",
            post(handlers::notification::create_notification),
        )
        .route(
            "/streams/{id}/notifications",
            get(handlers::notification::list_notifications),
        )
        .route(
            "/streams/{id}/chat/messages",
            post(handlers::chat::send_message),
        )
        .route(
            "/streams/{id}/chat/messages",
            get(handlers::chat::list_messages),
        )
}

/// 需要 Telegram 认证的 API
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/me", get(handlers::user::me))
        .merge(course_routes())
        .merge(stream_routes())
        .merge(commerce_routes())
        .merge(community_routes())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// 公开路由：支付回调通过签名认证
pub fn public_routes() -> Router<AppState> {
    Router::new().route(
        "/payments/callback",
        post(handlers::payment::payment_callback),
    )
}

/// 完整应用路由（不含 CORS 与可观测性层，由 main 叠加）
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api/v1",
            public_routes().merge(api_routes(state.clone())),
        )
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .layer(middleware::from_fn(crate::middleware::security_headers))
        .with_state(state)
}
