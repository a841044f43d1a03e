//! Telegram 认证中间件
//!
//! 校验 `Authorization: tma <initData>` 并将 [`TelegramUser`] 注入请求扩展。
//! 开发环境开启 `telegram.skip_auth` 时接受 `X-Debug-User-Id`。

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::models::TelegramUser;
use crate::state::AppState;
use crate::telegram::init_data;

pub const DEBUG_USER_HEADER: &str = "x-debug-user-id";
const SCHEME: &str = "tma ";

/// 认证中间件，挂在需要登录的路由上
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(&state, &request) {
        Ok(user) => {
            debug!(user_id = user.id, "Request authenticated");
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

fn authenticate(state: &AppState, request: &Request) -> Result<TelegramUser, ApiError> {
    let headers = request.headers();

    if state.auth.skip_auth {
        if let Some(value) = headers.get(DEBUG_USER_HEADER) {
            let id = value
                .to_str()
                .ok()
                .and_then(|v| v.trim().parse::<i64>().ok())
                .ok_or_else(|| ApiError::Unauthorized("调试用户ID无效".to_string()))?;
            return Ok(TelegramUser::with_id(id));
        }
    }

    let header = headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("缺少认证信息".to_string()))?;
    let raw = header
        .strip_prefix(SCHEME)
        .ok_or_else(|| ApiError::Unauthorized("认证方式必须为 tma".to_string()))?;

    init_data::verify(
        raw.trim(),
        &state.auth.bot_token,
        state.auth.init_data_max_age_secs,
        Utc::now(),
    )
    .map_err(|e| {
        warn!(error = %e, "Telegram init data rejected");
        ApiError::Unauthorized(e.to_string())
    })
}
