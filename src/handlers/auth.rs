//! 认证相关的 HTTP 处理器

use crate::{
    auth::middleware::AuthContext,
    error::AppError,
    handlers::files::bucket_summaries,
    middleware::AppState,
    models::auth::{LoginRequest, LoginResponse, MeResponse},
};
use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

/// 登录
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.auth_service.login(req).await?;
    let buckets = bucket_summaries(&state.policy, session.role);

    Ok(Json(LoginResponse {
        token: session.token,
        expires_in: session.expires_in,
        username: session.username,
        role: session.role,
        buckets,
    }))
}

/// 登出
pub async fn logout(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
) -> Result<impl IntoResponse, AppError> {
    state.auth_service.logout(&auth_context);
    Ok(Json(json!({ "message": "Logged out" })))
}

/// 当前会话信息
pub async fn me(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(MeResponse {
        buckets: bucket_summaries(&state.policy, auth_context.role),
        username: auth_context.username,
        role: auth_context.role,
    }))
}
