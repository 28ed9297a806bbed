//! 管理员接口：创建用户与审计日志查询
//! 路由层已通过 `require_admin` 限制为管理员

use crate::{
    auth::middleware::AuthContext,
    error::AppError,
    middleware::AppState,
    models::{
        audit::{AuditLimitQuery, AuditSearchQuery, DateRange},
        auth::CreateUserRequest,
    },
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

/// 创建用户
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let created = state.auth_service.create_user(&auth_context, req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// 搜索审计日志
pub async fn search_audit(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuditSearchQuery>,
) -> Result<impl IntoResponse, AppError> {
    let range = DateRange {
        start: query.start,
        end: query.end,
    };
    let events = state
        .audit_query
        .search(&query.q, query.size, Some(range))
        .await?;

    Ok(Json(json!({
        "events": events,
        "count": events.len()
    })))
}

/// 最近的审计事件
pub async fn recent_audit(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuditLimitQuery>,
) -> Result<impl IntoResponse, AppError> {
    let events = state.audit_query.recent_events(query.limit).await?;

    Ok(Json(json!({
        "events": events,
        "count": events.len()
    })))
}

/// 某个用户的审计事件
pub async fn user_audit(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
    Query(query): Query<AuditLimitQuery>,
) -> Result<impl IntoResponse, AppError> {
    let events = state
        .audit_query
        .search_by_user(&username, query.limit)
        .await?;

    Ok(Json(json!({
        "username": username,
        "events": events,
        "count": events.len()
    })))
}

/// 审计事件统计
pub async fn audit_statistics(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let stats = state.audit_query.event_statistics().await?;
    Ok(Json(stats))
}
