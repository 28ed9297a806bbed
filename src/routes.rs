//! 路由注册
//! 创建所有 API 路由并应用中间件

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

use crate::{auth, handlers, middleware::AppState};

/// 创建应用路由
pub fn create_router(state: Arc<AppState>) -> Router {
    // 公开端点（健康检查）
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check));

    // 登录无需认证
    let auth_routes = Router::new().route("/api/v1/auth/login", post(handlers::auth::login));

    // 管理员路由
    let admin_routes = Router::new()
        .route("/api/v1/admin/users", post(handlers::admin::create_user))
        .route("/api/v1/admin/audit/search", get(handlers::admin::search_audit))
        .route("/api/v1/admin/audit/recent", get(handlers::admin::recent_audit))
        .route(
            "/api/v1/admin/audit/users/{username}",
            get(handlers::admin::user_audit),
        )
        .route("/api/v1/admin/audit/stats", get(handlers::admin::audit_statistics))
        .layer(axum::middleware::from_fn(auth::require_admin));

    // 需要认证的路由
    let authenticated_routes = Router::new()
        // 当前会话
        .route("/api/v1/auth/me", get(handlers::auth::me))
        .route("/api/v1/auth/logout", post(handlers::auth::logout))

        // 文件浏览
        .route("/api/v1/buckets", get(handlers::files::list_buckets))
        .route(
            "/api/v1/buckets/{bucket}/objects",
            get(handlers::files::list_objects),
        )
        .route(
            "/api/v1/buckets/{bucket}/objects/{*key}",
            get(handlers::files::download_object)
                .put(handlers::files::upload_object)
                .delete(handlers::files::delete_object),
        )
        .route(
            "/api/v1/buckets/{bucket}/presign/{*key}",
            get(handlers::files::presign_object),
        )
        .merge(admin_routes)
        .layer(axum::middleware::from_fn_with_state(
            state.jwt_service.clone(),
            auth::session_auth_middleware,
        ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    // 组合所有路由
    Router::new()
        .merge(public_routes)
        .merge(auth_routes)
        .merge(authenticated_routes)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.security.max_upload_bytes))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::ip_whitelist_middleware,
        ))
        .layer(axum::middleware::from_fn(crate::middleware::request_tracking_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
        .with_state(state)
}
