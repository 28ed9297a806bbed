//! HTTP 中间件
//! 请求追踪、IP 白名单

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    auth::jwt::JwtService,
    config::AppConfig,
    error::AppError,
    services::{AccessPolicy, AuditQuery, AuthService, ResourceGateway},
};

/// 应用状态
///
/// 所有服务在启动时构建后不再变化，只有会话吊销表在 `JwtService` 内部可变。
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub policy: AccessPolicy,
    pub gateway: Arc<ResourceGateway>,
    pub audit_query: Arc<AuditQuery>,
    pub auth_service: Arc<AuthService>,
    pub jwt_service: Arc<JwtService>,
}

/// 请求追踪中间件
/// 为每个请求生成 trace_id 和 request_id，并记录指标
pub async fn request_tracking_middleware(req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(req.headers());
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().clone();
    // 日志里只记录路径，查询串可能包含检索词
    let path = req.uri().path().to_string();

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        request_id = %request_id,
        method = %method,
        path = %path,
    );

    async move {
        let start = Instant::now();
        let mut response = next.run(req).await;
        let elapsed = start.elapsed();

        // 指标标签使用静态字符串，避免基数爆炸
        let status = response.status().as_u16();
        let method_name = match method.as_str() {
            "GET" => "GET",
            "POST" => "POST",
            "PUT" => "PUT",
            "DELETE" => "DELETE",
            _ => "OTHER",
        };
        let status_class = match status {
            200..=299 => "2xx",
            300..=399 => "3xx",
            400..=499 => "4xx",
            _ => "5xx",
        };

        metrics::counter!("http_requests_total", "method" => method_name, "status" => status_class)
            .increment(1);
        metrics::histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());

        tracing::info!(
            method = %method,
            path = %path,
            status = status,
            elapsed_ms = elapsed.as_millis() as u64,
            "Request completed"
        );

        if let Ok(value) = HeaderValue::from_str(&trace_id) {
            response.headers_mut().insert("x-trace-id", value);
        }
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert("x-request-id", value);
        }

        response
    }
    .instrument(span)
    .await
}

/// 从请求头中提取或生成 trace_id
fn extract_or_generate_trace_id(headers: &HeaderMap) -> String {
    headers
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty() && s.len() <= 128)
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// IP 白名单中间件
pub async fn ip_whitelist_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(allowed_ips) = &state.config.security.allowed_ips {
        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let client_ip = get_client_ip(req.headers(), peer, state.config.security.trust_proxy);

        if !allowed_ips.iter().any(|ip| ip.trim() == client_ip) {
            tracing::warn!(client_ip = %client_ip, "IP not in whitelist");
            return Err(AppError::Forbidden);
        }

        tracing::debug!(client_ip = %client_ip, "IP allowed by whitelist");
    }

    Ok(next.run(req).await)
}

/// 获取客户端 IP 地址
///
/// 信任代理时优先 X-Forwarded-For / X-Real-IP，否则使用 TCP 对端地址。
fn get_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    if trust_proxy {
        // X-Forwarded-For 可能包含多个 IP，取第一个
        if let Some(first_ip) = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            return first_ip.to_string();
        }

        if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
            return real_ip.trim().to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_or_generate_trace_id() {
        let mut headers = HeaderMap::new();
        headers.insert("x-trace-id", "test-trace-123".parse().unwrap());

        let trace_id = extract_or_generate_trace_id(&headers);
        assert_eq!(trace_id, "test-trace-123");

        let headers = HeaderMap::new();
        let trace_id = extract_or_generate_trace_id(&headers);
        assert!(!trace_id.is_empty());
        assert_ne!(trace_id, "test-trace-123");
    }

    #[test]
    fn test_client_ip_from_proxy_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "10.1.1.1, 172.16.0.1".parse().unwrap());
        assert_eq!(get_client_ip(&headers, None, true), "10.1.1.1");
        assert_eq!(get_client_ip(&headers, None, false), "unknown");

        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "192.168.0.9".parse().unwrap());
        assert_eq!(get_client_ip(&headers, None, true), "192.168.0.9");
    }

    #[test]
    fn test_client_ip_from_peer_when_proxy_untrusted() {
        let peer: SocketAddr = "10.0.0.1:51234".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.5".parse().unwrap());

        assert_eq!(get_client_ip(&headers, Some(peer), false), "10.0.0.1");
        assert_eq!(get_client_ip(&headers, Some(peer), true), "203.0.113.5");
        assert_eq!(get_client_ip(&HeaderMap::new(), Some(peer), true), "10.0.0.1");
    }
}
