//! 健康检查处理器
//! 提供 /health 和 /ready 端点

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Instant;

use crate::{config::StorageBackendKind, middleware::AppState};

/// 存活探针响应
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// 就绪探针响应
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub checks: Vec<HealthCheck>,
}

/// 健康检查项
#[derive(Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthCheck {
    fn from_result(name: &str, result: Result<(), String>) -> Self {
        Self {
            name: name.to_string(),
            status: if result.is_ok() { "healthy" } else { "unhealthy" }.to_string(),
            message: result.err(),
        }
    }
}

static APP_START_TIME: OnceLock<Instant> = OnceLock::new();

/// 设置应用启动时间（在 main.rs 中调用）
pub fn set_start_time() {
    let _ = APP_START_TIME.set(Instant::now());
}

/// 获取应用运行时间（秒）
pub fn get_uptime() -> u64 {
    APP_START_TIME
        .get()
        .map_or(0, |start| start.elapsed().as_secs())
}

/// 存活探针
/// 快速响应，不检查依赖
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: get_uptime(),
    })
}

/// 就绪探针
/// 只检查本地可判定的前提条件，不调用外部服务
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> Json<ReadinessResponse> {
    let config = &state.config;

    let storage = match config.storage.backend {
        StorageBackendKind::Local => {
            if std::path::Path::new(&config.storage.local_path).is_dir() {
                Ok(())
            } else {
                Err(format!(
                    "Local storage path {} does not exist",
                    config.storage.local_path
                ))
            }
        }
        StorageBackendKind::S3 => Ok(()),
    };

    let identity = if config.identity.user_pool_id.is_empty() || config.identity.client_id.is_empty()
    {
        Err("Cognito user pool is not configured".to_string())
    } else {
        Ok(())
    };

    let audit = if config.audit.endpoint.is_empty() {
        Err("Audit search endpoint is not configured".to_string())
    } else {
        Ok(())
    };

    let checks = vec![
        HealthCheck::from_result("storage", storage),
        HealthCheck::from_result("identity", identity),
        HealthCheck::from_result("audit", audit),
    ];
    let all_healthy = checks.iter().all(|c| c.status == "healthy");

    Json(ReadinessResponse {
        ready: all_healthy,
        checks,
    })
}
