//! 文件浏览与上传下载的 HTTP 处理器
//!
//! 所有权限判断都在 `ResourceGateway` 内完成，这里只做参数整理。

use crate::{
    auth::middleware::AuthContext,
    config::MAX_PRESIGN_TTL_SECS,
    error::AppError,
    middleware::AppState,
    models::{
        file::{BucketSummary, PresignQuery},
        role::Role,
    },
    services::AccessPolicy,
};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

/// 角色可见的 bucket 及其能力，按 public / projects / hr / logs 顺序
pub fn bucket_summaries(policy: &AccessPolicy, role: Role) -> Vec<BucketSummary> {
    policy
        .ordered_scopes_for(role)
        .into_iter()
        .map(|name| BucketSummary {
            capabilities: policy.capabilities(role, &name),
            name,
        })
        .collect()
}

fn require_key(key: &str) -> Result<&str, AppError> {
    let key = key.trim_start_matches('/');
    if key.is_empty() {
        return Err(AppError::validation("Object key is required"));
    }
    Ok(key)
}

/// 下载文件名：取键的最后一段，去掉会破坏头部的字符
fn attachment_disposition(key: &str) -> HeaderValue {
    let name: String = key
        .rsplit('/')
        .next()
        .unwrap_or(key)
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect();

    HeaderValue::from_str(&format!("attachment; filename=\"{}\"", name))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// 列出可访问的 bucket
pub async fn list_buckets(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
) -> Result<impl IntoResponse, AppError> {
    let buckets = bucket_summaries(&state.policy, auth_context.role);

    Ok(Json(json!({
        "buckets": buckets,
        "count": buckets.len()
    })))
}

/// 列出 bucket 中的文件
pub async fn list_objects(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(bucket): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let files = state
        .gateway
        .list_objects(auth_context.role, &bucket)
        .await?;

    Ok(Json(json!({
        "bucket": bucket,
        "capabilities": state.policy.capabilities(auth_context.role, &bucket),
        "files": files,
        "count": files.len()
    })))
}

/// 下载文件
pub async fn download_object(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let key = require_key(&key)?;
    let content = state
        .gateway
        .get_object(auth_context.role, &bucket, key)
        .await?;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            ),
            (header::CONTENT_DISPOSITION, attachment_disposition(key)),
        ],
        content,
    ))
}

/// 上传文件（请求体即文件内容）
pub async fn upload_object(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let key = require_key(&key)?;
    if key.ends_with('/') {
        return Err(AppError::validation("Object key must not end with '/'"));
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());

    state
        .gateway
        .put_object(auth_context.role, &bucket, key, &body, content_type)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "File uploaded",
            "bucket": bucket,
            "key": key,
            "size_bytes": body.len()
        })),
    ))
}

/// 删除文件
pub async fn delete_object(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let key = require_key(&key)?;
    state
        .gateway
        .delete_object(auth_context.role, &bucket, key)
        .await?;

    Ok(Json(json!({
        "message": "File deleted",
        "bucket": bucket,
        "key": key
    })))
}

/// 生成限时下载链接
pub async fn presign_object(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path((bucket, key)): Path<(String, String)>,
    Query(query): Query<PresignQuery>,
) -> Result<impl IntoResponse, AppError> {
    let key = require_key(&key)?;
    let ttl_secs = query
        .ttl_secs
        .unwrap_or(state.config.storage.presign_ttl_secs);

    if ttl_secs == 0 || ttl_secs > MAX_PRESIGN_TTL_SECS {
        return Err(AppError::Validation(format!(
            "ttl_secs must be between 1 and {}",
            MAX_PRESIGN_TTL_SECS
        )));
    }
    let ttl_secs = u32::try_from(ttl_secs)
        .map_err(|_| AppError::validation("ttl_secs is out of range"))?;

    let presigned = state
        .gateway
        .presign_download(auth_context.role, &bucket, key, ttl_secs)
        .await?;

    Ok(Json(presigned))
}
