//! 资源网关：每次对象存储调用前先查访问策略
//!
//! 策略拒绝的请求直接返回 `Forbidden`，不会触达存储后端。

use crate::{
    error::GatewayError,
    models::{
        file::{FileRecord, PresignedUrl},
        role::{Operation, Role},
    },
    repository::ObjectStore,
    services::access_policy::AccessPolicy,
};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

pub struct ResourceGateway {
    store: Arc<dyn ObjectStore>,
    policy: AccessPolicy,
}

fn outcome_label(error: Option<&GatewayError>) -> &'static str {
    match error {
        None => "ok",
        Some(GatewayError::Forbidden) => "forbidden",
        Some(GatewayError::NotFound(_)) => "not_found",
        Some(GatewayError::BackendUnavailable(_)) => "unavailable",
        Some(GatewayError::Unknown(_)) => "error",
    }
}

impl ResourceGateway {
    pub fn new(store: Arc<dyn ObjectStore>, policy: AccessPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    fn authorize(&self, role: Role, operation: Operation, scope: &str) -> Result<(), GatewayError> {
        if self.policy.is_allowed(role, operation, scope) {
            return Ok(());
        }

        warn!(
            role = %role,
            operation = %operation,
            bucket = %scope,
            "Operation denied by access policy"
        );
        let error = GatewayError::Forbidden;
        record(operation, Some(&error));
        Err(error)
    }

    fn finish<T>(
        &self,
        operation: Operation,
        scope: &str,
        key: Option<&str>,
        result: Result<T, GatewayError>,
    ) -> Result<T, GatewayError> {
        let error = result.as_ref().err();
        record(operation, error);

        match error {
            None => info!(
                operation = %operation,
                bucket = %scope,
                key = key.unwrap_or_default(),
                "Storage operation completed"
            ),
            Some(err) => warn!(
                operation = %operation,
                bucket = %scope,
                key = key.unwrap_or_default(),
                error = %err,
                "Storage operation failed"
            ),
        }

        result
    }

    /// 列出 bucket 中的对象，按修改时间倒序（同一时间按键升序）
    pub async fn list_objects(&self, role: Role, scope: &str) -> Result<Vec<FileRecord>, GatewayError> {
        self.authorize(role, Operation::List, scope)?;

        let result = self.store.list(scope).await.map(|objects| {
            let mut records: Vec<FileRecord> = objects.into_iter().map(FileRecord::from).collect();
            records.sort_by(|a, b| {
                b.last_modified
                    .cmp(&a.last_modified)
                    .then_with(|| a.key.cmp(&b.key))
            });
            records
        });

        self.finish(Operation::List, scope, None, result)
    }

    pub async fn get_object(&self, role: Role, scope: &str, key: &str) -> Result<Vec<u8>, GatewayError> {
        self.authorize(role, Operation::Get, scope)?;
        let result = self.store.get(scope, key).await;
        self.finish(Operation::Get, scope, Some(key), result)
    }

    pub async fn put_object(
        &self,
        role: Role,
        scope: &str,
        key: &str,
        content: &[u8],
        content_type: Option<&str>,
    ) -> Result<(), GatewayError> {
        self.authorize(role, Operation::Put, scope)?;
        let result = self.store.put(scope, key, content, content_type).await;
        self.finish(Operation::Put, scope, Some(key), result)
    }

    pub async fn delete_object(&self, role: Role, scope: &str, key: &str) -> Result<(), GatewayError> {
        self.authorize(role, Operation::Delete, scope)?;
        let result = self.store.delete(scope, key).await;
        self.finish(Operation::Delete, scope, Some(key), result)
    }

    /// 生成限时下载链接；与下载使用同一权限检查，过期由后端校验
    pub async fn presign_download(
        &self,
        role: Role,
        scope: &str,
        key: &str,
        ttl_secs: u32,
    ) -> Result<PresignedUrl, GatewayError> {
        self.authorize(role, Operation::Get, scope)?;

        let issued_at = Utc::now();
        let result = self
            .store
            .presign_get(scope, key, ttl_secs)
            .await
            .map(|url| PresignedUrl {
                url,
                expires_in_secs: u64::from(ttl_secs),
                expires_at: issued_at + Duration::seconds(i64::from(ttl_secs)),
            });

        self.finish(Operation::Get, scope, Some(key), result)
    }
}

fn record(operation: Operation, error: Option<&GatewayError>) {
    metrics::counter!(
        "gateway_operations_total",
        "operation" => operation.as_str(),
        "outcome" => outcome_label(error)
    )
    .increment(1);
}
