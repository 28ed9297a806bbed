//! S3 对象存储后端
//!
//! 基于 rust-s3，按 bucket 名称即时构造客户端；请求签名由 rust-s3 完成。

use super::ObjectStore;
use crate::{
    config::{AwsConfig, StorageConfig},
    error::GatewayError,
    models::file::StoredObject,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use s3::{bucket::Bucket, creds::Credentials, error::S3Error, Region};
use tracing::debug;

pub struct S3ObjectStore {
    region: Region,
    credentials: Credentials,
}

impl S3ObjectStore {
    /// 创建 S3 后端
    ///
    /// 未显式配置访问密钥时由 rust-s3 按环境变量、profile、实例元数据的顺序查找。
    pub fn new(aws: &AwsConfig, storage: &StorageConfig) -> anyhow::Result<Self> {
        let credentials = match aws.resolve_credentials() {
            Some(creds) => Credentials::new(
                Some(&creds.access_key_id),
                Some(&creds.secret_access_key),
                None,
                creds.session_token.as_deref(),
                None,
            )?,
            None => Credentials::new(None, None, None, None, None)?,
        };

        let region = if let Some(ref endpoint) = storage.endpoint {
            // 自定义端点（如 MinIO）
            Region::Custom {
                region: aws.region.clone(),
                endpoint: endpoint.clone(),
            }
        } else {
            aws.region.parse().unwrap_or(Region::UsEast1)
        };

        Ok(Self {
            region,
            credentials,
        })
    }

    fn bucket(&self, name: &str) -> Result<Box<Bucket>, GatewayError> {
        let bucket = Bucket::new(name, self.region.clone(), self.credentials.clone())
            .map_err(map_s3_error)?;

        // MinIO 等自定义端点只支持 path-style
        if matches!(self.region, Region::Custom { .. }) {
            Ok(Box::new(bucket.with_path_style()))
        } else {
            Ok(Box::new(bucket))
        }
    }
}

fn object_path(key: &str) -> String {
    if key.starts_with('/') {
        key.to_string()
    } else {
        format!("/{}", key)
    }
}

/// 将 rust-s3 错误映射为网关错误
fn map_s3_error(err: S3Error) -> GatewayError {
    match err {
        S3Error::HttpFailWithBody(status, body) => classify_failure(status, &body),
        // 传输层、凭证等错误都视为后端暂不可用
        other => GatewayError::BackendUnavailable(other.to_string()),
    }
}

/// 从 S3 XML 错误体中提取 `<Code>`
fn error_code(body: &str) -> Option<&str> {
    let start = body.find("<Code>")? + "<Code>".len();
    let end = body[start..].find("</Code>")? + start;
    Some(body[start..end].trim())
}

/// 根据 HTTP 状态码和 S3 错误码分类
pub(crate) fn classify_failure(status: u16, body: &str) -> GatewayError {
    let code = error_code(body);

    match (status, code) {
        (_, Some("NoSuchKey")) => GatewayError::NotFound("The requested file does not exist".into()),
        (_, Some("NoSuchBucket")) => {
            GatewayError::NotFound("The requested bucket does not exist".into())
        }
        (404, _) => GatewayError::NotFound("The requested object does not exist".into()),
        (
            _,
            Some(
                "AccessDenied"
                | "InvalidAccessKeyId"
                | "SignatureDoesNotMatch"
                | "ExpiredToken"
                | "InvalidToken"
                | "SlowDown"
                | "ServiceUnavailable"
                | "RequestTimeout",
            ),
        )
        | (401 | 403 | 429, _) => {
            GatewayError::BackendUnavailable(format!("HTTP {}: {}", status, code.unwrap_or(body)))
        }
        (500..=599, _) => {
            GatewayError::BackendUnavailable(format!("HTTP {}: {}", status, code.unwrap_or(body)))
        }
        _ => GatewayError::Unknown(format!("HTTP {}: {}", status, body.trim())),
    }
}

fn parse_last_modified(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list(&self, bucket: &str) -> Result<Vec<StoredObject>, GatewayError> {
        let client = self.bucket(bucket)?;
        let pages = client
            .list(String::new(), None)
            .await
            .map_err(map_s3_error)?;

        let objects: Vec<StoredObject> = pages
            .into_iter()
            .flat_map(|page| page.contents)
            .map(|object| StoredObject {
                last_modified: parse_last_modified(&object.last_modified),
                key: object.key,
                size: object.size,
                storage_class: object.storage_class,
            })
            .collect();

        debug!(bucket = %bucket, count = objects.len(), "Listed S3 objects");
        Ok(objects)
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, GatewayError> {
        let client = self.bucket(bucket)?;
        let response = client
            .get_object(object_path(key))
            .await
            .map_err(map_s3_error)?;

        Ok(response.bytes().to_vec())
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content: &[u8],
        content_type: Option<&str>,
    ) -> Result<(), GatewayError> {
        let client = self.bucket(bucket)?;
        let path = object_path(key);

        match content_type {
            Some(content_type) => client
                .put_object_with_content_type(path, content, content_type)
                .await
                .map_err(map_s3_error)?,
            None => client.put_object(path, content).await.map_err(map_s3_error)?,
        };

        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), GatewayError> {
        let client = self.bucket(bucket)?;
        client
            .delete_object(object_path(key))
            .await
            .map_err(map_s3_error)?;
        Ok(())
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        ttl_secs: u32,
    ) -> Result<String, GatewayError> {
        let client = self.bucket(bucket)?;
        client
            .presign_get(object_path(key), ttl_secs, None)
            .await
            .map_err(map_s3_error)
    }
}
