//! 本地文件系统存储后端（开发环境）
//!
//! 每个 bucket 对应根目录下的一个子目录，对象键中的 `/` 映射为子目录。

use super::ObjectStore;
use crate::{error::GatewayError, models::file::StoredObject};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

pub struct LocalObjectStore {
    base_path: PathBuf,
}

impl LocalObjectStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, GatewayError> {
        if bucket.is_empty() || bucket.contains(|c: char| c == '/' || c == '\\') || bucket == "." || bucket == ".." {
            return Err(GatewayError::Unknown(format!("Invalid bucket name '{}'", bucket)));
        }
        Ok(self.base_path.join(bucket))
    }

    /// 对象键只允许普通路径段，拒绝绝对路径和 `..`
    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, GatewayError> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !valid {
            return Err(GatewayError::Unknown(format!("Invalid object key '{}'", key)));
        }
        Ok(self.bucket_dir(bucket)?.join(relative))
    }

    async fn ensure_bucket(&self, bucket: &str) -> Result<PathBuf, GatewayError> {
        let dir = self.bucket_dir(bucket)?;
        match tokio::fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => Ok(dir),
            Ok(_) | Err(_) => Err(GatewayError::NotFound(format!(
                "The bucket '{}' does not exist",
                bucket
            ))),
        }
    }
}

fn map_io_error(err: std::io::Error, what: &str) -> GatewayError {
    match err.kind() {
        ErrorKind::NotFound => GatewayError::NotFound(format!("{} does not exist", what)),
        ErrorKind::PermissionDenied => GatewayError::BackendUnavailable(err.to_string()),
        _ => GatewayError::Unknown(err.to_string()),
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn list(&self, bucket: &str) -> Result<Vec<StoredObject>, GatewayError> {
        let root = self.ensure_bucket(bucket).await?;
        let mut objects = Vec::new();
        let mut pending = vec![root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| map_io_error(e, "Directory"))?;

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| map_io_error(e, "Directory entry"))?
            {
                let meta = entry
                    .metadata()
                    .await
                    .map_err(|e| map_io_error(e, "File"))?;
                let path = entry.path();

                if meta.is_dir() {
                    pending.push(path);
                    continue;
                }

                let key = path
                    .strip_prefix(&root)
                    .map_err(|e| GatewayError::Unknown(e.to_string()))?
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");

                let last_modified = meta
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

                objects.push(StoredObject {
                    key,
                    size: meta.len(),
                    last_modified,
                    storage_class: None,
                });
            }
        }

        Ok(objects)
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, GatewayError> {
        self.ensure_bucket(bucket).await?;
        let path = self.object_path(bucket, key)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| map_io_error(e, &format!("The file '{}'", key)))
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content: &[u8],
        _content_type: Option<&str>,
    ) -> Result<(), GatewayError> {
        self.ensure_bucket(bucket).await?;
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| map_io_error(e, "Directory"))?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| map_io_error(e, &format!("The file '{}'", key)))
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), GatewayError> {
        self.ensure_bucket(bucket).await?;
        let path = self.object_path(bucket, key)?;
        // S3 语义：删除不存在的对象也算成功
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(map_io_error(e, &format!("The file '{}'", key))),
        }
    }

    async fn presign_get(
        &self,
        _bucket: &str,
        _key: &str,
        _ttl_secs: u32,
    ) -> Result<String, GatewayError> {
        Err(GatewayError::Unknown(
            "Presigned URLs require the s3 storage backend".to_string(),
        ))
    }
}
