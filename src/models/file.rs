//! Object listing and download models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_STORAGE_CLASS: &str = "STANDARD";

/// Raw object entry as reported by a storage backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub storage_class: Option<String>,
}

/// Normalized listing entry returned to the console
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRecord {
    pub key: String,
    /// Last path segment of `key`
    pub name: String,
    pub size_bytes: u64,
    pub size_mb: f64,
    pub last_modified: DateTime<Utc>,
    pub storage_class: String,
}

impl From<StoredObject> for FileRecord {
    fn from(object: StoredObject) -> Self {
        let name = object
            .key
            .rsplit('/')
            .next()
            .unwrap_or(object.key.as_str())
            .to_string();
        let size_mb = (object.size as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0;

        Self {
            name,
            size_bytes: object.size,
            size_mb,
            last_modified: object.last_modified,
            storage_class: object
                .storage_class
                .filter(|class| !class.is_empty())
                .unwrap_or_else(|| DEFAULT_STORAGE_CLASS.to_string()),
            key: object.key,
        }
    }
}

/// Time-limited download capability
#[derive(Debug, Clone, Serialize)]
pub struct PresignedUrl {
    pub url: String,
    pub expires_in_secs: u64,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct PresignQuery {
    pub ttl_secs: Option<u64>,
}

/// One bucket the caller may address, with what they may do in it
#[derive(Debug, Clone, Serialize)]
pub struct BucketSummary {
    pub name: String,
    pub capabilities: super::role::Capabilities,
}
