//! 外部协作方访问层
//!
//! 对象存储、审计索引与身份提供方都通过 trait 抽象，服务层只依赖 trait。

pub mod cognito;
pub mod local_store;
pub mod opensearch;
pub mod s3_store;
pub mod sigv4;

use crate::{
    error::{AuthError, GatewayError, QueryError},
    models::{
        audit::{IndexAggregation, SearchRequest},
        auth::{AuthenticatedIdentity, NewUser},
        file::StoredObject,
    },
};
use async_trait::async_trait;

pub use cognito::CognitoIdentityProvider;
pub use local_store::LocalObjectStore;
pub use opensearch::OpenSearchIndex;
pub use s3_store::S3ObjectStore;

/// Raw object storage primitives; no access control happens here
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn list(&self, bucket: &str) -> Result<Vec<StoredObject>, GatewayError>;

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, GatewayError>;

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content: &[u8],
        content_type: Option<&str>,
    ) -> Result<(), GatewayError>;

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), GatewayError>;

    async fn presign_get(&self, bucket: &str, key: &str, ttl_secs: u32)
        -> Result<String, GatewayError>;
}

/// Raw search primitives over the audit index
#[async_trait]
pub trait AuditIndex: Send + Sync {
    /// Returns the `_source` documents of the matching hits
    async fn search(&self, request: &SearchRequest) -> Result<Vec<serde_json::Value>, QueryError>;

    async fn aggregate(&self, top_n: usize) -> Result<IndexAggregation, QueryError>;
}

/// User directory
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthenticatedIdentity, AuthError>;

    async fn create_user(&self, user: &NewUser) -> Result<(), AuthError>;
}
