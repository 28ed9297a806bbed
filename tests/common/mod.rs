//! 测试公共模块
//! 提供测试配置、内存版外部协作方和测试应用状态
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request},
    response::Response,
    Router,
};
use bucket_console::{
    auth::jwt::JwtService,
    config::{
        AppConfig, AuditConfig, AwsConfig, BucketsConfig, IdentityConfig, LoggingConfig,
        RoleResolution, SecurityConfig, ServerConfig, StorageBackendKind, StorageConfig,
    },
    error::{AuthError, GatewayError, QueryError},
    middleware::AppState,
    models::{
        audit::{IndexAggregation, SearchRequest},
        auth::{AuthenticatedIdentity, NewUser},
        file::StoredObject,
        role::Role,
    },
    repository::{AuditIndex, IdentityProvider, ObjectStore},
    routes,
    services::{AccessPolicy, AuditQuery, AuthService, ResourceGateway},
};
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use secrecy::Secret;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const PUBLIC: &str = "cndd-publica";
pub const PROJECTS: &str = "cndd-proyectos";
pub const HR: &str = "cndd-recursoshumanos";
pub const LOGS: &str = "cndd-logs";

/// 创建测试配置
pub fn create_test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            addr: "127.0.0.1:0".to_string(), // 使用随机端口
            graceful_shutdown_timeout_secs: 5,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
        security: SecurityConfig {
            jwt_secret: Secret::new("test-secret-key-for-testing-only-min-32-chars".to_string()),
            session_exp_secs: 300,
            trust_proxy: false,
            allowed_ips: None,
            max_upload_bytes: 1024 * 1024,
        },
        aws: AwsConfig {
            region: "us-east-2".to_string(),
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
        },
        buckets: BucketsConfig {
            public: PUBLIC.to_string(),
            projects: PROJECTS.to_string(),
            hr: HR.to_string(),
            logs: LOGS.to_string(),
        },
        storage: StorageConfig {
            backend: StorageBackendKind::Local,
            local_path: std::env::temp_dir().to_string_lossy().into_owned(),
            endpoint: None,
            presign_ttl_secs: 3600,
        },
        identity: IdentityConfig {
            user_pool_id: "us-east-2_TEST".to_string(),
            client_id: "test-client".to_string(),
            endpoint: None,
            role_resolution: RoleResolution::First,
        },
        audit: AuditConfig {
            endpoint: "http://localhost:9200".to_string(),
            index: "cloudtrail-logs".to_string(),
            username: None,
            password: None,
            sign_requests: false,
            timeout_secs: 5,
        },
    }
}

// ==================== 内存对象存储 ====================

#[derive(Default)]
pub struct MemoryObjectStore {
    /// bucket -> key -> (content, last_modified)
    buckets: Mutex<HashMap<String, BTreeMap<String, (Vec<u8>, DateTime<Utc>)>>>,
    calls: AtomicUsize,
    failure: Mutex<Option<GatewayError>>,
}

impl MemoryObjectStore {
    /// 四个 bucket 都存在且为空
    pub fn with_default_buckets() -> Self {
        let store = Self::default();
        {
            let mut buckets = store.buckets.lock().unwrap();
            for name in [PUBLIC, PROJECTS, HR, LOGS] {
                buckets.insert(name.to_string(), BTreeMap::new());
            }
        }
        store
    }

    pub fn insert(&self, bucket: &str, key: &str, content: &[u8], modified: DateTime<Utc>) {
        self.buckets
            .lock()
            .unwrap()
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), (content.to_vec(), modified));
    }

    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.buckets
            .lock()
            .unwrap()
            .get(bucket)
            .map(|objects| objects.contains_key(key))
            .unwrap_or(false)
    }

    pub fn fail_with(&self, error: GatewayError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn begin(&self) -> Result<(), GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn missing_bucket(bucket: &str) -> GatewayError {
        GatewayError::NotFound(format!("The bucket '{}' does not exist", bucket))
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list(&self, bucket: &str) -> Result<Vec<StoredObject>, GatewayError> {
        self.begin()?;
        let buckets = self.buckets.lock().unwrap();
        let objects = buckets.get(bucket).ok_or_else(|| Self::missing_bucket(bucket))?;

        Ok(objects
            .iter()
            .map(|(key, (content, modified))| StoredObject {
                key: key.clone(),
                size: content.len() as u64,
                last_modified: *modified,
                storage_class: None,
            })
            .collect())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, GatewayError> {
        self.begin()?;
        let buckets = self.buckets.lock().unwrap();
        let objects = buckets.get(bucket).ok_or_else(|| Self::missing_bucket(bucket))?;
        objects
            .get(key)
            .map(|(content, _)| content.clone())
            .ok_or_else(|| GatewayError::NotFound("The requested file does not exist".into()))
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content: &[u8],
        _content_type: Option<&str>,
    ) -> Result<(), GatewayError> {
        self.begin()?;
        let mut buckets = self.buckets.lock().unwrap();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| Self::missing_bucket(bucket))?;
        objects.insert(key.to_string(), (content.to_vec(), Utc::now()));
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), GatewayError> {
        self.begin()?;
        let mut buckets = self.buckets.lock().unwrap();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| Self::missing_bucket(bucket))?;
        objects.remove(key);
        Ok(())
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        ttl_secs: u32,
    ) -> Result<String, GatewayError> {
        self.begin()?;
        Ok(format!(
            "https://{}.s3.amazonaws.com/{}?X-Amz-Expires={}",
            bucket, key, ttl_secs
        ))
    }
}

// ==================== 内存审计索引 ====================

#[derive(Default)]
pub struct StaticAuditIndex {
    pub documents: Vec<Value>,
    pub aggregation: IndexAggregation,
    pub failure: Option<QueryError>,
    pub requests: Mutex<Vec<SearchRequest>>,
}

impl StaticAuditIndex {
    pub fn with_documents(documents: Vec<Value>) -> Self {
        Self {
            documents,
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditIndex for StaticAuditIndex {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<Value>, QueryError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        Ok(self.documents.iter().take(request.size).cloned().collect())
    }

    async fn aggregate(&self, _top_n: usize) -> Result<IndexAggregation, QueryError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        Ok(self.aggregation.clone())
    }
}

// ==================== 内存身份提供方 ====================

#[derive(Default)]
pub struct FakeIdentityProvider {
    /// username -> (password, groups)
    users: Mutex<HashMap<String, (String, Vec<String>)>>,
    created: Mutex<Vec<NewUser>>,
    calls: AtomicUsize,
}

impl FakeIdentityProvider {
    pub fn with_user(self, username: &str, password: &str, groups: &[&str]) -> Self {
        self.users.lock().unwrap().insert(
            username.to_string(),
            (
                password.to_string(),
                groups.iter().map(|g| g.to_string()).collect(),
            ),
        );
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> Vec<NewUser> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthenticatedIdentity, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let users = self.users.lock().unwrap();
        let (expected, groups) = users.get(username).ok_or(AuthError::UserNotFound)?;
        if expected != password {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(AuthenticatedIdentity {
            username: username.to_string(),
            groups: groups.clone(),
        })
    }

    async fn create_user(&self, user: &NewUser) -> Result<(), AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut users = self.users.lock().unwrap();
        if users.contains_key(&user.username) {
            return Err(AuthError::UserExists);
        }
        users.insert(
            user.username.clone(),
            (user.password.clone(), vec![user.role.group_name().to_string()]),
        );
        self.created.lock().unwrap().push(user.clone());
        Ok(())
    }
}

// ==================== 测试应用状态 ====================

pub struct TestApp {
    pub state: Arc<AppState>,
    pub store: Arc<MemoryObjectStore>,
    pub index: Arc<StaticAuditIndex>,
    pub identity: Arc<FakeIdentityProvider>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_parts(
            create_test_config(),
            MemoryObjectStore::with_default_buckets(),
            StaticAuditIndex::default(),
            FakeIdentityProvider::default(),
        )
    }

    pub fn with_parts(
        config: AppConfig,
        store: MemoryObjectStore,
        index: StaticAuditIndex,
        identity: FakeIdentityProvider,
    ) -> Self {
        let store = Arc::new(store);
        let index = Arc::new(index);
        let identity = Arc::new(identity);

        let state = create_test_app_state(config, store.clone(), index.clone(), identity.clone());
        Self {
            state,
            store,
            index,
            identity,
        }
    }

    pub fn router(&self) -> Router {
        routes::create_router(self.state.clone())
    }

    /// 直接签发会话令牌，跳过身份提供方
    pub fn token_for(&self, role: Role) -> String {
        self.state
            .jwt_service
            .issue(&format!("{}-user", role), role)
            .expect("Failed to issue test token")
            .0
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router().oneshot(request).await.unwrap()
    }
}

/// 创建测试应用状态
pub fn create_test_app_state(
    config: AppConfig,
    store: Arc<dyn ObjectStore>,
    index: Arc<dyn AuditIndex>,
    identity: Arc<dyn IdentityProvider>,
) -> Arc<AppState> {
    let jwt_service =
        Arc::new(JwtService::from_config(&config).expect("Failed to create JWT service"));
    let policy = AccessPolicy::new(config.buckets.clone());

    Arc::new(AppState {
        gateway: Arc::new(ResourceGateway::new(store, policy.clone())),
        audit_query: Arc::new(AuditQuery::new(index)),
        auth_service: Arc::new(AuthService::new(
            identity,
            jwt_service.clone(),
            config.identity.role_resolution,
        )),
        jwt_service,
        policy,
        config,
    })
}

pub fn authed(method: &str, uri: &str, token: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
}

pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}
