//! 配置系统
//! 从环境变量加载所有配置，使用 Secret 包装敏感信息

use config::{Config, ConfigError, Environment};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

/// 预签名 URL 允许的最长有效期（秒），与 S3 SigV4 上限一致
pub const MAX_PRESIGN_TTL_SECS: u64 = 604_800;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址，例如 "0.0.0.0:3000"
    pub addr: String,
    /// 优雅关闭超时时间（秒）
    pub graceful_shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// 会话令牌签名密钥（使用 Secret 包装，防止日志泄露）
    pub jwt_secret: Secret<String>,
    /// 会话有效期（秒）
    pub session_exp_secs: u64,
    /// 是否信任 X-Forwarded-For 头
    pub trust_proxy: bool,
    /// IP 白名单（可选）
    pub allowed_ips: Option<Vec<String>>,
    /// 单次上传的最大字节数
    pub max_upload_bytes: usize,
}

/// AWS 凭证与区域
///
/// 未配置访问密钥时回退到 `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` 环境变量。
#[derive(Debug, Clone, Deserialize)]
pub struct AwsConfig {
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<Secret<String>>,
    pub session_token: Option<Secret<String>>,
}

/// 四个受管 bucket 的实际名称
#[derive(Debug, Clone, Deserialize)]
pub struct BucketsConfig {
    pub public: String,
    pub projects: String,
    pub hr: String,
    pub logs: String,
}

/// 存储后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    S3,
    Local,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackendKind,
    /// 本地存储根目录（每个 bucket 一个子目录）
    pub local_path: String,
    /// 自定义 S3 端点（MinIO 等）
    pub endpoint: Option<String>,
    /// 默认预签名 URL 有效期（秒）
    pub presign_ttl_secs: u64,
}

/// 用户属于多个组时如何确定角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleResolution {
    /// 取身份提供方返回的第一个组
    First,
    /// 要求用户恰好属于一个组
    Single,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    pub user_pool_id: String,
    pub client_id: String,
    /// 自定义 Cognito 端点（默认 https://cognito-idp.{region}.amazonaws.com）
    pub endpoint: Option<String>,
    pub role_resolution: RoleResolution,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// OpenSearch 端点，例如 "https://search-domain.us-east-2.es.amazonaws.com"
    pub endpoint: String,
    pub index: String,
    pub username: Option<String>,
    pub password: Option<Secret<String>>,
    /// 使用 AWS SigV4 签名请求
    pub sign_requests: bool,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    pub aws: AwsConfig,
    pub buckets: BucketsConfig,
    pub storage: StorageConfig,
    pub identity: IdentityConfig,
    pub audit: AuditConfig,
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Config::builder();

        // 添加默认配置
        settings = settings
            .set_default("server.addr", "0.0.0.0:3000")?
            .set_default("server.graceful_shutdown_timeout_secs", 30)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("security.session_exp_secs", 3600)?
            .set_default("security.trust_proxy", true)?
            .set_default("security.max_upload_bytes", 100 * 1024 * 1024)?
            .set_default("aws.region", "us-east-2")?
            .set_default("storage.backend", "s3")?
            .set_default("storage.local_path", "./data/buckets")?
            .set_default("storage.presign_ttl_secs", 3600)?
            .set_default("identity.user_pool_id", "")?
            .set_default("identity.client_id", "")?
            .set_default("identity.role_resolution", "first")?
            .set_default("audit.endpoint", "")?
            .set_default("audit.index", "cloudtrail-logs")?
            .set_default("audit.sign_requests", true)?
            .set_default("audit.timeout_secs", 30)?;

        // 从环境变量加载配置（前缀为 CONSOLE_）
        settings = settings.add_source(
            Environment::with_prefix("CONSOLE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("security.allowed_ips"),
        );

        let config: AppConfig = settings.build()?.try_deserialize()?;

        // 验证配置
        config.validate()?;

        Ok(config)
    }

    /// 验证配置合法性
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 验证端口范围
        if let Some(port_str) = self.server.addr.split(':').next_back() {
            if let Ok(port) = port_str.parse::<u16>() {
                if port != 0 && port < 1024 {
                    return Err(ConfigError::Message("Server port should be >= 1024".to_string()));
                }
            }
        }

        // 验证日志级别
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        // 验证日志格式
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: json, pretty",
                    self.logging.format
                )))
            }
        }

        // 验证会话密钥长度（至少 32 字符）
        if self.security.jwt_secret.expose_secret().len() < 32 {
            return Err(ConfigError::Message(
                "JWT secret must be at least 32 characters long".to_string(),
            ));
        }

        if self.security.session_exp_secs < 60 || self.security.session_exp_secs > 86400 {
            return Err(ConfigError::Message(
                "session_exp_secs must be between 60 and 86400 (1 minute to 24 hours)".to_string(),
            ));
        }

        if self.security.max_upload_bytes == 0 {
            return Err(ConfigError::Message("max_upload_bytes must be positive".to_string()));
        }

        // 验证 bucket 名称：必须非空且互不相同
        let names = self.buckets.names();
        if names.iter().any(|name| name.trim().is_empty()) {
            return Err(ConfigError::Message("All four bucket names must be set".to_string()));
        }
        for (i, name) in names.iter().enumerate() {
            if names[i + 1..].contains(name) {
                return Err(ConfigError::Message(format!(
                    "Bucket name '{}' is configured for more than one slot",
                    name
                )));
            }
        }

        if self.storage.presign_ttl_secs == 0 || self.storage.presign_ttl_secs > MAX_PRESIGN_TTL_SECS
        {
            return Err(ConfigError::Message(format!(
                "presign_ttl_secs must be between 1 and {}",
                MAX_PRESIGN_TTL_SECS
            )));
        }

        if self.audit.timeout_secs == 0 {
            return Err(ConfigError::Message("audit.timeout_secs must be positive".to_string()));
        }

        Ok(())
    }
}

impl BucketsConfig {
    pub fn names(&self) -> [&str; 4] {
        [&self.public, &self.projects, &self.hr, &self.logs]
    }
}

impl AwsConfig {
    /// 解析访问密钥：优先配置，其次标准 AWS 环境变量
    pub fn resolve_credentials(&self) -> Option<ResolvedCredentials> {
        let from_config = match (&self.access_key_id, &self.secret_access_key) {
            (Some(access), Some(secret)) => Some(ResolvedCredentials {
                access_key_id: access.clone(),
                secret_access_key: secret.expose_secret().clone(),
                session_token: self
                    .session_token
                    .as_ref()
                    .map(|token| token.expose_secret().clone()),
            }),
            _ => None,
        };

        from_config.or_else(|| {
            match (
                std::env::var("AWS_ACCESS_KEY_ID").ok(),
                std::env::var("AWS_SECRET_ACCESS_KEY").ok(),
            ) {
                (Some(access_key_id), Some(secret_access_key)) => Some(ResolvedCredentials {
                    access_key_id,
                    secret_access_key,
                    session_token: std::env::var("AWS_SESSION_TOKEN").ok(),
                }),
                _ => None,
            }
        })
    }
}

/// 已解析的 AWS 凭证
#[derive(Clone)]
pub struct ResolvedCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for ResolvedCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .finish()
    }
}
