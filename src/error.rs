//! 统一错误模型
//! 定义所有错误类型和错误响应格式

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

/// 结果类型别名
pub type Result<T> = std::result::Result<T, AppError>;

/// 存储网关错误
///
/// `Forbidden` 由访问策略在本地产生，从不触达后端。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("Operation not permitted for this role")]
    Forbidden,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("{0}")]
    Unknown(String),
}

/// 审计日志查询错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Invalid audit query: {0}")]
    InvalidRequest(String),

    #[error("Audit search failed: {0}")]
    Backend(String),
}

/// 身份提供方错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("User has no role assigned")]
    NoRoleAssigned,

    #[error("Additional authentication challenge required: {0}")]
    ChallengeRequired(String),

    #[error("User already exists")]
    UserExists,

    #[error("Identity provider rejected the request: {0}")]
    Rejected(String),

    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),
}

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed")]
    Unauthorized,

    #[error("Access denied")]
    Forbidden,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// 获取 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Gateway(err) => match err {
                GatewayError::Forbidden => StatusCode::FORBIDDEN,
                GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
                GatewayError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                GatewayError::Unknown(_) => StatusCode::BAD_GATEWAY,
            },
            AppError::Query(err) => match err {
                QueryError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                QueryError::Backend(_) => StatusCode::BAD_GATEWAY,
            },
            AppError::Auth(err) => match err {
                AuthError::InvalidCredentials
                | AuthError::UserNotFound
                | AuthError::ChallengeRequired(_) => StatusCode::UNAUTHORIZED,
                AuthError::NoRoleAssigned => StatusCode::FORBIDDEN,
                AuthError::UserExists => StatusCode::CONFLICT,
                AuthError::Rejected(_) => StatusCode::BAD_REQUEST,
                AuthError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 获取用户友好的错误消息（不包含敏感信息）
    pub fn user_message(&self) -> String {
        match self {
            AppError::Unauthorized => "Authentication failed".to_string(),
            AppError::Forbidden => "Access denied".to_string(),
            AppError::NotFound(msg) => format!("Resource not found: {}", msg),
            AppError::Validation(msg) => msg.clone(),
            AppError::Gateway(GatewayError::Forbidden) => {
                "You do not have permission for this operation".to_string()
            }
            AppError::Gateway(GatewayError::NotFound(msg)) => msg.clone(),
            AppError::Gateway(GatewayError::BackendUnavailable(_)) => {
                "Storage service is temporarily unavailable".to_string()
            }
            // 未分类的后端错误原样透传
            AppError::Gateway(GatewayError::Unknown(msg)) => msg.clone(),
            AppError::Query(QueryError::InvalidRequest(msg)) => msg.clone(),
            AppError::Query(err @ QueryError::Backend(_)) => err.to_string(),
            AppError::Auth(AuthError::Unavailable(_)) => {
                "Identity service is temporarily unavailable".to_string()
            }
            AppError::Auth(err) => err.to_string(),
            AppError::Config(_) => "Configuration error".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
        }
    }

    /// 获取错误码
    pub fn code(&self) -> u16 {
        self.status_code().as_u16()
    }

    pub fn validation(msg: &str) -> Self {
        AppError::Validation(msg.to_string())
    }
}

/// 错误响应 DTO
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: u16,
    pub message: String,
    pub request_id: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let request_id = uuid::Uuid::new_v4().to_string();

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: self.code(),
                message: self.user_message(),
                request_id,
            },
        };

        // 客户端错误只记 warn，服务端错误记 error
        if status.is_server_error() {
            tracing::error!(
                code = self.code(),
                message = %self,
                request_id = %error_response.error.request_id,
                "Application error"
            );
        } else {
            tracing::warn!(
                code = self.code(),
                message = %self,
                request_id = %error_response.error.request_id,
                "Request rejected"
            );
        }

        (status, Json(error_response)).into_response()
    }
}

/// 从 config::ConfigError 转换
impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let detail = errs
                    .iter()
                    .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .next()
                    .unwrap_or_else(|| "is invalid".to_string());
                format!("{} {}", field, detail)
            })
            .collect();
        fields.sort();
        AppError::Validation(fields.join("; "))
    }
}
