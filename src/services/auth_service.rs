//! 认证服务：登录、登出、管理员创建用户

use crate::{
    auth::{jwt::JwtService, AuthContext},
    config::RoleResolution,
    error::{AppError, AuthError},
    models::{
        auth::{CreateUserRequest, CreateUserResponse, LoginRequest, NewUser, Session},
        role::Role,
    },
    repository::IdentityProvider,
};
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

pub struct AuthService {
    identity: Arc<dyn IdentityProvider>,
    jwt_service: Arc<JwtService>,
    role_resolution: RoleResolution,
}

/// 根据用户组确定角色
///
/// 组名必须是已知角色（英文名或西班牙语组名），否则视为未分配角色。
pub fn resolve_role(groups: &[String], resolution: RoleResolution) -> Result<Role, AuthError> {
    let group = match (resolution, groups) {
        (RoleResolution::First, [first, ..]) => first,
        (RoleResolution::Single, [only]) => only,
        _ => return Err(AuthError::NoRoleAssigned),
    };

    group.parse::<Role>().map_err(|_| AuthError::NoRoleAssigned)
}

impl AuthService {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        jwt_service: Arc<JwtService>,
        role_resolution: RoleResolution,
    ) -> Self {
        Self {
            identity,
            jwt_service,
            role_resolution,
        }
    }

    /// 用户登录
    pub async fn login(&self, req: LoginRequest) -> Result<Session, AppError> {
        req.validate()?;

        let identity = self
            .identity
            .authenticate(req.username.trim(), &req.password)
            .await
            .map_err(|e| {
                warn!(username = %req.username, error = %e, "Login failed");
                e
            })?;

        let role = resolve_role(&identity.groups, self.role_resolution).map_err(|e| {
            warn!(
                username = %identity.username,
                groups = ?identity.groups,
                "Login rejected: no usable role group"
            );
            e
        })?;

        let (token, _) = self.jwt_service.issue(&identity.username, role)?;

        info!(username = %identity.username, role = %role, "User logged in");

        Ok(Session {
            username: identity.username,
            role,
            token,
            expires_in: self.jwt_service.session_exp_secs(),
        })
    }

    /// 用户登出：吊销当前会话令牌
    pub fn logout(&self, context: &AuthContext) {
        self.jwt_service.revoke(&context.jti, context.exp);
        info!(username = %context.username, "User logged out");
    }

    /// 管理员创建用户；校验失败时不会调用身份提供方
    pub async fn create_user(
        &self,
        admin: &AuthContext,
        req: CreateUserRequest,
    ) -> Result<CreateUserResponse, AppError> {
        req.validate()?;

        if req.password.trim().is_empty() {
            return Err(AppError::validation("password is required"));
        }

        let email = req.email.trim().to_string();
        let username = req
            .username
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| email.clone());

        let user = NewUser {
            username,
            email,
            password: req.password,
            role: req.role,
        };

        self.identity.create_user(&user).await.map_err(|e| {
            warn!(
                admin = %admin.username,
                username = %user.username,
                error = %e,
                "User creation failed"
            );
            e
        })?;

        info!(
            admin = %admin.username,
            username = %user.username,
            role = %user.role,
            "User created"
        );

        Ok(CreateUserResponse {
            message: format!("User '{}' created with role {}", user.username, user.role),
            username: user.username,
            role: user.role,
        })
    }
}
