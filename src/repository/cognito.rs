//! Cognito 用户池身份提供方
//!
//! 登录走 USER_PASSWORD_AUTH（公开客户端，无需签名），用户组从 ID 令牌的
//! `cognito:groups` 声明读取；管理接口使用 SigV4 签名。

use super::{sigv4, IdentityProvider};
use crate::{
    config::{AwsConfig, IdentityConfig, ResolvedCredentials},
    error::AuthError,
    models::auth::{AuthenticatedIdentity, NewUser},
};
use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

pub struct CognitoIdentityProvider {
    client: reqwest::Client,
    endpoint: reqwest::Url,
    region: String,
    user_pool_id: String,
    client_id: String,
    credentials: Option<ResolvedCredentials>,
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    #[serde(rename = "cognito:username")]
    username: Option<String>,
    #[serde(rename = "cognito:groups", default)]
    groups: Vec<String>,
}

impl CognitoIdentityProvider {
    pub fn new(identity: &IdentityConfig, aws: &AwsConfig) -> anyhow::Result<Self> {
        let endpoint = identity
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("https://cognito-idp.{}.amazonaws.com/", aws.region));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            endpoint: reqwest::Url::parse(&endpoint)?,
            region: aws.region.clone(),
            user_pool_id: identity.user_pool_id.clone(),
            client_id: identity.client_id.clone(),
            credentials: aws.resolve_credentials(),
        })
    }

    async fn call(&self, action: &str, body: &Value, signed: bool) -> Result<Value, AuthError> {
        let payload =
            serde_json::to_vec(body).map_err(|e| AuthError::Unavailable(e.to_string()))?;
        let target = format!("{}.{}", TARGET_PREFIX, action);

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header("content-type", CONTENT_TYPE)
            .header("x-amz-target", &target);

        if signed {
            let credentials = self.credentials.as_ref().ok_or_else(|| {
                AuthError::Unavailable("AWS credentials are not configured".to_string())
            })?;
            let signable = sigv4::SignableRequest {
                method: "POST",
                url: &self.endpoint,
                headers: &[("content-type", CONTENT_TYPE), ("x-amz-target", target.as_str())],
                payload: &payload,
            };
            for (name, value) in sigv4::sign(
                &signable,
                credentials,
                &self.region,
                "cognito-idp",
                chrono::Utc::now(),
            ) {
                request = request.header(name, value);
            }
        }

        let response = request
            .body(payload)
            .send()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .unwrap_or_else(|_| json!({}));

        if status.is_success() {
            return Ok(body);
        }

        let error_type = body
            .get("__type")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let message = body
            .get("message")
            .or_else(|| body.get("Message"))
            .and_then(Value::as_str)
            .unwrap_or_default();

        debug!(action, status = status.as_u16(), error_type, "Cognito request failed");
        Err(map_cognito_error(status.as_u16(), error_type, message))
    }
}

/// `__type` may carry a namespace prefix such as `com.amazonaws...#NotAuthorizedException`
pub(crate) fn map_cognito_error(status: u16, error_type: &str, message: &str) -> AuthError {
    let kind = error_type.rsplit('#').next().unwrap_or(error_type);

    match kind {
        "NotAuthorizedException" => AuthError::InvalidCredentials,
        "UserNotFoundException" => AuthError::UserNotFound,
        "UsernameExistsException" => AuthError::UserExists,
        "PasswordResetRequiredException" | "UserNotConfirmedException" => {
            AuthError::ChallengeRequired(kind.to_string())
        }
        "InvalidPasswordException" | "InvalidParameterException" => {
            AuthError::Rejected(message.to_string())
        }
        "TooManyRequestsException" | "InternalErrorException" => {
            AuthError::Unavailable(format!("{}: {}", kind, message))
        }
        _ if status >= 500 => AuthError::Unavailable(format!("HTTP {}: {}", status, message)),
        _ => AuthError::Rejected(format!("{}: {}", kind, message)),
    }
}

/// 读取 ID 令牌中的用户名与用户组
///
/// 令牌由 Cognito 在本次 TLS 响应中直接签发，这里只解码载荷不校验签名。
pub(crate) fn groups_from_id_token(id_token: &str) -> Result<IdTokenGroups, AuthError> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let claims = decode::<IdTokenClaims>(id_token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| AuthError::Unavailable(format!("Malformed ID token: {}", e)))?
        .claims;

    Ok(IdTokenGroups {
        username: claims.username,
        groups: claims.groups,
    })
}

#[derive(Debug)]
pub(crate) struct IdTokenGroups {
    pub username: Option<String>,
    pub groups: Vec<String>,
}

#[async_trait]
impl IdentityProvider for CognitoIdentityProvider {
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthenticatedIdentity, AuthError> {
        let body = json!({
            "AuthFlow": "USER_PASSWORD_AUTH",
            "ClientId": self.client_id,
            "AuthParameters": {
                "USERNAME": username,
                "PASSWORD": password,
            },
        });

        let response = self.call("InitiateAuth", &body, false).await?;

        if let Some(challenge) = response.get("ChallengeName").and_then(Value::as_str) {
            warn!(username, challenge, "Login requires an additional challenge");
            return Err(AuthError::ChallengeRequired(challenge.to_string()));
        }

        let id_token = response
            .pointer("/AuthenticationResult/IdToken")
            .and_then(Value::as_str)
            .ok_or_else(|| AuthError::Unavailable("No ID token in Cognito response".to_string()))?;

        let token = groups_from_id_token(id_token)?;

        Ok(AuthenticatedIdentity {
            username: token.username.unwrap_or_else(|| username.to_string()),
            groups: token.groups,
        })
    }

    async fn create_user(&self, user: &NewUser) -> Result<(), AuthError> {
        provision_user(&self.user_pool_id, user, |action, body| async move {
            self.call(action, &body, true).await
        })
        .await
    }
}

/// 依次执行 AdminCreateUser、AdminSetUserPassword、AdminAddUserToGroup
///
/// 用户创建后的任一步失败都会尽力调用 AdminDeleteUser 回滚，避免留下没有用户组、
/// 无法登录又无法重新创建的账号。
pub(crate) async fn provision_user<F, Fut>(
    user_pool_id: &str,
    user: &NewUser,
    call: F,
) -> Result<(), AuthError>
where
    F: Fn(&'static str, Value) -> Fut,
    Fut: std::future::Future<Output = Result<Value, AuthError>>,
{
    let create = json!({
        "UserPoolId": user_pool_id,
        "Username": user.username,
        "UserAttributes": [
            {"Name": "email", "Value": user.email},
            {"Name": "email_verified", "Value": "true"},
        ],
        "TemporaryPassword": user.password,
        "MessageAction": "SUPPRESS",
    });
    call("AdminCreateUser", create).await?;

    // 临时密码直接转为永久密码，避免首次登录的 NEW_PASSWORD_REQUIRED 挑战
    let set_password = json!({
        "UserPoolId": user_pool_id,
        "Username": user.username,
        "Password": user.password,
        "Permanent": true,
    });
    let add_to_group = json!({
        "UserPoolId": user_pool_id,
        "Username": user.username,
        "GroupName": user.role.group_name(),
    });

    let finished = match call("AdminSetUserPassword", set_password).await {
        Ok(_) => call("AdminAddUserToGroup", add_to_group).await.map(|_| ()),
        Err(e) => Err(e),
    };

    if let Err(error) = finished {
        warn!(username = %user.username, error = %error, "User setup failed, rolling back");
        let delete = json!({
            "UserPoolId": user_pool_id,
            "Username": user.username,
        });
        if let Err(rollback) = call("AdminDeleteUser", delete).await {
            warn!(
                username = %user.username,
                error = %rollback,
                "Rollback failed, user left without group"
            );
        }
        return Err(error);
    }

    Ok(())
}
