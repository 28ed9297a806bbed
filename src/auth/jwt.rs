//! Session token generation and validation
//! HS256 session tokens with an in-memory revocation list for logout

use crate::{config::AppConfig, error::AppError, models::role::Role};
use chrono::{Duration, Utc};
use dashmap::DashMap;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims for console sessions
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (identity provider username)
    pub sub: String,

    /// Display username
    pub username: String,

    /// Resolved console role
    pub role: Role,

    /// Issued at
    pub iat: i64,

    /// Expiration
    pub exp: i64,

    /// JWT ID, the key used for revocation
    pub jti: String,
}

/// JWT service
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    session_exp_secs: u64,
    /// jti -> exp of tokens revoked by logout
    revoked: DashMap<String, i64>,
}

impl JwtService {
    /// Create JWT service from config
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        Self::new(
            config.security.jwt_secret.expose_secret(),
            config.security.session_exp_secs,
        )
    }

    pub fn new(secret: &str, session_exp_secs: u64) -> Result<Self, AppError> {
        // Ensure secret is at least 32 bytes for HS256
        if secret.len() < 32 {
            return Err(AppError::Config("JWT secret too short (min 32 chars)".to_string()));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            session_exp_secs,
            revoked: DashMap::new(),
        })
    }

    pub fn session_exp_secs(&self) -> u64 {
        self.session_exp_secs
    }

    /// Issue a session token
    pub fn issue(&self, username: &str, role: Role) -> Result<(String, Claims), AppError> {
        let now = Utc::now();
        let expiration = now + Duration::seconds(self.session_exp_secs as i64);

        let claims = Claims {
            sub: username.to_string(),
            username: username.to_string(),
            role,
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to encode session token: {:?}", e);
            AppError::Internal(format!("Failed to encode session token: {}", e))
        })?;

        Ok((token, claims))
    }

    /// Validate and decode a session token, rejecting revoked ones
    pub fn validate(&self, token: &str) -> Result<Claims, AppError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &Validation::new(Algorithm::HS256))
            .map_err(|e| {
                tracing::debug!("Token validation failed: {:?}", e);
                AppError::Unauthorized
            })?
            .claims;

        if self.revoked.contains_key(&claims.jti) {
            tracing::debug!(jti = %claims.jti, "Rejected revoked session token");
            return Err(AppError::Unauthorized);
        }

        Ok(claims)
    }

    /// Revoke a session until it would have expired anyway
    pub fn revoke(&self, jti: &str, exp: i64) {
        self.purge_expired();
        self.revoked.insert(jti.to_string(), exp);
    }

    /// Drop revocation entries whose tokens have expired
    pub fn purge_expired(&self) {
        let now = Utc::now().timestamp();
        self.revoked.retain(|_, exp| *exp > now);
    }

    pub fn revoked_count(&self) -> usize {
        self.revoked.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_secret_key_32_characters_long!";

    #[test]
    fn test_issue_and_validate() {
        let service = JwtService::new(SECRET, 900).unwrap();

        let (token, issued) = service.issue("ana", Role::ReadWrite).unwrap();
        let claims = service.validate(&token).unwrap();

        assert_eq!(claims.username, "ana");
        assert_eq!(claims.role, Role::ReadWrite);
        assert_eq!(claims.jti, issued.jti);
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(JwtService::new("short", 900).is_err());
    }

    #[test]
    fn test_revoked_token_rejected() {
        let service = JwtService::new(SECRET, 900).unwrap();
        let (token, claims) = service.issue("ana", Role::Admin).unwrap();

        service.revoke(&claims.jti, claims.exp);
        assert!(service.validate(&token).is_err());

        // 其他会话不受影响
        let (other, _) = service.issue("ana", Role::Admin).unwrap();
        assert!(service.validate(&other).is_ok());
    }

    #[test]
    fn test_purge_drops_expired_entries() {
        let service = JwtService::new(SECRET, 900).unwrap();
        service.revoke("old", Utc::now().timestamp() - 10);
        service.revoke("live", Utc::now().timestamp() + 600);

        service.purge_expired();
        assert_eq!(service.revoked_count(), 1);
    }

    #[test]
    fn test_token_from_other_secret_fails() {
        let service = JwtService::new(SECRET, 900).unwrap();
        let other = JwtService::new("another_secret_key_32_characters_long", 900).unwrap();
        let (token, _) = other.issue("ana", Role::Admin).unwrap();

        assert!(service.validate(&token).is_err());
        assert!(service.validate("invalid_token").is_err());
    }
}
