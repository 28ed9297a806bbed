//! Authentication-related models

use super::{file::BucketSummary, role::Role};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

/// Identity returned by the identity provider after a successful sign-in
#[derive(Debug, Clone)]
pub struct AuthenticatedIdentity {
    pub username: String,
    /// Group names in the order the provider reports them
    pub groups: Vec<String>,
}

/// Authenticated console session
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub username: String,
    pub role: Role,
    pub token: String,
    pub expires_in: u64,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: u64,
    pub username: String,
    pub role: Role,
    pub buckets: Vec<BucketSummary>,
}

/// Current session info
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub username: String,
    pub role: Role,
    pub buckets: Vec<BucketSummary>,
}

/// Admin request to create a console user.
///
/// The email doubles as the username unless one is given explicitly.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 128, message = "must be 1-128 characters"))]
    pub username: Option<String>,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, max = 256, message = "must be at least 8 characters"))]
    pub password: String,
    pub role: Role,
}

/// Validated user creation forwarded to the identity provider
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    pub username: String,
    pub role: Role,
    pub message: String,
}
