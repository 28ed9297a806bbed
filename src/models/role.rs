//! Role and operation domain models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Permission level assigned by the identity provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Admin,
    #[serde(alias = "solo-lectura")]
    ReadOnly,
    #[serde(alias = "lectura-escritura")]
    ReadWrite,
    #[serde(alias = "solo-carga")]
    UploadOnly,
    #[serde(alias = "solo-descarga")]
    DownloadOnly,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::ReadOnly,
        Role::ReadWrite,
        Role::UploadOnly,
        Role::DownloadOnly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::ReadOnly => "read-only",
            Role::ReadWrite => "read-write",
            Role::UploadOnly => "upload-only",
            Role::DownloadOnly => "download-only",
        }
    }

    /// Group name used in the Cognito user pool for this role
    pub fn group_name(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::ReadOnly => "solo-lectura",
            Role::ReadWrite => "lectura-escritura",
            Role::UploadOnly => "solo-carga",
            Role::DownloadOnly => "solo-descarga",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role '{}'", self.0)
    }
}

impl std::error::Error for UnknownRole {}

/// Accepts both the canonical names and the user-pool group names.
impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "read-only" | "solo-lectura" => Ok(Role::ReadOnly),
            "read-write" | "lectura-escritura" => Ok(Role::ReadWrite),
            "upload-only" | "solo-carga" => Ok(Role::UploadOnly),
            "download-only" | "solo-descarga" => Ok(Role::DownloadOnly),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// File operation gated by the access policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    List,
    Get,
    Put,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 4] =
        [Operation::List, Operation::Get, Operation::Put, Operation::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::List => "list",
            Operation::Get => "get",
            Operation::Put => "put",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configured bucket slot; the bucket name behind each slot comes from config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeSlot {
    Public,
    Projects,
    Hr,
    Logs,
}

impl ScopeSlot {
    pub const ALL: [ScopeSlot; 4] =
        [ScopeSlot::Public, ScopeSlot::Projects, ScopeSlot::Hr, ScopeSlot::Logs];
}

/// Per-scope operation flags, shown next to each bucket in the console
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Capabilities {
    pub list: bool,
    pub download: bool,
    pub upload: bool,
    pub delete: bool,
}
