//! Business logic services layer

pub mod access_policy;
pub mod audit_query;
pub mod auth_service;
pub mod gateway;

pub use access_policy::AccessPolicy;
pub use audit_query::AuditQuery;
pub use auth_service::AuthService;
pub use gateway::ResourceGateway;
