//! S3 bucket 管理控制台
//! Cognito 登录、基于角色的文件访问、OpenSearch 审计查询

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod services;
pub mod telemetry;
