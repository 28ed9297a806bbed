//! 数据模型模块
//! 角色与操作、对象列表、审计记录、认证会话

pub mod audit;
pub mod auth;
pub mod file;
pub mod role;
