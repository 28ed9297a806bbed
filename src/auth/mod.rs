//! Session authentication module

pub mod jwt;
pub mod middleware;

pub use jwt::{Claims, JwtService};
pub use middleware::{extract_token, require_admin, session_auth_middleware, AuthContext};
