//! Authentication Module
//!
//! JWT 认证体系：令牌服务、中间件、提取器

pub mod extractor;
pub mod jwt;
pub mod middleware;

pub use jwt::{Claims, CurrentUser, JwtConfig, JwtError, JwtService};
pub use middleware::require_auth;
