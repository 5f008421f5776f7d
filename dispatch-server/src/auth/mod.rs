//! 认证模块
//!
//! JWT + Argon2 认证体系：
//! - [`JwtService`] - 令牌生成与验证
//! - [`CurrentUser`] - 请求处理函数的认证上下文提取器
//! - [`password`] - 密码哈希与校验

mod extractor;
pub mod jwt;
pub mod password;

pub use jwt::{Claims, CurrentUser, JwtConfig, JwtError, JwtService};
