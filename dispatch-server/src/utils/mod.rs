//! 工具模块

pub mod error;
pub mod logger;

pub use error::{AppError, AppResponse, ok};

/// Result type for handlers and services
pub type AppResult<T> = Result<T, AppError>;
