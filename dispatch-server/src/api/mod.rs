//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查
//! - [`auth`] - 注册 / 登录
//! - [`orders`] - 订单创建、查询、状态流转、支付
//! - [`users`] - 用户管理（管理员审批骑手）
//! - [`agents`] - 骑手在线状态与名册
//! - [`products`] - 商品目录
//! - [`analytics`] - 销售汇总与回填作业
//! - [`realtime`] - 在线会话列表

use axum::Router;

use crate::core::ServerState;

pub mod agents;
pub mod analytics;
pub mod auth;
pub mod health;
pub mod orders;
pub mod products;
pub mod realtime;
pub mod users;

// Re-export common types for handlers
pub use crate::utils::{AppResponse, AppResult};

/// Aggregate router for the whole REST surface
pub fn router() -> Router<ServerState> {
    Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(orders::router())
        .merge(users::router())
        .merge(agents::router())
        .merge(products::router())
        .merge(analytics::router())
        .merge(realtime::router())
}
