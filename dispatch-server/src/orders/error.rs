//! Order domain errors

use thiserror::Error;

use crate::db::repository::RepoError;
use crate::utils::AppError;
use shared::models::order::OrderStatus;

/// Order domain error taxonomy
#[derive(Debug, Error)]
pub enum OrderError {
    /// 不在允许边表中的流转 (409)
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        from: OrderStatus,
        to: OrderStatus,
    },

    /// 从终态发起的任何流转 (409)
    #[error("Order already in terminal state: {0}")]
    TerminalState(OrderStatus),

    /// 骑手离线或未审批 (422)
    #[error("Agent unavailable: {0}")]
    AgentUnavailable(String),

    /// 订单状态不允许分配 (409)
    #[error("Order not assignable in status: {0}")]
    OrderNotAssignable(OrderStatus),

    /// 乐观并发冲突，调用方应重读后重试 (409)
    #[error("Concurrent modification detected, refetch and retry")]
    ConcurrentModification,

    /// 订单/用户/商品不存在 (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// 输入校验失败 (400)
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
}

pub type OrderResult<T> = Result<T, OrderError>;

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidTransition { .. }
            | OrderError::TerminalState(_)
            | OrderError::OrderNotAssignable(_)
            | OrderError::ConcurrentModification => AppError::Conflict(err.to_string()),
            OrderError::AgentUnavailable(_) => AppError::BusinessRule(err.to_string()),
            OrderError::NotFound(msg) => AppError::NotFound(msg),
            OrderError::Validation(msg) => AppError::Validation(msg),
            OrderError::Repo(RepoError::NotFound(msg)) => AppError::NotFound(msg),
            OrderError::Repo(RepoError::Duplicate(msg)) => AppError::Conflict(msg),
            OrderError::Repo(RepoError::Validation(msg)) => AppError::Validation(msg),
            OrderError::Repo(RepoError::Database(msg)) => AppError::Database(msg),
        }
    }
}
