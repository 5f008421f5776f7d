//! User Model
//!
//! 平台的三类用户：顾客、骑手、管理员。骑手在 User 上附带
//! 审批状态与在线标记。

use serde::{Deserialize, Serialize};
use validator::Validate;

/// 用户角色
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    DeliveryAgent,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Customer => write!(f, "customer"),
            Role::DeliveryAgent => write!(f, "delivery_agent"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Role::Customer),
            "delivery_agent" => Ok(Role::DeliveryAgent),
            "admin" => Ok(Role::Admin),
            _ => Err(()),
        }
    }
}

/// 骑手审批状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// User response (without password hash)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub role: Role,
    pub approval: ApprovalState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub is_online: bool,
    /// 当前未完结订单数（仅骑手有意义）
    pub active_order_count: i64,
}

/// Registration payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 40))]
    pub username: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    pub role: Role,
}

/// Login payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login/registration response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

/// Admin approval update (`PATCH /api/users/{id}`)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApprovalUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_approved: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_rejected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

/// Agent online-status toggle (`PATCH /api/agents/status`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatusUpdate {
    pub is_online: bool,
}
