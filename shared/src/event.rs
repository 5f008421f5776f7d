//! 实时通道事件目录
//!
//! dispatch-server 与客户端之间的实时事件定义。事件是一个封闭的
//! 枚举：每种事件携带固定结构的载荷，编译期即可检查，取代松散的
//! JSON 对象。
//!
//! 投递语义：fire-and-forget、至多一次。REST 响应才是权威状态，
//! 事件只是延迟优化——错过事件的客户端通过重新拉取恢复。

use serde::{Deserialize, Serialize};

use crate::models::order::{Order, OrderStatus};
use crate::models::user::Role;

// ==================== Audience ====================

/// 事件受众
///
/// 三种受众形态；`OrderParties` 为订单事件的派生集合：
/// 所有在线管理员 + 已分配骑手 + 下单顾客。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// 指定用户的所有会话（多端在线全部命中）
    User(String),
    /// 某一角色的所有在线会话
    Role(Role),
    /// 订单相关方
    OrderParties {
        customer_id: String,
        agent_id: Option<String>,
    },
}

// ==================== Payloads ====================

/// 订单创建载荷 (`order:new`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreatedPayload {
    pub order_id: String,
    pub timestamp: i64,
    pub order_number: String,
    pub customer_id: String,
    pub total: f64,
    /// 完整订单快照，便于管理端免拉取渲染
    pub order: Order,
}

/// 状态变更载荷 (`order:status:update` / `order:cancelled`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusPayload {
    pub order_id: String,
    pub timestamp: i64,
    pub order_number: String,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_status: Option<OrderStatus>,
}

/// 分配骑手载荷 (`order:assigned`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAssignedPayload {
    pub order_id: String,
    pub timestamp: i64,
    pub order_number: String,
    pub agent_id: String,
    pub customer_id: String,
}

/// 支付载荷 (`payment:received` / `payment:status:update`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentPayload {
    pub order_id: String,
    pub timestamp: i64,
    pub order_number: String,
    pub amount: f64,
    pub method: crate::models::order::PaymentMethod,
    pub status: crate::models::order::PaymentStatus,
}

/// 骑手在线状态载荷 (`delivery:agent:status:update`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatusPayload {
    pub agent_id: String,
    pub timestamp: i64,
    pub is_online: bool,
}

// ==================== Domain Event ====================

/// 领域事件（封闭集合）
///
/// 线上形态：Socket.IO 事件名 = [`DomainEvent::name`]，
/// 事件体 = 对应载荷结构体的 JSON 序列化。
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum DomainEvent {
    OrderCreated(OrderCreatedPayload),
    OrderStatusChanged(OrderStatusPayload),
    OrderAssigned(OrderAssignedPayload),
    OrderCancelled(OrderStatusPayload),
    PaymentReceived(PaymentPayload),
    PaymentStatusChanged(PaymentPayload),
    AgentStatusChanged(AgentStatusPayload),
}

impl DomainEvent {
    /// Socket.IO 事件名
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::OrderCreated(_) => "order:new",
            DomainEvent::OrderStatusChanged(_) => "order:status:update",
            DomainEvent::OrderAssigned(_) => "order:assigned",
            DomainEvent::OrderCancelled(_) => "order:cancelled",
            DomainEvent::PaymentReceived(_) => "payment:received",
            DomainEvent::PaymentStatusChanged(_) => "payment:status:update",
            DomainEvent::AgentStatusChanged(_) => "delivery:agent:status:update",
        }
    }

    /// 事件涉及的订单 ID（非订单事件为 None）
    pub fn order_id(&self) -> Option<&str> {
        match self {
            DomainEvent::OrderCreated(p) => Some(&p.order_id),
            DomainEvent::OrderStatusChanged(p) | DomainEvent::OrderCancelled(p) => {
                Some(&p.order_id)
            }
            DomainEvent::OrderAssigned(p) => Some(&p.order_id),
            DomainEvent::PaymentReceived(p) | DomainEvent::PaymentStatusChanged(p) => {
                Some(&p.order_id)
            }
            DomainEvent::AgentStatusChanged(_) => None,
        }
    }
}

// ==================== Client -> Server ====================

/// 客户端连接后发送的注册载荷 (`register`)
///
/// 注册表不持久化，客户端每次重连后都必须重新宣告身份。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterPayload {
    pub user_id: String,
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        let evt = DomainEvent::AgentStatusChanged(AgentStatusPayload {
            agent_id: "user:a1".into(),
            timestamp: 1,
            is_online: true,
        });
        assert_eq!(evt.name(), "delivery:agent:status:update");
        assert!(evt.order_id().is_none());
    }

    #[test]
    fn test_payload_serializes_flat() {
        // Untagged: the wire payload is the bare payload object, no enum tag.
        let evt = DomainEvent::OrderAssigned(OrderAssignedPayload {
            order_id: "order:o1".into(),
            timestamp: 42,
            order_number: "ORD-7".into(),
            agent_id: "user:a1".into(),
            customer_id: "user:c1".into(),
        });
        let value = serde_json::to_value(&evt).unwrap();
        assert_eq!(value["order_id"], "order:o1");
        assert_eq!(value["timestamp"], 42);
        assert!(value.get("OrderAssigned").is_none());
    }

    #[test]
    fn test_register_payload_roundtrip() {
        let json = r#"{"user_id":"user:c1","role":"delivery_agent"}"#;
        let parsed: RegisterPayload = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.role, Role::DeliveryAgent);
    }
}
