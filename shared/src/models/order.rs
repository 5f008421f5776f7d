//! Order Model
//!
//! 订单快照与生命周期状态。订单一经创建金额字段不再变化，
//! 状态只能通过 dispatch-server 的状态机流转。

use serde::{Deserialize, Serialize};
use validator::Validate;

// ============================================================================
// Lifecycle Status
// ============================================================================

/// 订单生命周期状态
///
/// 允许的流转：
/// `PENDING → CONFIRMED → ASSIGNED → OUT_FOR_DELIVERY → (AWAITING_PAYMENT →) DELIVERED`，
/// 任意非终态 → `CANCELLED`。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// 已创建，等待确认
    #[default]
    Pending,
    /// 已确认，等待分配骑手
    Confirmed,
    /// 已分配骑手
    Assigned,
    /// 配送中
    OutForDelivery,
    /// 已送达，等待 COD 收款
    AwaitingPayment,
    /// 已完成（终态）
    Delivered,
    /// 已取消（终态）
    Cancelled,
}

impl OrderStatus {
    /// 是否终态（不再接受任何流转）
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// 该状态下 `delivery_agent` 必须非空
    pub fn requires_agent(&self) -> bool {
        matches!(
            self,
            OrderStatus::Assigned
                | OrderStatus::OutForDelivery
                | OrderStatus::AwaitingPayment
                | OrderStatus::Delivered
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Assigned => "ASSIGNED",
            OrderStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            OrderStatus::AwaitingPayment => "AWAITING_PAYMENT",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// Payment
// ============================================================================

/// 支付方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// 货到付款
    #[default]
    Cod,
    /// 在线支付
    Online,
}

/// 支付状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
}

/// 订单支付信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PaymentInfo {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    /// 收款时间戳（毫秒），未收款为 None
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<i64>,
}

impl PaymentInfo {
    pub fn is_settled(&self) -> bool {
        self.status == PaymentStatus::Paid
    }
}

// ============================================================================
// Line Items / Address
// ============================================================================

/// Order line item - price snapshot taken at creation time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    /// Product reference (record id string)
    pub product_id: String,
    /// Product name snapshot
    pub name: String,
    /// Unit price snapshot
    pub unit_price: f64,
    /// Quantity
    pub quantity: i32,
    /// Line total (unit_price * quantity, computed by the server)
    pub line_total: f64,
}

/// Line item input for order creation
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OrderItemInput {
    pub product_id: String,
    #[validate(range(min = 1, max = 99))]
    pub quantity: i32,
}

/// 配送地址
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate, Default)]
pub struct DeliveryAddress {
    #[validate(length(min = 1, max = 200))]
    pub street: String,
    #[validate(length(min = 1, max = 80))]
    pub city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    /// 联系电话
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

// ============================================================================
// Order
// ============================================================================

/// 订单完整快照（对客户端的线上表示）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Record id (`order:xxx`)
    pub id: String,
    /// 人类可读的顺序单号（如 `ORD-42`）
    pub order_number: String,
    /// 下单客户
    pub customer_id: String,
    pub items: Vec<OrderItem>,
    pub subtotal: f64,
    pub tax: f64,
    pub delivery_fee: f64,
    pub discount: f64,
    /// total = subtotal + tax + delivery_fee - discount，创建时一次性计算
    pub total: f64,
    pub delivery_address: DeliveryAddress,
    pub payment: PaymentInfo,
    pub status: OrderStatus,
    /// 已分配骑手（仅 ASSIGNED/OUT_FOR_DELIVERY/AWAITING_PAYMENT/DELIVERED 非空）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_agent: Option<String>,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picked_up_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<i64>,
    /// 乐观并发版本号，每次成功流转 +1
    pub version: u64,
}

impl Order {
    /// 骑手引用与状态的一致性约束
    ///
    /// `delivery_agent` 非空 当且仅当 状态要求骑手。
    pub fn agent_invariant_holds(&self) -> bool {
        self.delivery_agent.is_some() == self.status.requires_agent()
    }
}

/// 创建订单请求
///
/// `tax` / `delivery_fee` / `discount` 缺省时由服务端按配置计算。
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, max = 50), nested)]
    pub items: Vec<OrderItemInput>,
    #[validate(nested)]
    pub delivery_address: DeliveryAddress,
    pub payment_method: PaymentMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_fee: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::AwaitingPayment.is_terminal());
    }

    #[test]
    fn test_agent_requirement_by_status() {
        assert!(!OrderStatus::Pending.requires_agent());
        assert!(!OrderStatus::Confirmed.requires_agent());
        assert!(OrderStatus::Assigned.requires_agent());
        assert!(OrderStatus::OutForDelivery.requires_agent());
        assert!(OrderStatus::AwaitingPayment.requires_agent());
        assert!(OrderStatus::Delivered.requires_agent());
        assert!(!OrderStatus::Cancelled.requires_agent());
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&OrderStatus::OutForDelivery).unwrap();
        assert_eq!(json, "\"OUT_FOR_DELIVERY\"");
        let method = serde_json::to_string(&PaymentMethod::Cod).unwrap();
        assert_eq!(method, "\"cod\"");
    }
}
