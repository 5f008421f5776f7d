//! Database record models
//!
//! Server-side record structs carry a SurrealDB [`RecordId`]; the
//! conversion impls produce the wire DTOs from `shared::models`.

use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

use shared::models::order::{
    DeliveryAddress, Order, OrderItem, OrderStatus, PaymentInfo,
};
use shared::models::product::{Product, ProductAggregate};
use shared::models::user::{ApprovalState, Role, UserResponse};

// =============================================================================
// Order
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub order_number: String,
    pub customer_id: String,
    pub items: Vec<OrderItem>,
    pub subtotal: f64,
    pub tax: f64,
    pub delivery_fee: f64,
    pub discount: f64,
    pub total: f64,
    pub delivery_address: DeliveryAddress,
    pub payment: PaymentInfo,
    pub status: OrderStatus,
    pub delivery_agent: Option<String>,
    pub created_at: i64,
    pub confirmed_at: Option<i64>,
    pub assigned_at: Option<i64>,
    pub picked_up_at: Option<i64>,
    pub delivered_at: Option<i64>,
    pub cancelled_at: Option<i64>,
    /// Reconciler idempotency marker
    #[serde(default)]
    pub analytics_applied: bool,
    /// Optimistic concurrency counter
    pub version: u64,
}

impl From<OrderRecord> for Order {
    fn from(rec: OrderRecord) -> Self {
        Order {
            id: rec.id.map(|r| r.to_string()).unwrap_or_default(),
            order_number: rec.order_number,
            customer_id: rec.customer_id,
            items: rec.items,
            subtotal: rec.subtotal,
            tax: rec.tax,
            delivery_fee: rec.delivery_fee,
            discount: rec.discount,
            total: rec.total,
            delivery_address: rec.delivery_address,
            payment: rec.payment,
            status: rec.status,
            delivery_agent: rec.delivery_agent,
            created_at: rec.created_at,
            confirmed_at: rec.confirmed_at,
            assigned_at: rec.assigned_at,
            picked_up_at: rec.picked_up_at,
            delivered_at: rec.delivered_at,
            cancelled_at: rec.cancelled_at,
            version: rec.version,
        }
    }
}

// =============================================================================
// User
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub approval: ApprovalState,
    pub rejection_reason: Option<String>,
    pub is_online: bool,
    pub active_order_count: i64,
    pub created_at: i64,
}

impl UserRecord {
    /// 骑手当前可以接单
    pub fn is_assignable(&self) -> bool {
        self.role == Role::DeliveryAgent
            && self.is_online
            && self.approval == ApprovalState::Approved
    }
}

impl From<UserRecord> for UserResponse {
    fn from(rec: UserRecord) -> Self {
        UserResponse {
            id: rec.id.map(|r| r.to_string()).unwrap_or_default(),
            username: rec.username,
            role: rec.role,
            approval: rec.approval,
            rejection_reason: rec.rejection_reason,
            is_online: rec.is_online,
            active_order_count: rec.active_order_count,
        }
    }
}

// =============================================================================
// Product / Aggregate
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub name: String,
    pub price: f64,
    pub is_active: bool,
    #[serde(default)]
    pub placeholder: bool,
}

impl From<ProductRecord> for Product {
    fn from(rec: ProductRecord) -> Self {
        Product {
            id: rec.id.map(|r| r.to_string()).unwrap_or_default(),
            name: rec.name,
            price: rec.price,
            is_active: rec.is_active,
            placeholder: rec.placeholder,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub product_id: String,
    pub product_name: String,
    pub sales_count: i64,
    pub total_revenue: f64,
    pub rating: f64,
}

impl From<AggregateRecord> for ProductAggregate {
    fn from(rec: AggregateRecord) -> Self {
        ProductAggregate {
            product_id: rec.product_id,
            product_name: rec.product_name,
            sales_count: rec.sales_count,
            total_revenue: rec.total_revenue,
            rating: rec.rating,
        }
    }
}
