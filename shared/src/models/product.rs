//! Product Model

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Product catalog entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub is_active: bool,
    /// Set when the reconciler synthesized this record from an order
    /// item snapshot because the referenced product no longer existed.
    #[serde(default)]
    pub placeholder: bool,
}

/// Create product payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProductCreate {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(range(min = 0.0))]
    pub price: f64,
}

/// 商品销售汇总
///
/// 仅由 Analytics Reconciler 写入，每个已送达订单至多计入一次。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductAggregate {
    pub product_id: String,
    pub product_name: String,
    pub sales_count: i64,
    pub total_revenue: f64,
    /// 派生评分（由外部评价流水线维护，本服务只透传）
    pub rating: f64,
}
