//! Analytics Reconciler
//!
//! 把一个已送达订单计入商品销售汇总：每个订单行给对应商品的
//! `sales_count` 加上数量、`total_revenue` 加上行金额。
//!
//! 幂等：先原子认领订单上的 `analytics_applied` 标记，认领失败说明
//! 该订单已计入过，直接跳过。商品已被删除时，先用订单行快照补建
//! 一个占位商品，汇总数据绝不静默丢失。

use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use crate::db::repository::{OrderRepository, ProductRepository};
use crate::orders::error::{OrderError, OrderResult};
use shared::models::order::OrderStatus;

/// Result of a reconcile call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Aggregates updated for this many line items
    Applied { items: usize },
    /// Order was already reconciled earlier; no changes made
    AlreadyApplied,
}

#[derive(Clone)]
pub struct AnalyticsReconciler {
    orders: OrderRepository,
    products: ProductRepository,
}

impl AnalyticsReconciler {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            orders: OrderRepository::new(db.clone()),
            products: ProductRepository::new(db),
        }
    }

    /// 把一个已送达订单计入汇总（可安全重复调用）
    pub async fn reconcile(&self, order_id: &str) -> OrderResult<ReconcileOutcome> {
        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("Order {} not found", order_id)))?;

        if order.status != OrderStatus::Delivered {
            return Err(OrderError::Validation(format!(
                "Order {} is not delivered (status: {})",
                order_id, order.status
            )));
        }

        let record_id = order
            .id
            .clone()
            .ok_or_else(|| OrderError::NotFound(format!("Order {} has no id", order_id)))?;

        if !self.orders.claim_analytics(&record_id).await? {
            tracing::debug!(order_id = %order_id, "Reconcile: already applied, skipping");
            return Ok(ReconcileOutcome::AlreadyApplied);
        }

        for item in &order.items {
            let synthesized = self
                .products
                .ensure_placeholder(&item.product_id, &item.name, item.unit_price)
                .await?;
            if synthesized {
                tracing::warn!(
                    order_id = %order_id,
                    product_id = %item.product_id,
                    "Reconcile: referenced product missing, placeholder synthesized"
                );
            }

            self.products
                .upsert_aggregate(
                    &item.product_id,
                    &item.name,
                    item.quantity as i64,
                    item.line_total,
                )
                .await?;
        }

        tracing::info!(
            order_id = %order_id,
            items = order.items.len(),
            "Reconcile: aggregates updated"
        );
        Ok(ReconcileOutcome::Applied {
            items: order.items.len(),
        })
    }
}
