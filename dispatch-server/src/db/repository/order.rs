//! Order Repository
//!
//! Orders are single documents; every lifecycle mutation is one
//! conditional `UPDATE ... WHERE version = $expected`, so concurrent
//! transition attempts serialize at the store and stale writers get an
//! empty result back.

use serde::Deserialize;
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::models::OrderRecord;
use crate::orders::lifecycle::TransitionPlan;
use shared::models::order::OrderStatus;

const ORDER_TABLE: &str = "order";

#[derive(Debug, Deserialize)]
struct CounterRow {
    value: i64,
}

#[derive(Debug, Deserialize)]
struct IdRow {
    id: String,
}

#[derive(Clone)]
pub struct OrderRepository {
    base: BaseRepository,
}

impl OrderRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// 下一个顺序单号（持久化计数器，跨重启单调递增）
    pub async fn next_order_number(&self) -> RepoResult<String> {
        let mut result = self
            .base
            .db()
            .query("UPSERT counter:orders SET value = (value ?? 0) + 1 RETURN AFTER")
            .await?;
        let rows: Vec<CounterRow> = result.take(0)?;
        let value = rows
            .into_iter()
            .next()
            .ok_or_else(|| RepoError::Database("Order counter returned no row".to_string()))?
            .value;
        Ok(format!("ORD-{}", value))
    }

    /// Create a new order document
    pub async fn create(&self, record: OrderRecord) -> RepoResult<OrderRecord> {
        let created: Option<OrderRecord> = self
            .base
            .db()
            .create(ORDER_TABLE)
            .content(record)
            .await?;
        created.ok_or_else(|| RepoError::Database("Failed to create order".to_string()))
    }

    /// Find order by id (`order:xxx`)
    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<OrderRecord>> {
        let record_id: RecordId = id
            .parse()
            .map_err(|_| RepoError::NotFound(format!("Invalid order ID format: {}", id)))?;
        let order: Option<OrderRecord> = self.base.db().select(record_id).await?;
        Ok(order)
    }

    /// List orders, optionally filtered by status, newest first
    pub async fn list(
        &self,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> RepoResult<Vec<OrderRecord>> {
        let limit = limit.clamp(1, 500);
        let offset = offset.max(0);

        let mut sql = String::from("SELECT * FROM order");
        if status.is_some() {
            sql.push_str(" WHERE status = $status");
        }
        sql.push_str(&format!(
            " ORDER BY created_at DESC LIMIT {} START {}",
            limit, offset
        ));

        let mut query = self.base.db().query(sql);
        if let Some(status) = status {
            query = query.bind(("status", status));
        }

        let orders: Vec<OrderRecord> = query.await?.take(0)?;
        Ok(orders)
    }

    /// Orders belonging to a customer, newest first
    pub async fn list_for_customer(&self, customer_id: &str) -> RepoResult<Vec<OrderRecord>> {
        let orders: Vec<OrderRecord> = self
            .base
            .db()
            .query("SELECT * FROM order WHERE customer_id = $customer ORDER BY created_at DESC")
            .bind(("customer", customer_id.to_string()))
            .await?
            .take(0)?;
        Ok(orders)
    }

    /// 以单次条件更新应用一次状态流转
    ///
    /// 返回 `None` 表示没有命中（记录不存在或版本已过期），由调用方
    /// 重新读取区分 NotFound 与并发冲突。
    pub async fn apply_transition(
        &self,
        id: &RecordId,
        expected_version: u64,
        plan: &TransitionPlan,
        now: i64,
    ) -> RepoResult<Option<OrderRecord>> {
        let mut set_parts: Vec<String> = vec![
            "status = $status".to_string(),
            "version += 1".to_string(),
        ];
        if let Some(field) = plan.timestamp_field {
            set_parts.push(format!("{} = $ts", field));
        }
        if plan.set_agent.is_some() {
            set_parts.push("delivery_agent = $agent".to_string());
        } else if plan.clear_agent {
            set_parts.push("delivery_agent = NONE".to_string());
        }

        let sql = format!(
            "UPDATE order SET {} WHERE id = $id AND version = $expected RETURN AFTER",
            set_parts.join(", ")
        );

        let mut query = self
            .base
            .db()
            .query(sql)
            .bind(("id", id.clone()))
            .bind(("expected", expected_version))
            .bind(("status", plan.status))
            .bind(("ts", now));
        if let Some(agent) = &plan.set_agent {
            query = query.bind(("agent", agent.clone()));
        }

        let updated: Vec<OrderRecord> = query.await?.take(0)?;
        Ok(updated.into_iter().next())
    }

    /// Record payment settlement (conditional on version)
    pub async fn mark_paid(
        &self,
        id: &RecordId,
        expected_version: u64,
        now: i64,
    ) -> RepoResult<Option<OrderRecord>> {
        let updated: Vec<OrderRecord> = self
            .base
            .db()
            .query(
                "UPDATE order SET payment.status = 'paid', payment.paid_at = $ts, version += 1 \
                 WHERE id = $id AND version = $expected RETURN AFTER",
            )
            .bind(("id", id.clone()))
            .bind(("expected", expected_version))
            .bind(("ts", now))
            .await?
            .take(0)?;
        Ok(updated.into_iter().next())
    }

    /// 原子认领分析标记
    ///
    /// 已认领过返回 `false`（同一订单只计入汇总一次）。
    pub async fn claim_analytics(&self, id: &RecordId) -> RepoResult<bool> {
        let claimed: Vec<OrderRecord> = self
            .base
            .db()
            .query(
                "UPDATE order SET analytics_applied = true \
                 WHERE id = $id AND analytics_applied = false RETURN AFTER",
            )
            .bind(("id", id.clone()))
            .await?
            .take(0)?;
        Ok(!claimed.is_empty())
    }

    /// Delivered order ids in ascending delivery-timestamp order (backfill)
    pub async fn delivered_ids_ascending(&self) -> RepoResult<Vec<String>> {
        let rows: Vec<IdRow> = self
            .base
            .db()
            .query(
                "SELECT <string>id AS id FROM order \
                 WHERE status = $status ORDER BY delivered_at ASC",
            )
            .bind(("status", OrderStatus::Delivered))
            .await?
            .take(0)?;
        Ok(rows.into_iter().map(|r| r.id).collect())
    }
}
