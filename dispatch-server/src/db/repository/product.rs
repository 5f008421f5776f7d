//! Product Repository
//!
//! Catalog entries plus the sales aggregates maintained by the
//! analytics reconciler. Aggregate records share their key with the
//! product they summarize.

use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::models::{AggregateRecord, ProductRecord};

const PRODUCT_TABLE: &str = "product";
const AGGREGATE_TABLE: &str = "product_aggregate";

/// 从 "table:key" 形式的引用提取纯 key；无法解析时原样使用
///
/// 历史数据里商品引用可能不是合法的 record id，汇总不能因此丢失。
fn aggregate_key(product_id: &str) -> String {
    product_id
        .parse::<RecordId>()
        .map(|r| r.key().to_string())
        .unwrap_or_else(|_| product_id.to_string())
}

#[derive(Clone)]
pub struct ProductRepository {
    base: BaseRepository,
}

impl ProductRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Create a catalog product
    pub async fn create(&self, record: ProductRecord) -> RepoResult<ProductRecord> {
        let created: Option<ProductRecord> = self
            .base
            .db()
            .create(PRODUCT_TABLE)
            .content(record)
            .await?;
        created.ok_or_else(|| RepoError::Database("Failed to create product".to_string()))
    }

    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<ProductRecord>> {
        let record_id: RecordId = id
            .parse()
            .map_err(|_| RepoError::NotFound(format!("Invalid product ID format: {}", id)))?;
        let product: Option<ProductRecord> = self.base.db().select(record_id).await?;
        Ok(product)
    }

    /// All active catalog products
    pub async fn find_all(&self) -> RepoResult<Vec<ProductRecord>> {
        let products: Vec<ProductRecord> = self
            .base
            .db()
            .query("SELECT * FROM product WHERE is_active = true ORDER BY name")
            .await?
            .take(0)?;
        Ok(products)
    }

    /// 为缺失的商品补建占位记录（来自订单行的快照）
    ///
    /// 返回 `true` 表示补建发生。
    pub async fn ensure_placeholder(
        &self,
        product_id: &str,
        name: &str,
        price: f64,
    ) -> RepoResult<bool> {
        let Ok(record_id) = product_id.parse::<RecordId>() else {
            // 引用连 record id 都不是：只靠 aggregate 记录承接，无法补建
            return Ok(false);
        };

        let existing: Option<ProductRecord> = self.base.db().select(record_id.clone()).await?;
        if existing.is_some() {
            return Ok(false);
        }

        let placeholder = ProductRecord {
            id: None,
            name: name.to_string(),
            price,
            is_active: false,
            placeholder: true,
        };
        let _created: Option<ProductRecord> = self
            .base
            .db()
            .create(record_id)
            .content(placeholder)
            .await?;
        Ok(true)
    }

    /// 累加商品销售汇总（UPSERT，首次自动建档）
    pub async fn upsert_aggregate(
        &self,
        product_id: &str,
        product_name: &str,
        quantity: i64,
        revenue: f64,
    ) -> RepoResult<()> {
        let agg_id = RecordId::from_table_key(AGGREGATE_TABLE, aggregate_key(product_id));
        self.base
            .db()
            .query(
                "UPSERT $id SET \
                 product_id = $pid, \
                 product_name = $name, \
                 sales_count = (sales_count ?? 0) + $qty, \
                 total_revenue = (total_revenue ?? 0) + $rev, \
                 rating = rating ?? 0",
            )
            .bind(("id", agg_id))
            .bind(("pid", product_id.to_string()))
            .bind(("name", product_name.to_string()))
            .bind(("qty", quantity))
            .bind(("rev", revenue))
            .await?;
        Ok(())
    }

    /// Aggregate for one product (by product reference)
    pub async fn find_aggregate(&self, product_id: &str) -> RepoResult<Option<AggregateRecord>> {
        let agg_id = RecordId::from_table_key(AGGREGATE_TABLE, aggregate_key(product_id));
        let agg: Option<AggregateRecord> = self.base.db().select(agg_id).await?;
        Ok(agg)
    }

    /// All aggregates, highest revenue first
    pub async fn list_aggregates(&self) -> RepoResult<Vec<AggregateRecord>> {
        let aggs: Vec<AggregateRecord> = self
            .base
            .db()
            .query("SELECT * FROM product_aggregate ORDER BY total_revenue DESC")
            .await?
            .take(0)?;
        Ok(aggs)
    }
}
