//! Database Module
//!
//! Embedded SurrealDB storage. Schema is defined at startup; orders and
//! product aggregates are the only durable state of the platform.

pub mod models;
pub mod repository;

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem, RocksDb};

use crate::utils::AppError;

const NAMESPACE: &str = "pelican";
const DATABASE: &str = "dispatch";

/// Database service — owns the embedded SurrealDB handle
#[derive(Clone)]
pub struct DbService {
    pub db: Surreal<Db>,
}

impl DbService {
    /// Open (or create) the on-disk database and define the schema
    pub async fn new(db_path: &str) -> Result<Self, AppError> {
        let db = Surreal::new::<RocksDb>(db_path)
            .await
            .map_err(|e| AppError::database(format!("Failed to open database: {}", e)))?;

        Self::init(db).await
    }

    /// In-memory database (tests and ephemeral tooling)
    pub async fn memory() -> Result<Self, AppError> {
        let db = Surreal::new::<Mem>(())
            .await
            .map_err(|e| AppError::database(format!("Failed to open memory database: {}", e)))?;

        Self::init(db).await
    }

    async fn init(db: Surreal<Db>) -> Result<Self, AppError> {
        db.use_ns(NAMESPACE)
            .use_db(DATABASE)
            .await
            .map_err(|e| AppError::database(format!("Failed to select namespace: {}", e)))?;

        define_schema(&db).await?;

        tracing::info!("Database ready (ns={}, db={})", NAMESPACE, DATABASE);
        Ok(Self { db })
    }
}

/// 启动时定义表结构与索引（幂等）
async fn define_schema(db: &Surreal<Db>) -> Result<(), AppError> {
    db.query(
        r#"
        DEFINE TABLE IF NOT EXISTS user SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS user_username ON TABLE user FIELDS username UNIQUE;
        DEFINE TABLE IF NOT EXISTS order SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS order_status ON TABLE order FIELDS status;
        DEFINE TABLE IF NOT EXISTS product SCHEMALESS;
        DEFINE TABLE IF NOT EXISTS product_aggregate SCHEMALESS;
        DEFINE TABLE IF NOT EXISTS counter SCHEMALESS;
        "#,
    )
    .await
    .map_err(|e| AppError::database(format!("Failed to define schema: {}", e)))?
    .check()
    .map_err(|e| AppError::database(format!("Schema definition rejected: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_on_disk_database_and_idempotent_schema() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("pelican.db");

        let service = DbService::new(&path.to_string_lossy())
            .await
            .expect("open db");
        service
            .db
            .query("CREATE counter:probe SET value = 1")
            .await
            .expect("write probe");

        // Re-defining the schema on a live database is a no-op
        define_schema(&service.db).await.expect("redefine schema");

        let mut result = service
            .db
            .query("SELECT value FROM counter:probe")
            .await
            .expect("read probe");
        let rows: Vec<serde_json::Value> = result.take(0).expect("take probe");
        assert_eq!(rows.len(), 1);
    }
}
