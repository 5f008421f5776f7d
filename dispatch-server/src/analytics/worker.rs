//! Backfill worker
//!
//! 全量回填：按送达时间升序遍历所有已送达订单，逐单调用
//! reconcile。单个订单失败只记日志并跳过，不中断批次；取消只在
//! 订单之间生效，绝不打断单个订单的处理。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use surrealdb::Surreal;
use surrealdb::engine::local::Db;
use tokio_util::sync::CancellationToken;

use super::reconciler::{AnalyticsReconciler, ReconcileOutcome};
use crate::db::repository::OrderRepository;
use crate::utils::AppError;

/// 回填作业句柄
///
/// 同一时间只允许一个批次运行；句柄注入 ServerState 供管理端
/// 触发与取消。
#[derive(Debug, Default)]
pub struct BackfillHandle {
    running: Arc<AtomicBool>,
    token: Mutex<Option<CancellationToken>>,
}

impl BackfillHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// 启动回填批次（后台任务）
    pub fn start(&self, db: Surreal<Db>) -> Result<(), AppError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(AppError::conflict("Backfill already running"));
        }

        let token = CancellationToken::new();
        *self.token.lock().expect("backfill token lock poisoned") = Some(token.clone());

        let running = self.running.clone();
        tokio::spawn(async move {
            run_backfill(db, token).await;
            running.store(false, Ordering::SeqCst);
        });

        Ok(())
    }

    /// 请求取消（当前订单处理完后停止）
    pub fn cancel(&self) {
        if let Some(token) = self
            .token
            .lock()
            .expect("backfill token lock poisoned")
            .as_ref()
        {
            token.cancel();
        }
    }
}

/// 回填主循环
async fn run_backfill(db: Surreal<Db>, token: CancellationToken) {
    tracing::info!("Backfill started");

    let orders = OrderRepository::new(db.clone());
    let reconciler = AnalyticsReconciler::new(db);

    let ids = match orders.delivered_ids_ascending().await {
        Ok(ids) => ids,
        Err(e) => {
            tracing::error!(error = %e, "Backfill: failed to list delivered orders");
            return;
        }
    };

    let total = ids.len();
    let mut applied = 0usize;
    let mut already = 0usize;
    let mut failed = 0usize;

    for order_id in ids {
        // 取消只在订单之间检查，绝不中断单个订单
        if token.is_cancelled() {
            tracing::info!(applied, already, failed, "Backfill cancelled");
            return;
        }

        match reconciler.reconcile(&order_id).await {
            Ok(ReconcileOutcome::Applied { .. }) => applied += 1,
            Ok(ReconcileOutcome::AlreadyApplied) => already += 1,
            Err(e) => {
                failed += 1;
                tracing::warn!(order_id = %order_id, error = %e, "Backfill: order skipped");
            }
        }
    }

    tracing::info!(total, applied, already, failed, "Backfill finished");
}
