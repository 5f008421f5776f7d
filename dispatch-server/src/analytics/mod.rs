//! 销售汇总
//!
//! - [`reconciler`]: 幂等的单订单汇总作业
//! - [`worker`]: 可取消的全量回填批处理

pub mod reconciler;
pub mod worker;

pub use reconciler::{AnalyticsReconciler, ReconcileOutcome};
pub use worker::BackfillHandle;
